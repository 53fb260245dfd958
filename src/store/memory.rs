use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, bail};

use super::{
    KEY_ATTRIBUTE, KeyValueStore, MAX_BATCH_WRITE_ITEMS, Row, ScanPage, TableDescription,
    TableStatus,
};

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Default)]
struct MemoryTable {
    /// Describe calls left before a freshly created table reports active.
    pending_polls: usize,
    rows: BTreeMap<String, Row>,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, MemoryTable>,
    create_calls: usize,
    batch_sizes: Vec<usize>,
}

/// An in-process [`KeyValueStore`].
///
/// Behaves like a hash-keyed DynamoDB table where it matters to callers:
/// scans are paginated, batches over [`MAX_BATCH_WRITE_ITEMS`] are
/// rejected, and new tables can be made to stay `Creating` for a few
/// describe calls.
pub struct MemoryStore {
    page_size: usize,
    activation_polls: usize,
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            activation_polls: 0,
            state: Mutex::new(State::default()),
        }
    }

    /// Maximum number of rows returned by one scan call.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Number of describe calls a new table answers with `Creating`.
    pub fn with_activation_polls(mut self, polls: usize) -> Self {
        self.activation_polls = polls;
        self
    }

    /// Stores `row` as-is, bypassing validation. Creates the table if needed.
    pub fn insert_row(&self, table: &str, row: Row) {
        let key = row.get(KEY_ATTRIBUTE).cloned().unwrap_or_default();
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .rows
            .insert(key, row);
    }

    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    /// Size of every batch write request received, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batch_sizes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn describe_table(&self, table: &str) -> Result<Option<TableDescription>> {
        let mut state = self.lock();
        let Some(t) = state.tables.get_mut(table) else {
            return Ok(None);
        };

        let status = if t.pending_polls > 0 {
            t.pending_polls -= 1;
            TableStatus::Creating
        } else {
            TableStatus::Active
        };

        Ok(Some(TableDescription {
            status,
            hash_key: Some(KEY_ATTRIBUTE.to_string()),
        }))
    }

    async fn create_table(&self, table: &str) -> Result<()> {
        let mut state = self.lock();
        if state.tables.contains_key(table) {
            bail!("table '{table}' already exists");
        }
        state.create_calls += 1;
        state.tables.insert(
            table.to_string(),
            MemoryTable {
                pending_polls: self.activation_polls,
                rows: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn batch_write(&self, table: &str, rows: Vec<Row>) -> Result<usize> {
        if rows.len() > MAX_BATCH_WRITE_ITEMS {
            bail!(
                "batch of {} items exceeds the limit of {MAX_BATCH_WRITE_ITEMS}",
                rows.len()
            );
        }

        let mut state = self.lock();
        let Some(t) = state.tables.get_mut(table) else {
            bail!("table '{table}' not found");
        };

        for row in &rows {
            if !row.contains_key(KEY_ATTRIBUTE) {
                bail!("row is missing the {KEY_ATTRIBUTE} attribute");
            }
        }
        let size = rows.len();
        for row in rows {
            t.rows.insert(row[KEY_ATTRIBUTE].clone(), row);
        }
        state.batch_sizes.push(size);
        Ok(0)
    }

    async fn scan(&self, table: &str, start_key: Option<Row>, _consistent: bool) -> Result<ScanPage> {
        let state = self.lock();
        let Some(t) = state.tables.get(table) else {
            bail!("table '{table}' not found");
        };

        let lower = match start_key.as_ref().and_then(|k| k.get(KEY_ATTRIBUTE)) {
            Some(key) => Bound::Excluded(key.clone()),
            None => Bound::Unbounded,
        };

        let mut remaining = t.rows.range((lower, Bound::Unbounded));
        let rows: Vec<Row> = remaining
            .by_ref()
            .take(self.page_size)
            .map(|(_, row)| row.clone())
            .collect();

        let last_key = if remaining.next().is_some() {
            rows.last()
                .and_then(|row| row.get(KEY_ATTRIBUTE))
                .map(|key| Row::from([(KEY_ATTRIBUTE.to_string(), key.clone())]))
        } else {
            None
        };

        Ok(ScanPage { rows, last_key })
    }

    async fn query(&self, table: &str, key: &str) -> Result<Vec<Row>> {
        let state = self.lock();
        let Some(t) = state.tables.get(table) else {
            bail!("table '{table}' not found");
        };
        Ok(t.rows.get(key).cloned().into_iter().collect())
    }
}
