use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::{
    KEY_ATTRIBUTE, KeyValueStore, Row, SERIALIZATION_ATTRIBUTE, TableStatus, VALUE_ATTRIBUTE,
};
use crate::error::KvError;
use crate::models::{SerializationType, StoredItem};

/// Most put requests DynamoDB accepts in one `BatchWriteItem` call.
pub const MAX_BATCH_WRITE_ITEMS: usize = 25;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A named table on some [`KeyValueStore`]. Holds no data of its own.
pub struct Table<'a, S: ?Sized> {
    store: &'a S,
    name: String,
    poll_interval: Duration,
}

impl<'a, S> Table<'a, S>
where
    S: KeyValueStore + ?Sized,
{
    pub fn new(store: &'a S, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets how long [`Table::ensure_table`] sleeps between status checks.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Creates the table unless it already exists, then waits for it to
    /// become active.
    ///
    /// An existing table is accepted whatever its key schema; a hash key
    /// other than `Key` is only logged.
    #[tracing::instrument(skip(self), fields(table = %self.name))]
    pub async fn ensure_table(&self) -> Result<()> {
        if let Some(description) = self.store.describe_table(&self.name).await? {
            if description.hash_key.as_deref() != Some(KEY_ATTRIBUTE) {
                warn!(
                    hash_key = ?description.hash_key,
                    expected = KEY_ATTRIBUTE,
                    "Existing table has an unexpected hash key"
                );
            }
            debug!("Table already exists");
            return Ok(());
        }

        info!("Creating table");
        self.store.create_table(&self.name).await?;

        loop {
            match self.store.describe_table(&self.name).await? {
                Some(d) if d.status == TableStatus::Active => break,
                status => debug!(?status, "Waiting for table to become active"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        info!("Table is active");
        Ok(())
    }

    /// Writes `items` in batches of at most [`MAX_BATCH_WRITE_ITEMS`], one
    /// request at a time. Stops at the first failing batch.
    #[tracing::instrument(skip(self, items), fields(table = %self.name, count = items.len()))]
    pub async fn write_all(&self, items: &[StoredItem]) -> Result<()> {
        for (index, chunk) in items.chunks(MAX_BATCH_WRITE_ITEMS).enumerate() {
            let rows = chunk.iter().map(item_to_row).collect();
            let unprocessed = self
                .store
                .batch_write(&self.name, rows)
                .await
                .with_context(|| format!("batch {index} of writes to '{}' failed", self.name))?;

            if unprocessed > 0 {
                return Err(KvError::UnprocessedItems {
                    table: self.name.clone(),
                    count: unprocessed,
                }
                .into());
            }
            debug!(batch = index, size = chunk.len(), "Batch written");
        }
        Ok(())
    }

    /// Scans the whole table with consistent reads, page by page.
    ///
    /// Rows without a `Key` or `Value` attribute are skipped.
    #[tracing::instrument(skip(self), fields(table = %self.name))]
    pub async fn read_all(&self) -> Result<Vec<StoredItem>> {
        let mut items = Vec::new();
        let mut start_key = None;
        let mut pages = 0usize;

        loop {
            let page = self.store.scan(&self.name, start_key, true).await?;
            pages += 1;

            for row in page.rows {
                match row_to_item(row) {
                    Some(item) => items.push(item),
                    None => debug!("Skipping row without Key or Value"),
                }
            }

            match page.last_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }

        debug!(pages, items = items.len(), "Scan complete");
        Ok(items)
    }

    /// Looks up the single row whose hash key is `key`.
    ///
    /// # Errors
    ///
    /// [`KvError::NotFound`] when no row matches, [`KvError::AmbiguousKey`]
    /// when more than one does.
    #[tracing::instrument(skip(self), fields(table = %self.name))]
    pub async fn get_by_key(&self, key: &str) -> Result<StoredItem> {
        let mut rows = self.store.query(&self.name, key).await?;

        match rows.len() {
            0 => Err(KvError::NotFound(key.to_string()).into()),
            1 => {
                let row = rows.swap_remove(0);
                row_to_item(row).ok_or_else(|| KvError::NotFound(key.to_string()).into())
            }
            count => Err(KvError::AmbiguousKey {
                key: key.to_string(),
                count,
            }
            .into()),
        }
    }
}

fn item_to_row(item: &StoredItem) -> Row {
    Row::from([
        (KEY_ATTRIBUTE.to_string(), item.key.clone()),
        (VALUE_ATTRIBUTE.to_string(), item.value.clone()),
        (SERIALIZATION_ATTRIBUTE.to_string(), item.serialization.clone()),
    ])
}

/// Legacy rows without a `Serialization` attribute are plain.
fn row_to_item(mut row: Row) -> Option<StoredItem> {
    let key = row.remove(KEY_ATTRIBUTE)?;
    let value = row.remove(VALUE_ATTRIBUTE)?;
    let serialization = row
        .remove(SERIALIZATION_ATTRIBUTE)
        .unwrap_or_else(|| SerializationType::Plain.as_str().to_string());

    Some(StoredItem {
        key,
        value,
        serialization,
    })
}
