//! Key-value table access.
//!
//! [`KeyValueStore`] is the async trait over the handful of remote table
//! operations the tool needs. [`DynamoDbStore`] implements it with AWS
//! DynamoDB and [`MemoryStore`] keeps everything in process.
//! [`Table`] builds provisioning, chunked writes, full scans and point
//! lookups on top of any store.

mod dynamodb;
mod memory;
mod table;

pub use dynamodb::DynamoDbStore;
pub use memory::MemoryStore;
pub use table::{MAX_BATCH_WRITE_ITEMS, Table};

use std::collections::HashMap;

use anyhow::Result;

/// Hash key attribute of every table.
pub const KEY_ATTRIBUTE: &str = "Key";
pub const VALUE_ATTRIBUTE: &str = "Value";
pub const SERIALIZATION_ATTRIBUTE: &str = "Serialization";

/// A row as seen through the store: string attributes by name.
pub type Row = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Creating,
    Active,
    Other,
}

/// What `describe_table` reports about an existing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub status: TableStatus,
    /// Name of the hash key attribute, if the table has one.
    pub hash_key: Option<String>,
}

/// One page of a scan. `last_key` is the cursor for the next page and is
/// `None` once the scan is exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub rows: Vec<Row>,
    pub last_key: Option<Row>,
}

/// Remote table operations. Every call is a single round trip.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` when the table does not exist.
    async fn describe_table(&self, table: &str) -> Result<Option<TableDescription>>;

    /// Creates `table` with a single string hash key named [`KEY_ATTRIBUTE`].
    async fn create_table(&self, table: &str) -> Result<()>;

    /// Puts every row in one request. Returns how many rows the store
    /// reported back as unprocessed.
    async fn batch_write(&self, table: &str, rows: Vec<Row>) -> Result<usize>;

    /// Reads one page, starting after `start_key` when given.
    async fn scan(&self, table: &str, start_key: Option<Row>, consistent: bool)
    -> Result<ScanPage>;

    /// Returns every row whose hash key equals `key`.
    async fn query(&self, table: &str, key: &str) -> Result<Vec<Row>>;
}
