//! `casework-store` - record store boundary.
//!
//! Table-scoped CRUD over loosely typed rows. The dedup engine only talks to
//! the [`RecordStore`] trait; the in-memory and SQLite backends live here.

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod value;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use value::{value_key, Row};

use serde_json::Value;

/// Primary key column shared by every casework table.
pub const ID_COLUMN: &str = "id";

/// Largest id list a single `delete_by_ids` call may carry.
pub const MAX_DELETE_BATCH: usize = 100;

/// A single write, used when a backend applies several writes atomically.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// `UPDATE table SET set_column = set_value WHERE column = match_value`
    Update {
        table: String,
        column: String,
        match_value: Value,
        set_column: String,
        set_value: Value,
    },
    /// `DELETE FROM table WHERE id IN (ids)`
    Delete { table: String, ids: Vec<Value> },
}

/// The four operation shapes the dedup engine consumes, plus batch upsert.
///
/// Every call is blocking and may fail independently. Implementations take
/// `&self` so a store can be shared by worker threads when it is `Sync`.
pub trait RecordStore {
    /// All rows of `table`, in whatever order the backend returns them.
    fn fetch_all(&self, table: &str) -> Result<Vec<Row>, StoreError>;

    /// All rows of `table` ascending by `order_by`. Nulls sort last.
    fn fetch_all_ordered(&self, table: &str, order_by: &str) -> Result<Vec<Row>, StoreError>;

    /// Set `set_column = set_value` on every row where `column = match_value`.
    /// Returns the number of rows touched.
    fn update_where_equals(
        &self,
        table: &str,
        column: &str,
        match_value: &Value,
        set_column: &str,
        set_value: &Value,
    ) -> Result<usize, StoreError>;

    /// Delete rows whose id is in `ids`. Callers chunk to [`MAX_DELETE_BATCH`].
    fn delete_by_ids(&self, table: &str, ids: &[Value]) -> Result<usize, StoreError>;

    /// Insert rows, replacing any existing row with the same id.
    fn upsert(&self, table: &str, rows: &[Row]) -> Result<usize, StoreError>;

    /// Whether [`RecordStore::apply_atomic`] is available.
    fn supports_transactions(&self) -> bool {
        false
    }

    /// Apply all `ops` in one transaction, or none of them. Returns the rows
    /// touched by each op, in order.
    fn apply_atomic(&self, _ops: &[WriteOp]) -> Result<Vec<usize>, StoreError> {
        Err(StoreError::Unsupported("multi-statement transactions".into()))
    }
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn fetch_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        (**self).fetch_all(table)
    }

    fn fetch_all_ordered(&self, table: &str, order_by: &str) -> Result<Vec<Row>, StoreError> {
        (**self).fetch_all_ordered(table, order_by)
    }

    fn update_where_equals(
        &self,
        table: &str,
        column: &str,
        match_value: &Value,
        set_column: &str,
        set_value: &Value,
    ) -> Result<usize, StoreError> {
        (**self).update_where_equals(table, column, match_value, set_column, set_value)
    }

    fn delete_by_ids(&self, table: &str, ids: &[Value]) -> Result<usize, StoreError> {
        (**self).delete_by_ids(table, ids)
    }

    fn upsert(&self, table: &str, rows: &[Row]) -> Result<usize, StoreError> {
        (**self).upsert(table, rows)
    }

    fn supports_transactions(&self) -> bool {
        (**self).supports_transactions()
    }

    fn apply_atomic(&self, ops: &[WriteOp]) -> Result<Vec<usize>, StoreError> {
        (**self).apply_atomic(ops)
    }
}
