// In-memory record store for fixtures and tests

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::StoreError;
use crate::value::{compare_values, value_key, values_equal, Row};
use crate::{RecordStore, WriteOp, ID_COLUMN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailOp {
    Fetch,
    Update,
    Delete,
}

/// A configured failure: `target` narrows an update to one match value, or a
/// delete to calls whose id list contains it.
#[derive(Debug, Clone)]
struct Failure {
    op: FailOp,
    table: String,
    column: Option<String>,
    target: Option<String>,
}

impl Failure {
    fn matches(&self, op: FailOp, table: &str, column: Option<&str>, values: &[&Value]) -> bool {
        if self.op != op || self.table != table {
            return false;
        }
        if let (Some(want), Some(got)) = (&self.column, column) {
            if want != got {
                return false;
            }
        }
        match &self.target {
            None => true,
            Some(target) => values
                .iter()
                .any(|v| value_key(v).as_deref() == Some(target.as_str())),
        }
    }
}

/// Number of store calls issued, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub fetches: usize,
    pub updates: usize,
    pub deletes: usize,
    pub upserts: usize,
}

impl CallCounts {
    pub fn writes(&self) -> usize {
        self.updates + self.deletes
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<String, Vec<Row>>,
    failures: Vec<Failure>,
    calls: CallCounts,
}

impl Inner {
    fn check(&self, op: FailOp, table: &str, column: Option<&str>, values: &[&Value]) -> Result<(), StoreError> {
        match self.failures.iter().find(|f| f.matches(op, table, column, values)) {
            Some(_) => Err(StoreError::Injected(format!("{op:?} on '{table}'"))),
            None => Ok(()),
        }
    }

    fn update(&mut self, table: &str, column: &str, match_value: &Value, set_column: &str, set_value: &Value) -> usize {
        let Some(rows) = self.tables.get_mut(table) else {
            return 0;
        };
        let mut touched = 0;
        for row in rows.iter_mut() {
            if row.get(column).is_some_and(|v| values_equal(v, match_value)) {
                row.insert(set_column.to_string(), set_value.clone());
                touched += 1;
            }
        }
        touched
    }

    fn delete(&mut self, table: &str, ids: &[Value]) -> usize {
        let Some(rows) = self.tables.get_mut(table) else {
            return 0;
        };
        let before = rows.len();
        rows.retain(|row| {
            !row
                .get(ID_COLUMN)
                .is_some_and(|id| ids.iter().any(|target| values_equal(id, target)))
        });
        before - rows.len()
    }
}

/// Table map behind a mutex. Unknown tables read as empty, so fixtures only
/// need to declare the tables they populate.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `{ "table": [ {row}, ... ], ... }`.
    pub fn from_json(snapshot: &Value) -> Result<Self, StoreError> {
        let tables = snapshot
            .as_object()
            .ok_or_else(|| StoreError::Open("snapshot must be a JSON object of tables".into()))?;
        let store = Self::new();
        for (table, rows) in tables {
            let rows = rows
                .as_array()
                .ok_or_else(|| StoreError::Open(format!("table '{table}' must be an array of rows")))?;
            let rows: Vec<Row> = rows
                .iter()
                .map(|r| {
                    r.as_object()
                        .cloned()
                        .ok_or_else(|| StoreError::Open(format!("table '{table}': rows must be objects")))
                })
                .collect::<Result<_, _>>()?;
            store.insert_rows(table, rows);
        }
        Ok(store)
    }

    /// Append rows without going through the counted `upsert` path.
    pub fn insert_rows(&self, table: &str, rows: Vec<Row>) {
        self.inner
            .lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Snapshot of a table's current rows.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.inner.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> CallCounts {
        self.inner.lock().calls
    }

    pub fn fail_fetch(&self, table: &str) {
        self.push_failure(FailOp::Fetch, table, None, None);
    }

    /// Fail updates on `table.column` whose match value is `target`.
    pub fn fail_update(&self, table: &str, column: &str, target: &str) {
        self.push_failure(FailOp::Update, table, Some(column), Some(target));
    }

    /// Fail deletes on `table`; with `target`, only calls whose id list contains it.
    pub fn fail_delete(&self, table: &str, target: Option<&str>) {
        self.push_failure(FailOp::Delete, table, None, target);
    }

    pub fn clear_failures(&self) {
        self.inner.lock().failures.clear();
    }

    fn push_failure(&self, op: FailOp, table: &str, column: Option<&str>, target: Option<&str>) {
        self.inner.lock().failures.push(Failure {
            op,
            table: table.to_string(),
            column: column.map(str::to_string),
            target: target.map(str::to_string),
        });
    }
}

impl RecordStore for MemoryStore {
    fn fetch_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.fetches += 1;
        inner.check(FailOp::Fetch, table, None, &[])?;
        Ok(inner.tables.get(table).cloned().unwrap_or_default())
    }

    fn fetch_all_ordered(&self, table: &str, order_by: &str) -> Result<Vec<Row>, StoreError> {
        let mut rows = self.fetch_all(table)?;
        rows.sort_by(|a, b| {
            compare_values(
                a.get(order_by).unwrap_or(&Value::Null),
                b.get(order_by).unwrap_or(&Value::Null),
            )
        });
        Ok(rows)
    }

    fn update_where_equals(
        &self,
        table: &str,
        column: &str,
        match_value: &Value,
        set_column: &str,
        set_value: &Value,
    ) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.updates += 1;
        inner.check(FailOp::Update, table, Some(column), &[match_value])?;
        Ok(inner.update(table, column, match_value, set_column, set_value))
    }

    fn delete_by_ids(&self, table: &str, ids: &[Value]) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.deletes += 1;
        let refs: Vec<&Value> = ids.iter().collect();
        inner.check(FailOp::Delete, table, None, &refs)?;
        Ok(inner.delete(table, ids))
    }

    fn upsert(&self, table: &str, rows: &[Row]) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.upserts += 1;
        let existing = inner.tables.entry(table.to_string()).or_default();
        for row in rows {
            let slot = row.get(ID_COLUMN).and_then(|id| {
                existing
                    .iter()
                    .position(|r| r.get(ID_COLUMN).is_some_and(|e| values_equal(e, id)))
            });
            match slot {
                Some(i) => existing[i] = row.clone(),
                None => existing.push(row.clone()),
            }
        }
        Ok(rows.len())
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    /// Validates every op against the configured failures first, then applies
    /// all of them under the same lock.
    fn apply_atomic(&self, ops: &[WriteOp]) -> Result<Vec<usize>, StoreError> {
        let mut inner = self.inner.lock();
        for op in ops {
            match op {
                WriteOp::Update { table, column, match_value, .. } => {
                    inner.calls.updates += 1;
                    inner.check(FailOp::Update, table, Some(column.as_str()), &[match_value])?;
                }
                WriteOp::Delete { table, ids } => {
                    inner.calls.deletes += 1;
                    let refs: Vec<&Value> = ids.iter().collect();
                    inner.check(FailOp::Delete, table, None, &refs)?;
                }
            }
        }
        let touched = ops
            .iter()
            .map(|op| match op {
                WriteOp::Update { table, column, match_value, set_column, set_value } => {
                    inner.update(table, column, match_value, set_column, set_value)
                }
                WriteOp::Delete { table, ids } => inner.delete(table, ids),
            })
            .collect();
        Ok(touched)
    }
}
