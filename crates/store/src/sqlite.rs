// SQLite-backed record store

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Number, Value};

use crate::error::StoreError;
use crate::schema::CASEWORK_SCHEMA;
use crate::value::Row;
use crate::{RecordStore, WriteOp, ID_COLUMN};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Open(format!("{}: {e}", path.display())))?;
        log::debug!("opened sqlite store at {}", path.display());
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Create the casework tables if they are missing.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn
            .lock()
            .execute_batch(CASEWORK_SCHEMA)
            .map_err(|e| StoreError::query("schema", e))
    }

    fn select(&self, table: &str, order_by: Option<&str>) -> Result<Vec<Row>, StoreError> {
        let mut sql = format!("SELECT * FROM {}", quote_ident(table)?);
        if let Some(col) = order_by {
            let col = quote_ident(col)?;
            sql.push_str(&format!(" ORDER BY {col} IS NULL, {col} ASC"));
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(|e| StoreError::query(table, e))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt.query([]).map_err(|e| StoreError::query(table, e))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| StoreError::query(table, e))? {
            let mut record = Row::new();
            for (i, name) in columns.iter().enumerate() {
                let cell = row.get_ref(i).map_err(|e| StoreError::query(table, e))?;
                record.insert(name.clone(), from_sql(cell));
            }
            out.push(record);
        }
        Ok(out)
    }
}

impl RecordStore for SqliteStore {
    fn fetch_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        self.select(table, None)
    }

    fn fetch_all_ordered(&self, table: &str, order_by: &str) -> Result<Vec<Row>, StoreError> {
        self.select(table, Some(order_by))
    }

    fn update_where_equals(
        &self,
        table: &str,
        column: &str,
        match_value: &Value,
        set_column: &str,
        set_value: &Value,
    ) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        exec_update(&conn, table, column, match_value, set_column, set_value)
    }

    fn delete_by_ids(&self, table: &str, ids: &[Value]) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        exec_delete(&conn, table, ids)
    }

    fn upsert(&self, table: &str, rows: &[Row]) -> Result<usize, StoreError> {
        let table_ident = quote_ident(table)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(|e| StoreError::query(table, e))?;
        for row in rows {
            let columns: Vec<String> = row.keys().map(|c| quote_ident(c)).collect::<Result<_, _>>()?;
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT OR REPLACE INTO {table_ident} ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            );
            tx.execute(&sql, params_from_iter(row.values().map(to_sql)))
                .map_err(|e| StoreError::query(table, e))?;
        }
        tx.commit().map_err(|e| StoreError::query(table, e))?;
        Ok(rows.len())
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn apply_atomic(&self, ops: &[WriteOp]) -> Result<Vec<usize>, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(|e| StoreError::query("transaction", e))?;
        let mut touched = Vec::with_capacity(ops.len());
        for op in ops {
            let n = match op {
                WriteOp::Update { table, column, match_value, set_column, set_value } => {
                    exec_update(&tx, table, column, match_value, set_column, set_value)?
                }
                WriteOp::Delete { table, ids } => exec_delete(&tx, table, ids)?,
            };
            touched.push(n);
        }
        // Dropping an uncommitted transaction rolls it back.
        tx.commit().map_err(|e| StoreError::query("transaction", e))?;
        Ok(touched)
    }
}

fn exec_update(
    conn: &Connection,
    table: &str,
    column: &str,
    match_value: &Value,
    set_column: &str,
    set_value: &Value,
) -> Result<usize, StoreError> {
    let sql = format!(
        "UPDATE {} SET {} = ?1 WHERE {} = ?2",
        quote_ident(table)?,
        quote_ident(set_column)?,
        quote_ident(column)?
    );
    conn.execute(&sql, [to_sql(set_value), to_sql(match_value)])
        .map_err(|e| StoreError::query(table, e))
}

fn exec_delete(conn: &Connection, table: &str, ids: &[Value]) -> Result<usize, StoreError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "DELETE FROM {} WHERE {} IN ({})",
        quote_ident(table)?,
        quote_ident(ID_COLUMN)?,
        placeholders.join(", ")
    );
    conn.execute(&sql, params_from_iter(ids.iter().map(to_sql)))
        .map_err(|e| StoreError::query(table, e))
}

/// Table and column names come from config; only plain identifiers pass.
fn quote_ident(name: &str) -> Result<String, StoreError> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(format!("\"{name}\""))
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}
