use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use casework_store::{value_key, RecordStore, Row, ID_COLUMN};

use crate::config::ChildTable;
use crate::error::RunIssue;
use crate::rewrite::PendingRewrites;

const KEY_SEPARATOR: char = '\u{1f}';

/// Uniqueness key of `row` over `columns`. Nulls compare equal.
///
/// With `collapse_ownerless` false, a row whose leading (owning) column is
/// null gets no key and is never treated as a copy of another row.
pub fn uniqueness_key(row: &Row, columns: &[String], collapse_ownerless: bool) -> Option<String> {
    let (owner, rest) = columns.split_first()?;
    let mut key = match row.get(owner).and_then(value_key) {
        Some(owner) => owner,
        None if collapse_ownerless => String::new(),
        None => return None,
    };
    for col in rest {
        key.push(KEY_SEPARATOR);
        if let Some(part) = row.get(col).and_then(value_key) {
            key.push_str(&part);
        }
    }
    Some(key)
}

/// Ids of every row after the first one per key, in processing order.
pub fn find_redundant<F>(rows: &[Row], key_fn: F) -> Vec<Value>
where
    F: Fn(&Row) -> Option<String>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut redundant = Vec::new();

    for row in rows {
        let Some(key) = key_fn(row) else { continue };
        if seen.contains(&key) {
            if let Some(id) = row.get(ID_COLUMN).filter(|v| !v.is_null()) {
                redundant.push(id.clone());
            }
        } else {
            seen.insert(key);
        }
    }

    redundant
}

#[derive(Debug, Clone, Copy)]
pub struct ChildPassOptions<'a> {
    /// Creation column; the earliest row per key survives.
    pub order_by: &'a str,
    pub chunk_size: usize,
    pub dry_run: bool,
    pub collapse_ownerless: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub scanned: usize,
    /// Rows deleted, or that would be deleted in a dry run.
    pub removed: usize,
    pub skipped: bool,
}

/// Keep the earliest-created row per uniqueness key and delete the rest.
///
/// `pending` rewrites are applied to the fetched rows before keys are
/// computed, so a dry run counts rows that only collide after the merge.
/// A fetch failure skips the table. A delete failure stops further deletes
/// on this table; rows already removed stay removed.
pub fn deduplicate_table<S, F>(
    store: &S,
    table: &str,
    key_fn: F,
    options: ChildPassOptions<'_>,
    pending: Option<&PendingRewrites<'_>>,
) -> (TableSummary, Vec<RunIssue>)
where
    S: RecordStore + ?Sized,
    F: Fn(&Row) -> Option<String>,
{
    let mut summary = TableSummary {
        table: table.to_string(),
        scanned: 0,
        removed: 0,
        skipped: false,
    };

    let mut rows = match store.fetch_all_ordered(table, options.order_by) {
        Ok(rows) => rows,
        Err(e) => {
            let issue = RunIssue::child_dedup(table, Vec::new(), &e);
            log::warn!("{issue}; skipping table");
            summary.skipped = true;
            return (summary, vec![issue]);
        }
    };
    summary.scanned = rows.len();

    if let Some(pending) = pending {
        let projected = rows.iter_mut().map(|row| pending.apply(table, row)).filter(|&changed| changed).count();
        if projected > 0 {
            log::debug!("{table}: {projected} row(s) projected onto their masters");
        }
    }

    let redundant = find_redundant(&rows, key_fn);
    if redundant.is_empty() || options.dry_run {
        summary.removed = redundant.len();
        return (summary, Vec::new());
    }

    let mut issues = Vec::new();
    for chunk in redundant.chunks(options.chunk_size.max(1)) {
        match store.delete_by_ids(table, chunk) {
            Ok(n) => summary.removed += n,
            Err(e) => {
                let ids: Vec<String> = chunk.iter().filter_map(value_key).collect();
                let issue = RunIssue::child_dedup(table, ids, &e);
                log::warn!("{issue}; skipping the rest of this table");
                issues.push(issue);
                summary.skipped = true;
                break;
            }
        }
    }

    (summary, issues)
}

/// Run the uniqueness pass for one configured child table.
pub fn deduplicate_child<S: RecordStore + ?Sized>(
    store: &S,
    child: &ChildTable,
    options: ChildPassOptions<'_>,
    pending: Option<&PendingRewrites<'_>>,
) -> (TableSummary, Vec<RunIssue>) {
    deduplicate_table(
        store,
        &child.table,
        |row| uniqueness_key(row, &child.key, options.collapse_ownerless),
        options,
        pending,
    )
}
