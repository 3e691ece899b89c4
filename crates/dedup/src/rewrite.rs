use std::collections::BTreeMap;

use casework_store::{value_key, RecordStore, Row, WriteOp};

use crate::config::DependentReference;
use crate::error::RunIssue;
use crate::model::PersonId;

/// What happened to one duplicate's references.
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub duplicate: PersonId,
    pub master: PersonId,
    /// Update calls issued, failed ones included.
    pub calls: usize,
    pub rows_rewritten: usize,
    pub failures: Vec<RunIssue>,
}

impl RewriteOutcome {
    /// Every reference was rewritten; the duplicate may be deleted.
    pub fn confirmed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The updates that move every reference from `duplicate` to `master`.
pub fn rewrite_ops(duplicate: &PersonId, master: &PersonId, refs: &[DependentReference]) -> Vec<WriteOp> {
    refs.iter()
        .map(|r| WriteOp::Update {
            table: r.table.clone(),
            column: r.column.clone(),
            match_value: duplicate.to_value(),
            set_column: r.column.clone(),
            set_value: master.to_value(),
        })
        .collect()
}

/// Point every reference to `duplicate` at `master`.
///
/// A failed update is recorded and the remaining references are still
/// attempted; the outcome is then unconfirmed.
pub fn rewrite_references<S: RecordStore + ?Sized>(
    store: &S,
    duplicate: &PersonId,
    master: &PersonId,
    refs: &[DependentReference],
) -> RewriteOutcome {
    let mut outcome = RewriteOutcome {
        duplicate: duplicate.clone(),
        master: master.clone(),
        calls: 0,
        rows_rewritten: 0,
        failures: Vec::new(),
    };

    let from = duplicate.to_value();
    let to = master.to_value();

    for r in refs {
        outcome.calls += 1;
        match store.update_where_equals(&r.table, &r.column, &from, &r.column, &to) {
            Ok(n) => {
                if n > 0 {
                    log::debug!("{}.{}: {n} row(s) {duplicate} -> {master}", r.table, r.column);
                }
                outcome.rows_rewritten += n;
            }
            Err(e) => {
                let issue = RunIssue::reference_rewrite(&r.table, &r.column, duplicate.as_str(), &e);
                log::warn!("{issue}");
                outcome.failures.push(issue);
            }
        }
    }

    outcome
}

/// Rewrites a dry run leaves unapplied. Replayed on fetched child rows so
/// the uniqueness pass sees the table as it would be after the merge.
#[derive(Debug, Clone, Copy)]
pub struct PendingRewrites<'a> {
    refs: &'a [DependentReference],
    duplicate_to_master: &'a BTreeMap<PersonId, PersonId>,
}

impl<'a> PendingRewrites<'a> {
    pub fn new(refs: &'a [DependentReference], duplicate_to_master: &'a BTreeMap<PersonId, PersonId>) -> Self {
        Self {
            refs,
            duplicate_to_master,
        }
    }

    /// Point every reference column of `table` in `row` at its master.
    /// Returns whether any cell changed.
    pub fn apply(&self, table: &str, row: &mut Row) -> bool {
        let mut changed = false;
        for r in self.refs.iter().filter(|r| r.table == table) {
            let Some(cell) = row.get_mut(&r.column) else {
                continue;
            };
            let Some(master) = value_key(cell).and_then(|k| self.duplicate_to_master.get(&PersonId(k))) else {
                continue;
            };
            *cell = master.to_value();
            changed = true;
        }
        changed
    }
}
