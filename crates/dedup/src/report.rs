use serde::Serialize;

use crate::children::TableSummary;
use crate::config::TieBreakPolicy;
use crate::error::RunIssue;
use crate::model::{MergePlan, PersonId};

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub engine_version: String,
    pub run_at: String,
    pub dry_run: bool,
    pub workers: usize,
    /// Whether merges ran as per-duplicate transactions.
    pub atomic: bool,
    pub tie_break: TieBreakPolicy,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PersonPassSummary {
    pub table: String,
    pub scanned: usize,
    pub groups: usize,
    pub duplicates_found: usize,
    /// Duplicates deleted (or that would be, in a dry run).
    pub merged: usize,
    /// Duplicates left in place because a rewrite or delete failed.
    pub retained: usize,
    pub rewrites_issued: usize,
    pub rows_rewritten: usize,
    pub skipped: bool,
}

/// One group's decision, for audit.
#[derive(Debug, Clone, Serialize)]
pub struct MergeRecord {
    pub key: String,
    pub master: PersonId,
    pub duplicates: Vec<PersonId>,
}

impl MergeRecord {
    pub fn from_plan(plan: &MergePlan) -> Vec<Self> {
        plan.groups()
            .iter()
            .map(|g| MergeRecord {
                key: g.key.clone(),
                master: g.master.id.clone(),
                duplicates: g.duplicates.iter().map(|d| d.id.clone()).collect(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupReport {
    pub meta: RunMeta,
    pub persons: PersonPassSummary,
    pub tables: Vec<TableSummary>,
    pub merges: Vec<MergeRecord>,
    pub issues: Vec<RunIssue>,
}

impl DedupReport {
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Rows removed across the person table and every child table.
    pub fn total_removed(&self) -> usize {
        self.persons.merged + self.tables.iter().map(|t| t.removed).sum::<usize>()
    }

    /// Human-readable summary, one line per table.
    pub fn summary_lines(&self) -> Vec<String> {
        let verb = if self.meta.dry_run { "would remove" } else { "removed" };
        let mut lines = Vec::with_capacity(self.tables.len() + 2);

        let p = &self.persons;
        if p.skipped {
            lines.push(format!("{}: skipped (fetch failed)", p.table));
        } else {
            lines.push(format!(
                "{}: {verb} {} duplicate(s) across {} group(s) of {} record(s); {} retained",
                p.table, p.merged, p.groups, p.scanned, p.retained
            ));
        }

        for t in &self.tables {
            if t.skipped && t.removed == 0 {
                lines.push(format!("{}: skipped", t.table));
            } else {
                lines.push(format!(
                    "{}: {verb} {} duplicate(s) of {} row(s){}",
                    t.table,
                    t.removed,
                    t.scanned,
                    if t.skipped { " (stopped early)" } else { "" }
                ));
            }
        }

        if self.has_issues() {
            lines.push(format!("{} issue(s) recorded; re-run to retry", self.issues.len()));
        }
        lines
    }
}
