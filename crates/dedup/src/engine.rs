use std::cmp::Ordering;

use serde_json::Value;

use casework_store::{RecordStore, StoreError, WriteOp};

use crate::children::{deduplicate_child, ChildPassOptions, TableSummary};
use crate::commit::delete_duplicates;
use crate::config::DedupConfig;
use crate::error::{DedupError, RunIssue};
use crate::master::plan_merges;
use crate::model::{MergePlan, Person, PersonId};
use crate::report::{DedupReport, MergeRecord, PersonPassSummary, RunMeta};
use crate::rewrite::{rewrite_ops, rewrite_references, PendingRewrites};
use crate::schedule::run_bounded;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Fetch and plan, but issue no writes.
    pub dry_run: bool,
}

/// Run the person merge pass, then the child uniqueness pass over every
/// configured table.
///
/// Per-operation failures are recorded in the report and the run carries on;
/// only an invalid config is returned as an error.
pub fn run<S>(store: &S, config: &DedupConfig, options: RunOptions) -> Result<DedupReport, DedupError>
where
    S: RecordStore + Sync + ?Sized,
{
    config.validate()?;

    let atomic = config.atomic_merge && store.supports_transactions();
    let mut issues = Vec::new();

    let (persons, merges, plan) = person_pass(store, config, options, atomic, &mut issues);

    // A dry run wrote nothing, so the child pass replays the planned
    // rewrites on the rows it fetches.
    let pending = match &plan {
        Some(plan) if options.dry_run => Some(PendingRewrites::new(&config.references, plan.duplicate_to_master())),
        _ => None,
    };
    let child_options = ChildPassOptions {
        order_by: &config.created_column,
        chunk_size: config.delete_chunk_size,
        dry_run: options.dry_run,
        collapse_ownerless: config.collapse_ownerless_rows,
    };

    let mut tables: Vec<TableSummary> = Vec::with_capacity(config.child_tables.len());
    for child in &config.child_tables {
        log::info!("deduplicating {} by ({})", child.table, child.key.join(", "));
        let (summary, table_issues) = deduplicate_child(store, child, child_options, pending.as_ref());
        log::info!("{}: {} of {} row(s) redundant", summary.table, summary.removed, summary.scanned);
        tables.push(summary);
        issues.extend(table_issues);
    }

    Ok(DedupReport {
        meta: RunMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            dry_run: options.dry_run,
            workers: config.workers,
            atomic,
            tie_break: config.tie_break,
        },
        persons,
        tables,
        merges,
        issues,
    })
}

/// Fetch persons ordered by creation time, with ties pinned by id so the
/// plan does not depend on the store's row order.
pub fn load_persons<S: RecordStore + ?Sized>(
    store: &S,
    config: &DedupConfig,
) -> Result<Vec<Person>, StoreError> {
    let rows = store.fetch_all_ordered(&config.person_table, &config.created_column)?;
    let total = rows.len();

    let mut persons: Vec<Person> = rows
        .iter()
        .filter_map(|row| Person::from_row(row, &config.person_columns, &config.created_column))
        .filter(|p| !(config.skip_soft_deleted && p.deleted))
        .collect();

    if persons.len() < total {
        log::debug!(
            "{}: {} row(s) without id or soft-deleted left out",
            config.person_table,
            total - persons.len()
        );
    }

    persons.sort_by(|a, b| created_order(a, b).then_with(|| a.id.cmp(&b.id)));
    Ok(persons)
}

fn created_order(a: &Person, b: &Person) -> Ordering {
    match (a.created_at, b.created_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn person_pass<S>(
    store: &S,
    config: &DedupConfig,
    options: RunOptions,
    atomic: bool,
    issues: &mut Vec<RunIssue>,
) -> (PersonPassSummary, Vec<MergeRecord>, Option<MergePlan>)
where
    S: RecordStore + Sync + ?Sized,
{
    let mut summary = PersonPassSummary {
        table: config.person_table.clone(),
        ..Default::default()
    };

    log::info!("scanning {}", config.person_table);
    let persons = match load_persons(store, config) {
        Ok(persons) => persons,
        Err(e) => {
            let issue = RunIssue::fetch(&config.person_table, &e);
            log::warn!("{issue}; skipping person merge");
            issues.push(issue);
            summary.skipped = true;
            return (summary, Vec::new(), None);
        }
    };

    let plan = plan_merges(persons, &config.tie_break, config.group_blank_names);
    summary.scanned = plan.persons_scanned();
    summary.groups = plan.groups().len();
    summary.duplicates_found = plan.duplicate_count();
    log::info!(
        "{} person(s), {} duplicate group(s), {} duplicate(s)",
        summary.scanned,
        summary.groups,
        summary.duplicates_found
    );

    let merges = MergeRecord::from_plan(&plan);
    if plan.is_empty() {
        return (summary, merges, None);
    }

    if options.dry_run {
        summary.merged = plan.duplicate_count();
        return (summary, merges, Some(plan));
    }

    if atomic {
        merge_atomic(store, config, &plan, &mut summary, issues);
    } else {
        merge_best_effort(store, config, &plan, &mut summary, issues);
    }

    log::info!(
        "{}: merged {} duplicate(s), {} retained",
        config.person_table,
        summary.merged,
        summary.retained
    );
    (summary, merges, Some(plan))
}

fn merge_jobs(plan: &MergePlan) -> Vec<(PersonId, PersonId)> {
    plan.duplicate_to_master()
        .iter()
        .map(|(dup, master)| (dup.clone(), master.clone()))
        .collect()
}

/// Rewrite every duplicate's references (in parallel when configured), then
/// delete only the duplicates whose rewrites all succeeded.
fn merge_best_effort<S>(
    store: &S,
    config: &DedupConfig,
    plan: &MergePlan,
    summary: &mut PersonPassSummary,
    issues: &mut Vec<RunIssue>,
) where
    S: RecordStore + Sync + ?Sized,
{
    let outcomes = run_bounded(merge_jobs(plan), config.workers, |(dup, master)| {
        rewrite_references(store, &dup, &master, &config.references)
    });

    let mut confirmed: Vec<Value> = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        summary.rewrites_issued += outcome.calls;
        summary.rows_rewritten += outcome.rows_rewritten;
        if outcome.confirmed() {
            confirmed.push(outcome.duplicate.to_value());
        } else {
            log::warn!("keeping {}: references not fully rewritten", outcome.duplicate);
            summary.retained += 1;
            issues.extend(outcome.failures);
        }
    }

    let commit = delete_duplicates(store, &config.person_table, &confirmed, config.delete_chunk_size);
    summary.merged += commit.deleted;
    summary.retained += commit.retained.len();
    issues.extend(commit.failures);
}

/// One transaction per duplicate: all rewrites, then the delete.
fn merge_atomic<S>(
    store: &S,
    config: &DedupConfig,
    plan: &MergePlan,
    summary: &mut PersonPassSummary,
    issues: &mut Vec<RunIssue>,
) where
    S: RecordStore + Sync + ?Sized,
{
    let results = run_bounded(merge_jobs(plan), config.workers, |(dup, master)| {
        let mut ops = rewrite_ops(&dup, &master, &config.references);
        ops.push(WriteOp::Delete {
            table: config.person_table.clone(),
            ids: vec![dup.to_value()],
        });
        store
            .apply_atomic(&ops)
            .map_err(|e| RunIssue::merge_transaction(&config.person_table, dup.as_str(), &e))
    });

    for result in results {
        summary.rewrites_issued += config.references.len();
        match result {
            Ok(touched) => {
                let (deleted, rewritten) = touched.split_last().map_or((0, &[][..]), |(d, r)| (*d, r));
                summary.rows_rewritten += rewritten.iter().sum::<usize>();
                summary.merged += deleted;
            }
            Err(issue) => {
                log::warn!("{issue}");
                summary.retained += 1;
                issues.push(issue);
            }
        }
    }
}
