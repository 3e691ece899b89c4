//! `casework-dedup` - identity deduplication engine.
//!
//! Groups person records by normalized name, merges each group into one
//! master (rewriting foreign keys before deleting duplicates), then removes
//! duplicate child rows per table. All persistence goes through
//! [`casework_store::RecordStore`].

pub mod children;
pub mod commit;
pub mod config;
pub mod engine;
pub mod error;
pub mod master;
pub mod model;
pub mod normalize;
pub mod report;
pub mod rewrite;
pub mod schedule;

pub use config::{ChildTable, DedupConfig, DependentReference, TieBreakPolicy};
pub use engine::{run, RunOptions};
pub use error::{DedupError, IssueKind, RunIssue};
pub use master::{plan_merges, select_master, TieBreak};
pub use model::{MergePlan, Person, PersonId};
pub use report::DedupReport;
