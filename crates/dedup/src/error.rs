use std::fmt;

use serde::Serialize;
use thiserror::Error;

use casework_store::StoreError;

/// Errors that stop a run before it starts.
#[derive(Debug, Error)]
pub enum DedupError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty key list, bad chunk size, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which operation boundary an issue was caught at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Bulk read of the person table failed.
    Fetch,
    /// One foreign-key update failed; the duplicate is kept.
    ReferenceRewrite,
    /// One chunk of person deletes failed.
    DeleteBatch,
    /// Fetch or delete failed during a child table's uniqueness pass.
    ChildDedup,
    /// A duplicate's rewrite-then-delete transaction was rolled back.
    MergeTransaction,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::ReferenceRewrite => write!(f, "reference_rewrite"),
            Self::DeleteBatch => write!(f, "delete_batch"),
            Self::ChildDedup => write!(f, "child_dedup"),
            Self::MergeTransaction => write!(f, "merge_transaction"),
        }
    }
}

/// A failure caught at an operation boundary and recorded instead of
/// aborting the run. Carries enough context to retry by hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunIssue {
    pub kind: IssueKind,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    pub message: String,
}

impl RunIssue {
    pub fn fetch(table: &str, err: &StoreError) -> Self {
        Self {
            kind: IssueKind::Fetch,
            table: table.to_string(),
            column: None,
            ids: Vec::new(),
            message: err.to_string(),
        }
    }

    pub fn reference_rewrite(table: &str, column: &str, duplicate_id: &str, err: &StoreError) -> Self {
        Self {
            kind: IssueKind::ReferenceRewrite,
            table: table.to_string(),
            column: Some(column.to_string()),
            ids: vec![duplicate_id.to_string()],
            message: err.to_string(),
        }
    }

    pub fn delete_batch(table: &str, ids: Vec<String>, err: &StoreError) -> Self {
        Self {
            kind: IssueKind::DeleteBatch,
            table: table.to_string(),
            column: None,
            ids,
            message: err.to_string(),
        }
    }

    pub fn child_dedup(table: &str, ids: Vec<String>, err: &StoreError) -> Self {
        Self {
            kind: IssueKind::ChildDedup,
            table: table.to_string(),
            column: None,
            ids,
            message: err.to_string(),
        }
    }

    pub fn merge_transaction(table: &str, duplicate_id: &str, err: &StoreError) -> Self {
        Self {
            kind: IssueKind::MergeTransaction,
            table: table.to_string(),
            column: None,
            ids: vec![duplicate_id.to_string()],
            message: err.to_string(),
        }
    }
}

impl fmt::Display for RunIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on '{}'", self.kind, self.table)?;
        if let Some(column) = &self.column {
            write!(f, ".{column}")?;
        }
        if !self.ids.is_empty() {
            write!(f, " ids=[{}]", self.ids.join(", "))?;
        }
        write!(f, ": {}", self.message)
    }
}
