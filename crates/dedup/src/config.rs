use std::path::Path;

use serde::{Deserialize, Serialize};

use casework_store::MAX_DELETE_BATCH;

use crate::error::DedupError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DedupConfig {
    pub person_table: String,
    /// Creation timestamp column; every fetch is ordered by it.
    pub created_column: String,
    /// Ids per `delete_by_ids` call.
    pub delete_chunk_size: usize,
    /// Worker threads for per-duplicate merges. 1 = fully sequential.
    pub workers: usize,
    /// Run each duplicate's rewrite-then-delete in one transaction when the
    /// store supports it.
    pub atomic_merge: bool,
    /// Leave soft-deleted persons out of grouping.
    pub skip_soft_deleted: bool,
    /// Persons whose name normalizes to "" form one group like any other
    /// key. Turn off to leave nameless records unmerged.
    pub group_blank_names: bool,
    /// Child rows with a null owning column share one key. Turn off to
    /// leave ownerless rows untouched.
    pub collapse_ownerless_rows: bool,
    pub tie_break: TieBreakPolicy,
    pub person_columns: PersonColumns,
    pub references: Vec<DependentReference>,
    /// Processed in order.
    pub child_tables: Vec<ChildTable>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            person_table: "people".into(),
            person_columns: PersonColumns::default(),
            created_column: "created_at".into(),
            delete_chunk_size: MAX_DELETE_BATCH,
            workers: 1,
            atomic_merge: true,
            skip_soft_deleted: true,
            group_blank_names: true,
            collapse_ownerless_rows: true,
            tie_break: TieBreakPolicy::default(),
            references: DependentReference::defaults(),
            child_tables: ChildTable::defaults(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersonColumns {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub date_of_birth: String,
    pub deleted_at: String,
}

impl Default for PersonColumns {
    fn default() -> Self {
        Self {
            first_name: "first_name".into(),
            last_name: "last_name".into(),
            phone: "phone".into(),
            date_of_birth: "date_of_birth".into(),
            deleted_at: "deleted_at".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tie-break
// ---------------------------------------------------------------------------

/// What happens when a candidate scores exactly as high as the running master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakPolicy {
    /// The earlier-processed record stays master.
    #[default]
    KeepIncumbent,
    /// The record with the strictly earlier creation timestamp wins.
    EarliestCreated,
    /// The record with the lexically smaller id wins.
    LowestId,
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// A foreign-key column that may hold a person id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DependentReference {
    pub table: String,
    pub column: String,
}

impl DependentReference {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("relationships", "person_id"),
            Self::new("relationships", "related_person_id"),
            Self::new("educare_enrollment", "child_id"),
            Self::new("clinicare_visits", "patient_id"),
            Self::new("legacy_women_enrollment", "woman_id"),
            Self::new("case_notes", "person_id"),
            Self::new("student_documents", "student_id"),
            Self::new("food_recipients", "family_head_id"),
        ]
    }
}

/// A child table and the columns forming its uniqueness key. The first key
/// column is the owning reference.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChildTable {
    pub table: String,
    pub key: Vec<String>,
}

impl ChildTable {
    pub fn new(table: &str, key: &[&str]) -> Self {
        Self {
            table: table.into(),
            key: key.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("educare_enrollment", &["child_id"]),
            Self::new("legacy_women_enrollment", &["woman_id", "stage"]),
            Self::new("clinicare_visits", &["patient_id", "visit_date", "reason", "cost"]),
            Self::new(
                "relationships",
                &["person_id", "related_person_id", "relationship_type"],
            ),
        ]
    }
}

// ---------------------------------------------------------------------------
// Loading + validation
// ---------------------------------------------------------------------------

impl DedupConfig {
    pub fn from_toml(input: &str) -> Result<Self, DedupError> {
        let config: DedupConfig =
            toml::from_str(input).map_err(|e| DedupError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, DedupError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| DedupError::Io(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&input)
    }

    /// Effective config, as it would be written to a file.
    pub fn to_toml(&self) -> Result<String, DedupError> {
        toml::to_string_pretty(self).map_err(|e| DedupError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), DedupError> {
        if self.person_table.trim().is_empty() {
            return Err(DedupError::ConfigValidation("person_table must not be empty".into()));
        }
        if self.created_column.trim().is_empty() {
            return Err(DedupError::ConfigValidation("created_column must not be empty".into()));
        }

        if self.delete_chunk_size == 0 || self.delete_chunk_size > MAX_DELETE_BATCH {
            return Err(DedupError::ConfigValidation(format!(
                "delete_chunk_size must be between 1 and {MAX_DELETE_BATCH}, got {}",
                self.delete_chunk_size
            )));
        }

        if self.workers == 0 {
            return Err(DedupError::ConfigValidation("workers must be at least 1".into()));
        }

        for (i, r) in self.references.iter().enumerate() {
            if r.table.trim().is_empty() || r.column.trim().is_empty() {
                return Err(DedupError::ConfigValidation(format!(
                    "references[{i}]: table and column are required"
                )));
            }
        }

        for child in &self.child_tables {
            if child.table.trim().is_empty() {
                return Err(DedupError::ConfigValidation(
                    "child_tables: table name is required".into(),
                ));
            }
            if child.key.is_empty() || child.key.iter().any(|c| c.trim().is_empty()) {
                return Err(DedupError::ConfigValidation(format!(
                    "child table '{}': key needs at least one non-empty column",
                    child.table
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = DedupConfig::from_toml("").unwrap();
        assert_eq!(config.person_table, "people");
        assert_eq!(config.delete_chunk_size, 100);
        assert_eq!(config.workers, 1);
        assert_eq!(config.references.len(), 8);
        let order: Vec<_> = config.child_tables.iter().map(|c| c.table.as_str()).collect();
        assert_eq!(
            order,
            vec!["educare_enrollment", "legacy_women_enrollment", "clinicare_visits", "relationships"]
        );
        assert_eq!(config.tie_break, TieBreakPolicy::KeepIncumbent);
        assert!(config.group_blank_names);
        assert!(config.collapse_ownerless_rows);
    }

    #[test]
    fn overrides() {
        let config = DedupConfig::from_toml(
            r#"
person_table = "beneficiaries"
delete_chunk_size = 25
workers = 4
tie_break = "lowest_id"
group_blank_names = false

[person_columns]
phone = "phone_number"

[[references]]
table = "case_notes"
column = "person_id"

[[child_tables]]
table = "clinicare_visits"
key = ["patient_id", "visit_date"]
"#,
        )
        .unwrap();
        assert_eq!(config.person_table, "beneficiaries");
        assert_eq!(config.person_columns.phone, "phone_number");
        assert_eq!(config.person_columns.first_name, "first_name");
        assert_eq!(config.references, vec![DependentReference::new("case_notes", "person_id")]);
        assert_eq!(config.child_tables[0].key, vec!["patient_id", "visit_date"]);
        assert_eq!(config.tie_break, TieBreakPolicy::LowestId);
        assert_eq!(config.workers, 4);
        assert!(!config.group_blank_names);
        assert!(config.collapse_ownerless_rows);
    }

    #[test]
    fn chunk_size_bounds() {
        let err = DedupConfig::from_toml("delete_chunk_size = 101").unwrap_err();
        assert!(err.to_string().contains("delete_chunk_size"));
        assert!(DedupConfig::from_toml("delete_chunk_size = 0").is_err());
    }

    #[test]
    fn zero_workers_rejected() {
        assert!(matches!(
            DedupConfig::from_toml("workers = 0"),
            Err(DedupError::ConfigValidation(_))
        ));
    }

    #[test]
    fn empty_key_rejected() {
        let err = DedupConfig::from_toml(
            r#"
[[child_tables]]
table = "relationships"
key = []
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("relationships"));
    }

    #[test]
    fn effective_config_reloads() {
        let config = DedupConfig {
            workers: 3,
            tie_break: TieBreakPolicy::EarliestCreated,
            ..DedupConfig::default()
        };
        let text = config.to_toml().unwrap();
        let back = DedupConfig::from_toml(&text).unwrap();
        assert_eq!(back.workers, 3);
        assert_eq!(back.tie_break, TieBreakPolicy::EarliestCreated);
        assert_eq!(back.child_tables, config.child_tables);
    }

    #[test]
    fn bad_toml_is_parse_error() {
        assert!(matches!(
            DedupConfig::from_toml("workers = \"many\""),
            Err(DedupError::ConfigParse(_))
        ));
    }
}
