use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use casework_store::{value_key, Row, ID_COLUMN};

use crate::config::PersonColumns;

// ---------------------------------------------------------------------------
// Person
// ---------------------------------------------------------------------------

/// Person id in canonical text form. Integer and text ids both land here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PersonId(pub String);

impl PersonId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as a store cell value.
    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersonId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: PersonId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub deleted: bool,
}

impl Person {
    /// Read a person out of a store row. Rows without an id are unaddressable
    /// and yield `None`.
    pub fn from_row(row: &Row, columns: &PersonColumns, created_column: &str) -> Option<Self> {
        let id = row.get(ID_COLUMN).and_then(value_key)?;
        Some(Self {
            id: PersonId(id),
            first_name: text(row, &columns.first_name),
            last_name: text(row, &columns.last_name),
            phone: text(row, &columns.phone),
            date_of_birth: text(row, &columns.date_of_birth),
            created_at: row.get(created_column).and_then(parse_timestamp),
            deleted: row.get(&columns.deleted_at).is_some_and(|v| match v {
                Value::Null => false,
                Value::Bool(b) => *b,
                _ => true,
            }),
        })
    }

    pub fn has_phone(&self) -> bool {
        present(&self.phone)
    }

    pub fn has_date_of_birth(&self) -> bool {
        present(&self.date_of_birth)
    }
}

fn text(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(value_key)
}

fn present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` (assumed UTC) and bare dates.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Merge plan
// ---------------------------------------------------------------------------

/// One duplicate group resolved to its master.
#[derive(Debug, Clone)]
pub struct MergeGroup {
    pub key: String,
    pub master: Person,
    pub duplicates: Vec<Person>,
}

/// Result of grouping + master selection, built in one pass.
///
/// Holds both views of the same decision (group -> master and
/// duplicate -> master) so they cannot disagree.
#[derive(Debug, Clone, Default)]
pub struct MergePlan {
    groups: Vec<MergeGroup>,
    duplicate_to_master: BTreeMap<PersonId, PersonId>,
    persons_scanned: usize,
}

impl MergePlan {
    pub(crate) fn new(groups: Vec<MergeGroup>, persons_scanned: usize) -> Self {
        let duplicate_to_master = groups
            .iter()
            .flat_map(|g| g.duplicates.iter().map(|d| (d.id.clone(), g.master.id.clone())))
            .collect();
        Self {
            groups,
            duplicate_to_master,
            persons_scanned,
        }
    }

    /// Groups with at least one duplicate, in first-seen order.
    pub fn groups(&self) -> &[MergeGroup] {
        &self.groups
    }

    pub fn duplicate_to_master(&self) -> &BTreeMap<PersonId, PersonId> {
        &self.duplicate_to_master
    }

    pub fn master_of(&self, duplicate: &PersonId) -> Option<&PersonId> {
        self.duplicate_to_master.get(duplicate)
    }

    pub fn persons_scanned(&self) -> usize {
        self.persons_scanned
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicate_to_master.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
