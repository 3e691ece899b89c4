// Casework tables, as mirrored into a local SQLite database

/// Person table plus every table that carries a person id. Ids are TEXT so
/// UUIDs from the hosted store round-trip unchanged.
pub const CASEWORK_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS people (
    id TEXT PRIMARY KEY,
    first_name TEXT,
    last_name TEXT,
    phone TEXT,
    date_of_birth TEXT,
    created_at TEXT,
    deleted_at TEXT
);

CREATE TABLE IF NOT EXISTS relationships (
    id TEXT PRIMARY KEY,
    person_id TEXT,
    related_person_id TEXT,
    relationship_type TEXT,
    created_at TEXT
);

CREATE TABLE IF NOT EXISTS educare_enrollment (
    id TEXT PRIMARY KEY,
    child_id TEXT,
    school_name TEXT,
    grade TEXT,
    created_at TEXT
);

CREATE TABLE IF NOT EXISTS clinicare_visits (
    id TEXT PRIMARY KEY,
    patient_id TEXT,
    visit_date TEXT,
    reason TEXT,
    cost REAL,
    created_at TEXT
);

CREATE TABLE IF NOT EXISTS legacy_women_enrollment (
    id TEXT PRIMARY KEY,
    woman_id TEXT,
    stage TEXT,
    created_at TEXT
);

CREATE TABLE IF NOT EXISTS case_notes (
    id TEXT PRIMARY KEY,
    person_id TEXT,
    note TEXT,
    created_at TEXT
);

CREATE TABLE IF NOT EXISTS student_documents (
    id TEXT PRIMARY KEY,
    student_id TEXT,
    file_name TEXT,
    created_at TEXT
);

CREATE TABLE IF NOT EXISTS food_recipients (
    id TEXT PRIMARY KEY,
    family_head_id TEXT,
    household_size INTEGER,
    created_at TEXT
);
"#;
