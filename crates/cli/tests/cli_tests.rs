// End-to-end tests for the casework binary: init, import, plan, run.
//
// Each test points XDG_CONFIG_HOME at a temp dir so a developer's own
// settings.toml never leaks in.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn casework(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_casework"));
    cmd.env("XDG_CONFIG_HOME", home)
        .env_remove("CASEWORK_DB")
        .env("RUST_LOG", "warn");
    cmd
}

fn snapshot_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../dedup/tests/fixtures/snapshot.json")
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

/// Fresh database with the fixture snapshot loaded.
fn seeded() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("casework.db");
    let db_arg = db.to_str().unwrap();

    let out = casework(dir.path()).args(["init", "--db", db_arg]).output().unwrap();
    assert!(out.status.success(), "init failed: {}", stderr(&out));

    let out = casework(dir.path())
        .args(["import", snapshot_path().to_str().unwrap(), "--db", db_arg])
        .output()
        .unwrap();
    assert!(out.status.success(), "import failed: {}", stderr(&out));
    assert!(stderr(&out).contains("people: 7 row(s)"));

    (dir, db)
}

fn run_json(dir: &TempDir, db: &Path, extra: &[&str]) -> (Output, serde_json::Value) {
    let out = casework(dir.path())
        .args(["run", "--db", db.to_str().unwrap(), "--json"])
        .args(extra)
        .output()
        .unwrap();
    let report = serde_json::from_slice(&out.stdout).unwrap_or(serde_json::Value::Null);
    (out, report)
}

#[test]
fn run_merges_and_reports_json() {
    let (dir, db) = seeded();
    let (out, report) = run_json(&dir, &db, &[]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    assert_eq!(report["persons"]["merged"], 3);
    assert_eq!(report["persons"]["duplicates_found"], 3);
    assert_eq!(report["meta"]["dry_run"], false);
    assert_eq!(report["issues"].as_array().unwrap().len(), 0);
    let tables = report["tables"].as_array().unwrap();
    assert_eq!(tables.len(), 4);
    assert!(stderr(&out).contains("people: removed 3 duplicate(s)"));

    // second run has nothing left to do
    let (out, again) = run_json(&dir, &db, &[]);
    assert!(out.status.success());
    assert_eq!(again["persons"]["merged"], 0);
}

#[test]
fn plan_does_not_write() {
    let (dir, db) = seeded();
    let out = casework(dir.path())
        .args(["plan", "--db", db.to_str().unwrap(), "--json"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["meta"]["dry_run"], true);
    assert_eq!(report["persons"]["merged"], 3);
    assert!(stderr(&out).contains("would remove"));

    // the real run still finds everything
    let (_, report) = run_json(&dir, &db, &[]);
    assert_eq!(report["persons"]["merged"], 3);
}

#[test]
fn output_file_gets_the_report() {
    let (dir, db) = seeded();
    let path = dir.path().join("report.json");
    let out = casework(dir.path())
        .args(["run", "--db", db.to_str().unwrap(), "--workers", "3", "-o", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(out.stdout.is_empty());
    let report: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(report["meta"]["workers"], 3);
}

#[test]
fn strict_exits_4_on_recorded_issues() {
    let (dir, db) = seeded();
    let config = dir.path().join("dedup.toml");
    std::fs::write(
        &config,
        r#"
[[references]]
table = "no_such_table"
column = "person_id"
"#,
    )
    .unwrap();
    let config_arg = config.to_str().unwrap();

    let (out, report) = run_json(&dir, &db, &["--config", config_arg]);
    assert!(out.status.success(), "non-strict run should exit 0");
    assert!(!report["issues"].as_array().unwrap().is_empty());

    let (out, _) = run_json(&dir, &db, &["--config", config_arg, "--strict"]);
    assert_eq!(out.status.code(), Some(4));
    assert!(stderr(&out).contains("issue(s)"));
}

#[test]
fn missing_store_exits_3() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("absent.db");
    let out = casework(dir.path())
        .args(["run", "--db", db.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("casework init"));
}

#[test]
fn no_store_configured_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = casework(dir.path()).args(["run"]).output().unwrap();
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("--db"));
}

#[test]
fn store_path_comes_from_settings() {
    let (dir, db) = seeded();
    let settings_dir = dir.path().join("casework");
    std::fs::create_dir_all(&settings_dir).unwrap();
    std::fs::write(
        settings_dir.join("settings.toml"),
        format!("[store]\npath = {:?}\n", db.to_str().unwrap()),
    )
    .unwrap();

    let out = casework(dir.path()).args(["plan", "--json"]).output().unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["persons"]["scanned"], 6);
}

#[test]
fn validate_prints_effective_config() {
    let dir = tempfile::tempdir().unwrap();
    let out = casework(dir.path()).args(["validate"]).output().unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("person_table = \"people\""));
    assert!(stdout.contains("clinicare_visits"));
}

#[test]
fn invalid_config_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("dedup.toml");
    std::fs::write(&config, "delete_chunk_size = 500\n").unwrap();
    let out = casework(dir.path())
        .args(["validate", "--config", config.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("delete_chunk_size"));

    let out = casework(dir.path())
        .args(["run", "--db", "whatever.db", "--workers", "0"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn import_rejects_non_object_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("casework.db");
    let db_arg = db.to_str().unwrap();
    let out = casework(dir.path()).args(["init", "--db", db_arg]).output().unwrap();
    assert!(out.status.success());

    let snapshot = dir.path().join("bad.json");
    std::fs::write(&snapshot, r#"{"people": [{"id": "p1"}, 1]}"#).unwrap();
    let out = casework(dir.path())
        .args(["import", snapshot.to_str().unwrap(), "--db", db_arg])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("table 'people': rows must be objects"));
    assert!(!stderr(&out).contains("row(s)"));
}

#[test]
fn init_remember_saves_store_path() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("remembered.db");
    let out = casework(dir.path())
        .args(["init", "--db", db.to_str().unwrap(), "--remember"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let saved = std::fs::read_to_string(dir.path().join("casework/settings.toml")).unwrap();
    assert!(saved.contains("remembered.db"), "settings: {saved}");

    let out = casework(dir.path()).args(["plan", "--json"]).output().unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["persons"]["scanned"], 0);
}
