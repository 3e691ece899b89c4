use casework_store::{RecordStore, Row, SqliteStore, StoreError, WriteOp};
use serde_json::{json, Value};

fn row(v: Value) -> Row {
    v.as_object().unwrap().clone()
}

fn seeded() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("casework.db")).unwrap();
    store.ensure_schema().unwrap();
    store
        .upsert(
            "people",
            &[
                row(json!({"id": "p1", "first_name": "Jane", "last_name": "Doe", "created_at": "2024-02-01T00:00:00Z"})),
                row(json!({"id": "p2", "first_name": "jane", "last_name": " doe ", "phone": "+260971234567", "created_at": "2024-01-01T00:00:00Z"})),
                row(json!({"id": "p3", "first_name": "Moses", "last_name": "Banda", "created_at": null})),
            ],
        )
        .unwrap();
    store
        .upsert(
            "relationships",
            &[row(json!({"id": "r1", "person_id": "p1", "related_person_id": "p3", "relationship_type": "sibling"}))],
        )
        .unwrap();
    (dir, store)
}

#[test]
fn ordered_fetch_puts_nulls_last() {
    let (_dir, store) = seeded();
    let rows = store.fetch_all_ordered("people", "created_at").unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["p2", "p1", "p3"]);
}

#[test]
fn update_where_equals_rewrites_matching_rows() {
    let (_dir, store) = seeded();
    let n = store
        .update_where_equals("relationships", "person_id", &json!("p1"), "person_id", &json!("p2"))
        .unwrap();
    assert_eq!(n, 1);
    let again = store
        .update_where_equals("relationships", "person_id", &json!("p1"), "person_id", &json!("p2"))
        .unwrap();
    assert_eq!(again, 0);
    let rels = store.fetch_all("relationships").unwrap();
    assert_eq!(rels[0]["person_id"], json!("p2"));
}

#[test]
fn delete_by_ids_ignores_missing() {
    let (_dir, store) = seeded();
    let n = store.delete_by_ids("people", &[json!("p1"), json!("nope")]).unwrap();
    assert_eq!(n, 1);
    assert_eq!(store.fetch_all("people").unwrap().len(), 2);
    assert_eq!(store.delete_by_ids("people", &[]).unwrap(), 0);
}

#[test]
fn unknown_table_is_a_query_error() {
    let (_dir, store) = seeded();
    match store.fetch_all("no_such_table") {
        Err(StoreError::Query { table, .. }) => assert_eq!(table, "no_such_table"),
        other => panic!("expected query error, got {other:?}"),
    }
}

#[test]
fn failed_atomic_batch_rolls_back() {
    let (_dir, store) = seeded();
    assert!(store.supports_transactions());
    let ops = vec![
        WriteOp::Update {
            table: "relationships".into(),
            column: "person_id".into(),
            match_value: json!("p1"),
            set_column: "person_id".into(),
            set_value: json!("p2"),
        },
        WriteOp::Update {
            table: "missing_table".into(),
            column: "person_id".into(),
            match_value: json!("p1"),
            set_column: "person_id".into(),
            set_value: json!("p2"),
        },
        WriteOp::Delete { table: "people".into(), ids: vec![json!("p1")] },
    ];
    assert!(store.apply_atomic(&ops).is_err());
    let rels = store.fetch_all("relationships").unwrap();
    assert_eq!(rels[0]["person_id"], json!("p1"));
    assert_eq!(store.fetch_all("people").unwrap().len(), 3);
}

#[test]
fn atomic_batch_commits() {
    let (_dir, store) = seeded();
    let ops = vec![
        WriteOp::Update {
            table: "relationships".into(),
            column: "person_id".into(),
            match_value: json!("p1"),
            set_column: "person_id".into(),
            set_value: json!("p2"),
        },
        WriteOp::Delete { table: "people".into(), ids: vec![json!("p1")] },
    ];
    let touched = store.apply_atomic(&ops).unwrap();
    assert_eq!(touched, vec![1, 1]);
    assert_eq!(store.fetch_all("people").unwrap().len(), 2);
}
