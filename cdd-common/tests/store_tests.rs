//! Tests for the persistent slot store
//!
//! Each test uses its own temporary directory so stores never collide.

use cdd_common::db::{init_store, read_slot, write_slot};
use cdd_common::{AttributeRecord, RawMetadata};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn sample_raw() -> RawMetadata {
    let mut overrides = BTreeMap::new();
    overrides.insert(
        "test_override_study".to_string(),
        vec![AttributeRecord::new("AGE", "", "", "", "", "100")],
    );
    RawMetadata {
        attributes: vec![AttributeRecord::new(
            "AGE",
            "Diagnosis Age",
            "Age at which a condition or disease was first diagnosed.",
            "NUMBER",
            "PATIENT",
            "1",
        )],
        overrides,
    }
}

#[tokio::test]
async fn test_init_store_creates_missing_directories() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("primary.db");

    let _pool = init_store(&db_path).await.expect("store should open");

    assert!(db_path.exists());
}

#[tokio::test]
async fn test_unwritten_slot_reads_as_none() {
    let dir = TempDir::new().unwrap();
    let pool = init_store(&dir.path().join("primary.db")).await.unwrap();

    let slot = read_slot::<Vec<AttributeRecord>>(&pool, "attributes")
        .await
        .unwrap();

    assert!(slot.is_none());
}

#[tokio::test]
async fn test_slot_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("primary.db");
    let raw = sample_raw();

    {
        let pool = init_store(&db_path).await.unwrap();
        write_slot(&pool, "attributes", &raw.attributes).await.unwrap();
        write_slot(&pool, "overrides", &raw.overrides).await.unwrap();
        pool.close().await;
    }

    let pool = init_store(&db_path).await.unwrap();
    let attributes = read_slot::<Vec<AttributeRecord>>(&pool, "attributes")
        .await
        .unwrap()
        .expect("attributes slot present");
    let overrides = read_slot::<BTreeMap<String, Vec<AttributeRecord>>>(&pool, "overrides")
        .await
        .unwrap()
        .expect("overrides slot present");

    assert_eq!(attributes.value, raw.attributes);
    assert_eq!(overrides.value["test_override_study"][0].priority(), "100");
}

#[tokio::test]
async fn test_write_slot_replaces_previous_payload() {
    let dir = TempDir::new().unwrap();
    let pool = init_store(&dir.path().join("primary.db")).await.unwrap();

    write_slot(&pool, "attributes", &sample_raw().attributes).await.unwrap();
    write_slot(&pool, "attributes", &Vec::<AttributeRecord>::new()).await.unwrap();

    let slot = read_slot::<Vec<AttributeRecord>>(&pool, "attributes")
        .await
        .unwrap()
        .unwrap();
    assert!(slot.value.is_empty());
}

#[tokio::test]
async fn test_corrupt_payload_is_an_error() {
    let dir = TempDir::new().unwrap();
    let pool = init_store(&dir.path().join("primary.db")).await.unwrap();

    sqlx::query("INSERT INTO snapshot_slots (slot, payload, saved_at) VALUES ('attributes', 'not json', '2024-01-01T00:00:00+00:00')")
        .execute(&pool)
        .await
        .unwrap();

    let result = read_slot::<Vec<AttributeRecord>>(&pool, "attributes").await;
    assert!(matches!(result, Err(cdd_common::Error::Json(_))));
}
