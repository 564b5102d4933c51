//! Session store against an on-disk database

use chrono::NaiveDate;
use roastlog_common::db::{init_database, InventoryStore, SessionStore};
use roastlog_common::schema::MASTER_ORDER;
use roastlog_common::session::{BeanMetadata, Stage};
use roastlog_common::{Error, RoastSession, SessionError};
use tempfile::TempDir;

fn ten_stage_session() -> RoastSession {
    RoastSession {
        roast_date: NaiveDate::from_ymd_opt(2025, 7, 1),
        batch_weight_lbs: Some(200.0),
        stages: (0..10)
            .map(|i| Stage::new(i, Some(if i == 0 { 0.0 } else { 55.0 * i as f64 }), Some(390.0 + 5.0 * i as f64), None))
            .collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_database_persists_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("roastlog.db");

    {
        let pool = init_database(&db_path).await.unwrap();
        let store = SessionStore::new(pool.clone());
        let appended = store.append(&ten_stage_session()).await.unwrap();
        assert_eq!(appended.line_number, 1);
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let store = SessionStore::new(pool);
    let rows = store.rows().await.unwrap();

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.values().len(), MASTER_ORDER.len());
    assert_eq!(row.get("roast_date"), Some("2025-07-01"));
    assert_eq!(row.get("stage_9_temp_f"), Some("435"));
    assert_eq!(row.get("stage_9_burner_pct"), Some("NaN"));
    assert_ne!(row.get("id"), Some("NaN"));
}

#[tokio::test]
async fn test_rejected_session_leaves_store_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("roastlog.db")).await.unwrap();
    let store = SessionStore::new(pool);

    let mut session = ten_stage_session();
    session.stages[9].bean_temp_f = None;

    let err = store.append(&session).await.unwrap_err();
    assert!(matches!(err, Error::Session(SessionError::MissingFinalTemp)));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_inventory_prefills_session() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("roastlog.db")).await.unwrap();
    let inventory = InventoryStore::new(pool);

    let id = inventory
        .add(&BeanMetadata {
            supplier: Some("Royal".to_string()),
            country: Some("Colombia".to_string()),
            process_method: Some("washed".to_string()),
            purchase_date: NaiveDate::from_ymd_opt(2025, 6, 1),
            ..Default::default()
        })
        .await
        .unwrap();

    let entry = inventory.get(id).await.unwrap();
    let mut session = ten_stage_session();
    session.bean.country = Some("Kenya".to_string());
    session.apply_bean_defaults(&entry.to_bean_metadata());

    assert_eq!(session.bean.supplier.as_deref(), Some("Royal"));
    assert_eq!(session.bean.country.as_deref(), Some("Kenya"));
    assert_eq!(session.bean.purchase_date, NaiveDate::from_ymd_opt(2025, 6, 1));
}
