//! Green coffee inventory
//!
//! Lots on hand, so a roast can pull its bean metadata from a chosen lot instead of
//! re-entering it.

use crate::session::BeanMetadata;
use crate::time::parse_date_flexible;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::info;

/// One inventory lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct InventoryEntry {
    pub id: i64,
    pub supplier: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub altitude_meters: Option<f64>,
    pub variety: Option<String>,
    pub process_method: Option<String>,
    /// YYYY-MM-DD
    pub purchase_date: Option<String>,
}

impl InventoryEntry {
    /// Bean metadata for pre-filling a session; an unparseable date is dropped
    pub fn to_bean_metadata(&self) -> BeanMetadata {
        BeanMetadata {
            supplier: self.supplier.clone(),
            country: self.country.clone(),
            region: self.region.clone(),
            altitude_meters: self.altitude_meters,
            variety: self.variety.clone(),
            process_method: self.process_method.clone(),
            purchase_date: self
                .purchase_date
                .as_deref()
                .and_then(|d| parse_date_flexible(d).ok()),
        }
    }

    /// One-line listing: `3: Royal - Ethiopia Guji (heirloom, natural) | Purchased: 2025-02-01`
    pub fn summary(&self) -> String {
        let or_blank = |v: &Option<String>| v.clone().unwrap_or_default();
        format!(
            "{}: {} - {} {} ({}, {}) | Purchased: {}",
            self.id,
            or_blank(&self.supplier),
            or_blank(&self.country),
            or_blank(&self.region),
            or_blank(&self.variety),
            or_blank(&self.process_method),
            or_blank(&self.purchase_date),
        )
    }
}

/// Inventory rows in `coffee_inventory`
#[derive(Clone)]
pub struct InventoryStore {
    pool: SqlitePool,
}

impl InventoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Add a lot; returns its id
    pub async fn add(&self, bean: &BeanMetadata) -> Result<i64> {
        if let Some(altitude) = bean.altitude_meters {
            if !(0.0..=4000.0).contains(&altitude) {
                return Err(Error::InvalidInput(format!(
                    "Altitude must be between 0 and 4000 m, got {}",
                    altitude
                )));
            }
        }

        let result = sqlx::query(
            r#"
            INSERT INTO coffee_inventory
                (supplier, country, region, altitude_meters, variety, process_method, purchase_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&bean.supplier)
        .bind(&bean.country)
        .bind(&bean.region)
        .bind(bean.altitude_meters)
        .bind(&bean.variety)
        .bind(&bean.process_method)
        .bind(bean.purchase_date.map(|d| d.format("%Y-%m-%d").to_string()))
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(id, "Inventory entry added");
        Ok(id)
    }

    pub async fn list(&self) -> Result<Vec<InventoryEntry>> {
        let entries = sqlx::query_as::<_, InventoryEntry>(
            r#"
            SELECT id, supplier, country, region, altitude_meters, variety, process_method, purchase_date
            FROM coffee_inventory
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    pub async fn get(&self, id: i64) -> Result<InventoryEntry> {
        sqlx::query_as::<_, InventoryEntry>(
            r#"
            SELECT id, supplier, country, region, altitude_meters, variety, process_method, purchase_date
            FROM coffee_inventory
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("inventory entry {}", id)))
    }

    /// Remove a lot; sessions already logged keep their copied bean metadata
    pub async fn remove(&self, id: i64) -> Result<InventoryEntry> {
        let entry = self.get(id).await?;
        sqlx::query("DELETE FROM coffee_inventory WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        info!(id, "Inventory entry removed");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::prepare_schema;
    use chrono::NaiveDate;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_store() -> InventoryStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        prepare_schema(&pool).await.unwrap();
        InventoryStore::new(pool)
    }

    fn guji() -> BeanMetadata {
        BeanMetadata {
            supplier: Some("Royal".to_string()),
            country: Some("Ethiopia".to_string()),
            region: Some("Guji".to_string()),
            altitude_meters: Some(2100.0),
            variety: Some("heirloom".to_string()),
            process_method: Some("natural".to_string()),
            purchase_date: NaiveDate::from_ymd_opt(2025, 2, 1),
        }
    }

    #[tokio::test]
    async fn test_add_then_get_round_trips_bean_metadata() {
        let store = setup_store().await;
        let id = store.add(&guji()).await.unwrap();

        let entry = store.get(id).await.unwrap();
        assert_eq!(entry.purchase_date.as_deref(), Some("2025-02-01"));
        assert_eq!(entry.to_bean_metadata(), guji());
        assert_eq!(
            entry.summary(),
            format!("{}: Royal - Ethiopia Guji (heirloom, natural) | Purchased: 2025-02-01", id)
        );
    }

    #[tokio::test]
    async fn test_list_is_ordered_and_get_missing_fails() {
        let store = setup_store().await;
        store.add(&guji()).await.unwrap();
        store.add(&BeanMetadata::default()).await.unwrap();

        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].id < entries[1].id);
        assert!(matches!(store.get(99).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_deletes_only_that_lot() {
        let store = setup_store().await;
        let first = store.add(&guji()).await.unwrap();
        let second = store.add(&BeanMetadata::default()).await.unwrap();

        let removed = store.remove(first).await.unwrap();
        assert_eq!(removed.id, first);
        assert_eq!(removed.to_bean_metadata(), guji());

        let remaining: Vec<i64> = store.list().await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(remaining, vec![second]);
        assert!(matches!(store.get(first).await, Err(Error::NotFound(_))));
        assert!(matches!(store.remove(first).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_out_of_range_altitude_rejected() {
        let store = setup_store().await;
        let bean = BeanMetadata {
            altitude_meters: Some(9000.0),
            ..guji()
        };
        assert!(matches!(store.add(&bean).await, Err(Error::InvalidInput(_))));
    }
}
