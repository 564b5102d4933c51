//! Table Schema Definitions
//!
//! Single source of truth for the database table layouts.

use crate::db::schema_sync::{ColumnDefinition, SchemaDrift, SchemaSync, TableSchema};
use crate::schema::MASTER_ORDER;
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Persisted roast sessions: one TEXT column per MASTER_ORDER field
///
/// `line_number` is the integer row key; every other cell holds a value or `'NaN'`.
pub struct RoastSessionsTableSchema;

impl TableSchema for RoastSessionsTableSchema {
    fn table_name() -> &'static str {
        "roast_sessions"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        MASTER_ORDER
            .iter()
            .map(|&name| {
                if name == "line_number" {
                    ColumnDefinition::new(name, "INTEGER").primary_key()
                } else {
                    ColumnDefinition::new(name, "TEXT").not_null().default("'NaN'")
                }
            })
            .collect()
    }
}

/// Green coffee inventory
pub struct CoffeeInventoryTableSchema;

impl TableSchema for CoffeeInventoryTableSchema {
    fn table_name() -> &'static str {
        "coffee_inventory"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id", "INTEGER").primary_key(),
            ColumnDefinition::new("supplier", "TEXT"),
            ColumnDefinition::new("country", "TEXT"),
            ColumnDefinition::new("region", "TEXT"),
            ColumnDefinition::new("altitude_meters", "REAL"),
            ColumnDefinition::new("variety", "TEXT"),
            ColumnDefinition::new("process_method", "TEXT"),
            // YYYY-MM-DD
            ColumnDefinition::new("purchase_date", "TEXT"),
            ColumnDefinition::new("created_at", "TIMESTAMP")
                .not_null()
                .default("CURRENT_TIMESTAMP"),
        ]
    }
}

/// Create missing tables and add missing columns
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<Vec<SchemaDrift>> {
    SchemaSync::create_table::<RoastSessionsTableSchema>(pool).await?;
    SchemaSync::create_table::<CoffeeInventoryTableSchema>(pool).await?;

    let mut drift = SchemaSync::sync_table::<RoastSessionsTableSchema>(pool).await?;
    drift.extend(SchemaSync::sync_table::<CoffeeInventoryTableSchema>(pool).await?);

    info!(changes = drift.len(), "Schema synchronization complete");
    Ok(drift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema_sync::SchemaIntrospector;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[test]
    fn test_roast_sessions_columns_follow_master_order() {
        let columns = RoastSessionsTableSchema::expected_columns();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, MASTER_ORDER.to_vec());
        assert!(columns[0].primary_key);
        assert!(columns[1..].iter().all(|c| c.default_value.as_deref() == Some("'NaN'")));
    }

    #[tokio::test]
    async fn test_fresh_database_gets_full_schema() {
        let pool = setup_test_db().await;
        sync_all_table_schemas(&pool).await.unwrap();

        let live = SchemaIntrospector::introspect_table(&pool, "roast_sessions").await.unwrap();
        assert_eq!(live.len(), MASTER_ORDER.len());
        assert!(SchemaIntrospector::table_exists(&pool, "coffee_inventory").await.unwrap());
    }

    #[tokio::test]
    async fn test_old_table_gains_new_columns_with_nan_default() {
        let pool = setup_test_db().await;
        sqlx::query("CREATE TABLE roast_sessions (line_number INTEGER PRIMARY KEY, id TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO roast_sessions (line_number, id) VALUES (1, 'old')")
            .execute(&pool)
            .await
            .unwrap();

        let drift = sync_all_table_schemas(&pool).await.unwrap();
        assert_eq!(drift.len(), MASTER_ORDER.len() - 2);

        let agtron: String = sqlx::query_scalar("SELECT agtron FROM roast_sessions WHERE line_number = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(agtron, "NaN");
    }
}
