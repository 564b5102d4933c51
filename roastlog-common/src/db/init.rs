//! Database initialization
//!
//! Opens (or creates) the roastlog SQLite database and brings the declared tables up to
//! date. Safe to call on every startup.

use crate::db::table_schemas::sync_all_table_schemas;
use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Writes are one row per save; a small pool is plenty
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Create and sync all tables on an already-open pool
pub async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    sync_all_table_schemas(pool).await?;
    Ok(())
}
