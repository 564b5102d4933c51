//! Append-only roast session store
//!
//! Each save is a single row insert in MASTER_ORDER. Rows are never updated; a
//! correction is saved as a new row.

use crate::schema::{MASTER_ORDER, NAN_TOKEN};
use crate::session::{CanonicalRow, RoastSession};
use crate::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

/// Identity assigned to a newly written row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendedRow {
    pub line_number: i64,
    pub id: String,
}

/// Roast session rows in the `roast_sessions` table
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Validate and append one session
    ///
    /// Fails with [`Error::Session`] when the session breaks the stage invariant; nothing
    /// is written in that case and the caller still owns the session.
    pub async fn append(&self, session: &RoastSession) -> Result<AppendedRow> {
        let row = session.to_canonical_row()?;
        self.append_row(row).await
    }

    /// Append an already-rendered row, assigning `id` (if unset) and `line_number`
    pub async fn append_row(&self, mut row: CanonicalRow) -> Result<AppendedRow> {
        let id = match row.get("id") {
            Some(id) if id != NAN_TOKEN && !id.trim().is_empty() => id.to_string(),
            _ => {
                let id = Uuid::new_v4().to_string();
                row.set("id", id.clone());
                id
            }
        };

        let mut tx = self.pool.begin().await?;

        let line_number: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(line_number), 0) + 1 FROM roast_sessions")
                .fetch_one(&mut *tx)
                .await?;

        let placeholders = vec!["?"; MASTER_ORDER.len()].join(", ");
        let sql = format!(
            "INSERT INTO roast_sessions ({}) VALUES ({})",
            MASTER_ORDER.join(", "),
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for (column, value) in row.columns() {
            query = if column == "line_number" {
                query.bind(line_number)
            } else {
                query.bind(value.to_string())
            };
        }
        query.execute(&mut *tx).await?;
        tx.commit().await?;

        info!(line_number, id = %id, "Session appended to store");
        Ok(AppendedRow { line_number, id })
    }

    /// All rows in insertion order
    pub async fn rows(&self) -> Result<Vec<CanonicalRow>> {
        let sql = format!(
            "SELECT {} FROM roast_sessions ORDER BY line_number",
            MASTER_ORDER.join(", ")
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        debug!(count = rows.len(), "Loaded session rows");

        rows.iter().map(decode_row).collect()
    }

    /// One row by line number
    pub async fn get(&self, line_number: i64) -> Result<CanonicalRow> {
        let sql = format!(
            "SELECT {} FROM roast_sessions WHERE line_number = ?",
            MASTER_ORDER.join(", ")
        );
        let row = sqlx::query(&sql)
            .bind(line_number)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("roast session line {}", line_number)))?;

        decode_row(&row)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roast_sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn decode_row(row: &SqliteRow) -> Result<CanonicalRow> {
    let mut values = Vec::with_capacity(MASTER_ORDER.len());
    for column in MASTER_ORDER {
        let value = if column == "line_number" {
            row.try_get::<i64, _>(column)?.to_string()
        } else {
            row.try_get::<Option<String>, _>(column)?
                .unwrap_or_else(|| NAN_TOKEN.to_string())
        };
        values.push(value);
    }
    Ok(CanonicalRow::new(values)?)
}
