//! Persisted migration position.
//!
//! The position is an append-only log: every applied step inserts one record,
//! and the current position is the `current_ix` of the newest record. The
//! [`PositionStore`] trait is the boundary to the database; [`PgStore`] is the
//! PostgreSQL implementation backed by sqlx.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Connection, Executor as _, PgConnection, Row};
use tracing::debug;

use crate::error::{MigrateError, MigrateResult};
use crate::migration::Direction;

/// Default name of the position log table.
pub const DEFAULT_TABLE: &str = "_meta_migrations";

/// The record written alongside a step's SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// Position after the step has been applied.
    pub position: usize,
    pub index: usize,
    pub direction: Direction,
    pub label: String,
}

/// A record read back from the position log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedStep {
    pub id: i64,
    pub applied_at: DateTime<Utc>,
    pub position: i64,
    pub index: i64,
    pub direction: Direction,
    pub label: Option<String>,
}

/// Durable storage for the migration position.
#[async_trait]
pub trait PositionStore: Send {
    /// Create the position log if it does not exist yet.
    async fn ensure_store(&mut self) -> MigrateResult<()>;

    /// Position recorded by the newest log entry, `None` when the log is empty.
    async fn latest_position(&mut self) -> MigrateResult<Option<i64>>;

    /// Run `sql` and append `record` in a single transaction.
    ///
    /// Either both take effect or neither does.
    async fn apply_step(&mut self, sql: &str, record: &StepRecord) -> MigrateResult<()>;

    /// Every log entry, oldest first.
    async fn history(&mut self) -> MigrateResult<Vec<AppliedStep>>;
}

/// Check that `table` can be spliced into SQL as a bare identifier.
pub fn validate_table_name(table: &str) -> MigrateResult<()> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid && table.len() <= 63 {
        Ok(())
    } else {
        Err(MigrateError::Config(format!(
            "Invalid migration table name '{}': use letters, digits and '_' only",
            table
        )))
    }
}

/// PostgreSQL position store over a single connection.
pub struct PgStore {
    conn: PgConnection,
    table: String,
}

impl PgStore {
    /// Connect to a database using a connection URL.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let store = PgStore::connect("postgres://localhost/mydb", DEFAULT_TABLE).await?;
    /// ```
    pub async fn connect(url: &str, table: &str) -> MigrateResult<Self> {
        let conn = PgConnection::connect(url)
            .await
            .map_err(|e| MigrateError::Connection(e.to_string()))?;
        Self::with_connection(conn, table)
    }

    /// Wrap an existing connection.
    pub fn with_connection(conn: PgConnection, table: &str) -> MigrateResult<Self> {
        validate_table_name(table)?;
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Close the underlying connection.
    pub async fn close(self) -> MigrateResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

#[async_trait]
impl PositionStore for PgStore {
    async fn ensure_store(&mut self) -> MigrateResult<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id          SERIAL       PRIMARY KEY,
                applied_at  TIMESTAMPTZ  NOT NULL DEFAULT NOW(),
                current_ix  INT          NOT NULL,
                ix          INT          NOT NULL,
                dir         INT          NOT NULL,
                label       VARCHAR(250)
            )",
            self.table
        );

        (&mut self.conn).execute(ddl.as_str()).await.map_err(|e| {
            MigrateError::Database(format!(
                "Could not check/create migrations table '{}': {}",
                self.table, e
            ))
        })?;
        Ok(())
    }

    async fn latest_position(&mut self) -> MigrateResult<Option<i64>> {
        let sql = format!(
            "SELECT current_ix FROM {} ORDER BY id DESC LIMIT 1",
            self.table
        );
        let row = sqlx::query(&sql).fetch_optional(&mut self.conn).await?;
        match row {
            Some(row) => {
                let ix: i32 = row.try_get("current_ix")?;
                Ok(Some(i64::from(ix)))
            }
            None => Ok(None),
        }
    }

    async fn apply_step(&mut self, sql: &str, record: &StepRecord) -> MigrateResult<()> {
        let insert = format!(
            "INSERT INTO {} (current_ix, ix, dir, label) VALUES ($1, $2, $3, $4)",
            self.table
        );
        let position = to_db_int(record.position)?;
        let index = to_db_int(record.index)?;

        let mut tx = self.conn.begin().await.map_err(|e| {
            MigrateError::Database(format!("Could not begin transaction: {}", e))
        })?;

        // Unprepared so a file may hold several statements.
        (&mut *tx).execute(sql).await?;
        debug!(index = record.index, "Executed {} bytes of SQL", sql.len());

        sqlx::query(&insert)
            .bind(position)
            .bind(index)
            .bind(record.direction.code())
            .bind(record.label.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await.map_err(|e| {
            MigrateError::Database(format!("Could not commit transaction: {}", e))
        })?;
        Ok(())
    }

    async fn history(&mut self) -> MigrateResult<Vec<AppliedStep>> {
        let sql = format!(
            "SELECT id, applied_at, current_ix, ix, dir, label FROM {} ORDER BY id ASC",
            self.table
        );
        let rows = sqlx::query(&sql).fetch_all(&mut self.conn).await?;

        rows.iter()
            .map(|row| -> MigrateResult<AppliedStep> {
                let code: i32 = row.try_get("dir")?;
                let direction = Direction::from_code(code).ok_or_else(|| {
                    MigrateError::Database(format!("Unknown direction code {} in log", code))
                })?;
                Ok(AppliedStep {
                    id: i64::from(row.try_get::<i32, _>("id")?),
                    applied_at: row.try_get("applied_at")?,
                    position: i64::from(row.try_get::<i32, _>("current_ix")?),
                    index: i64::from(row.try_get::<i32, _>("ix")?),
                    direction,
                    label: row.try_get("label")?,
                })
            })
            .collect()
    }
}

fn to_db_int(value: usize) -> MigrateResult<i32> {
    i32::try_from(value)
        .map_err(|_| MigrateError::Database(format!("Position {} does not fit in INT", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        assert!(validate_table_name(DEFAULT_TABLE).is_ok());
    }

    #[test]
    fn test_rejects_injection() {
        assert!(validate_table_name("migrations; DROP TABLE users").is_err());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("1table").is_err());
        assert!(validate_table_name("public.migrations").is_err());
    }

    #[test]
    fn test_rejects_overlong_name() {
        assert!(validate_table_name(&"a".repeat(64)).is_err());
        assert!(validate_table_name(&"a".repeat(63)).is_ok());
    }
}
