//! SQLite-backed activity log.
//!
//! Every inbound and outbound turn is appended here; the distinct set of
//! conversation ids across all entries is the broadcast audience. The pool
//! makes concurrent appends from the router and bulk reads from the control
//! API safe.

use relay_core::{config::MemoryConfig, error::RelayError, shellexpand};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Direction of a logged turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// An entry to append.
pub struct LogEntry {
    pub conversation_id: String,
    pub direction: Direction,
    pub text: String,
}

impl LogEntry {
    pub fn inbound(conversation_id: &str, text: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            direction: Direction::In,
            text: text.to_string(),
        }
    }

    pub fn outbound(conversation_id: &str, text: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            direction: Direction::Out,
            text: text.to_string(),
        }
    }
}

/// A stored entry, as returned to the control API.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub id: String,
    pub time: String,
    pub conversation_id: String,
    pub direction: String,
    pub text: String,
}

/// Activity log backed by SQLite. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct ActivityLog {
    pool: SqlitePool,
}

impl ActivityLog {
    /// Open (or create) the log database and run migrations.
    pub async fn new(config: &MemoryConfig) -> Result<Self, RelayError> {
        let db_path = shellexpand(&config.db_path);

        // Ensure parent directory exists (skip for in-memory databases).
        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| RelayError::Memory(format!("failed to create data dir: {e}")))?;
            }
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| RelayError::Memory(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| RelayError::Memory(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("Activity log initialized at {db_path}");

        Ok(Self { pool })
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), RelayError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| RelayError::Memory(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] = &[(
            "001_activity_log",
            include_str!("../migrations/001_activity_log.sql"),
        )];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        RelayError::Memory(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| RelayError::Memory(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    RelayError::Memory(format!("failed to record migration {name}: {e}"))
                })?;
        }
        Ok(())
    }

    /// Append one entry.
    pub async fn append(&self, entry: &LogEntry) -> Result<(), RelayError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO activity_log (id, conversation_id, direction, text) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&entry.conversation_id)
        .bind(entry.direction.as_str())
        .bind(&entry.text)
        .execute(&self.pool)
        .await
        .map_err(|e| RelayError::Memory(format!("activity log write failed: {e}")))?;

        debug!(
            "activity: {} [{}] {}",
            entry.conversation_id,
            entry.direction.as_str(),
            truncate(&entry.text, 80)
        );

        Ok(())
    }

    /// The most recent `limit` entries, in chronological order.
    pub async fn tail(&self, limit: i64) -> Result<Vec<LogRecord>, RelayError> {
        let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, time, conversation_id, direction, text FROM activity_log \
             ORDER BY rowid DESC LIMIT ?",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelayError::Memory(format!("activity log read failed: {e}")))?;

        Ok(rows
            .into_iter()
            .rev()
            .map(|(id, time, conversation_id, direction, text)| LogRecord {
                id,
                time,
                conversation_id,
                direction,
                text,
            })
            .collect())
    }

    /// Distinct conversation ids across all entries, i.e. the broadcast
    /// audience.
    pub async fn audience(&self) -> Result<Vec<String>, RelayError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT conversation_id FROM activity_log ORDER BY conversation_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelayError::Memory(format!("audience query failed: {e}")))?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Delete all entries, resetting the broadcast audience.
    pub async fn clear(&self) -> Result<u64, RelayError> {
        let result = sqlx::query("DELETE FROM activity_log")
            .execute(&self.pool)
            .await
            .map_err(|e| RelayError::Memory(format!("activity log clear failed: {e}")))?;
        info!("Activity log cleared ({} entries)", result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Close the underlying pool. Any append after this fails.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Total number of entries.
    pub async fn count(&self) -> Result<i64, RelayError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM activity_log")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RelayError::Memory(format!("count query failed: {e}")))?;
        Ok(count)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    // Back off to a char boundary so multibyte text never splits.
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
