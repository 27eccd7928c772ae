// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! SQLite store via `sqlx`.
//!
//! Each counter increment is one `INSERT ... ON CONFLICT DO UPDATE ...
//! RETURNING` statement, so the window check and the increment commit
//! together. Busy/locked errors are retried a bounded number of times.

use super::{
    resets_in, window_millis, QuotaCount, QuotaStore, Registration, RegistrationRef,
    RegistrationStore, Result, StoreError,
};
use crate::clock::{Clock, SystemClock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attempts before a busy database is reported as a store error.
const MAX_ATTEMPTS: u32 = 3;

const INCREMENT_SQL: &str = r#"
    INSERT INTO quota_counters (key, window_start_ms, window_ms, count)
    VALUES (?1, ?2, ?3, 1)
    ON CONFLICT(key) DO UPDATE SET
        count = CASE
            WHEN quota_counters.window_start_ms + quota_counters.window_ms <= excluded.window_start_ms
            THEN 1 ELSE quota_counters.count + 1 END,
        window_start_ms = CASE
            WHEN quota_counters.window_start_ms + quota_counters.window_ms <= excluded.window_start_ms
            THEN excluded.window_start_ms ELSE quota_counters.window_start_ms END,
        window_ms = excluded.window_ms
    RETURNING count, window_start_ms, window_ms
"#;

/// Store backed by a SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
    /// Stamps `created_at` on new registrations
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Connect to `url` (e.g. `sqlite://notifier.db` or `sqlite::memory:`)
    /// and create the tables.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_clock(url, Arc::new(SystemClock)).await
    }

    pub async fn connect_with_clock(url: &str, clock: Arc<dyn Clock>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = if url.contains(":memory:") {
            // Every connection to :memory: is a separate database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let store = Self { db: pool, clock };
        store.init_db().await?;
        info!(url, "SQLite store ready");
        Ok(store)
    }

    /// Initialize database tables
    async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quota_counters (
                key TEXT PRIMARY KEY,
                window_start_ms INTEGER NOT NULL,
                window_ms INTEGER NOT NULL,
                count INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS registrations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token TEXT NOT NULL,
                address TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS registrations_token_idx ON registrations (token)")
            .execute(&self.db)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS registrations_address_idx ON registrations (address)",
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn select_where(&self, column: &'static str, value: &str) -> Result<Vec<Registration>> {
        let sql = format!(
            "SELECT id, token, address FROM registrations WHERE {} = ?1 ORDER BY id",
            column
        );
        let rows = with_retry(value, || {
            sqlx::query_as::<_, (i64, String, String)>(&sql)
                .bind(value)
                .fetch_all(&self.db)
        })
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, token, address)| Registration {
                reference: RegistrationRef(id),
                token,
                address,
            })
            .collect())
    }
}

#[async_trait]
impl QuotaStore for SqliteStore {
    async fn increment(&self, key: &str, window: Duration, now: DateTime<Utc>) -> Result<QuotaCount> {
        let now_ms = now.timestamp_millis();
        let window_ms = window_millis(window);

        let (count, window_start_ms, window_ms) = with_retry(key, || {
            sqlx::query_as::<_, (i64, i64, i64)>(INCREMENT_SQL)
                .bind(key)
                .bind(now_ms)
                .bind(window_ms)
                .fetch_one(&self.db)
        })
        .await?;

        Ok(QuotaCount {
            count: count.max(0) as u64,
            resets_in: resets_in(window_start_ms, window_ms, now_ms),
        })
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let now_ms = now.timestamp_millis();
        let result = with_retry("quota_counters", || {
            sqlx::query("DELETE FROM quota_counters WHERE window_start_ms + window_ms <= ?1")
                .bind(now_ms)
                .execute(&self.db)
        })
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RegistrationStore for SqliteStore {
    async fn insert(&self, token: &str, address: &str) -> Result<RegistrationRef> {
        let created_at = self.clock.now().to_rfc3339();
        let result = with_retry(address, || {
            sqlx::query("INSERT INTO registrations (token, address, created_at) VALUES (?1, ?2, ?3)")
                .bind(token)
                .bind(address)
                .bind(created_at.as_str())
                .execute(&self.db)
        })
        .await?;
        Ok(RegistrationRef(result.last_insert_rowid()))
    }

    async fn find_by_token(&self, token: &str) -> Result<Vec<Registration>> {
        self.select_where("token", token).await
    }

    async fn find_by_address(&self, address: &str) -> Result<Vec<Registration>> {
        self.select_where("address", address).await
    }

    async fn delete(&self, reference: RegistrationRef) -> Result<()> {
        let result = with_retry("registrations", || {
            sqlx::query("DELETE FROM registrations WHERE id = ?1")
                .bind(reference.0)
                .execute(&self.db)
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRecord(reference));
        }
        Ok(())
    }
}

/// Run `op`, retrying while SQLite reports the database busy or locked.
async fn with_retry<T, F, Fut>(key: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_contention(&err) => {
                if attempt >= MAX_ATTEMPTS {
                    warn!(key, attempts = attempt, "Giving up on busy database");
                    return Err(StoreError::Contention {
                        key: key.to_string(),
                        attempts: attempt,
                    });
                }
                debug!(key, attempt, error = %err, "Database busy, retrying");
                tokio::time::sleep(Duration::from_millis(20 * u64::from(attempt))).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// SQLITE_BUSY, SQLITE_LOCKED and their extended codes.
fn is_contention(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            Some("5") | Some("6") | Some("261") | Some("262") | Some("517")
        ),
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}
