// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Storage collaborators for quota counters and registrations.
//!
//! Two backends implement both traits:
//! - [`MemoryStore`]: in-process, mutex-guarded maps (default, tests)
//! - [`SqliteStore`]: SQLite via `sqlx`, for state that survives restarts
//!
//! Counter updates are atomic per key inside the store. Request handlers
//! never hold quota state of their own.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::clock::Clock;
use crate::config::StorageConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Storage error types.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store busy: gave up on {key} after {attempts} attempts")]
    Contention { key: String, attempts: u32 },

    #[error("Registration not found: {0}")]
    MissingRecord(RegistrationRef),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage reference of a registration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RegistrationRef(pub i64);

impl std::fmt::Display for RegistrationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A persisted `(token, address)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub reference: RegistrationRef,
    pub token: String,
    pub address: String,
}

/// Counter state right after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaCount {
    /// Events recorded in the current window, including this one
    pub count: u64,
    /// Time until the current window ends
    pub resets_in: Duration,
}

/// Event counters keyed by abuse scope.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Record one event for `key` and return the post-increment count.
    ///
    /// The window is fixed and anchored at the first event; once `window`
    /// has elapsed since its start the count restarts from one. The
    /// read-modify-write is atomic with respect to concurrent callers.
    async fn increment(&self, key: &str, window: Duration, now: DateTime<Utc>) -> Result<QuotaCount>;

    /// Delete counters whose window ended before `now`. Returns how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Persistent `(token, address)` records.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn insert(&self, token: &str, address: &str) -> Result<RegistrationRef>;

    /// All registrations carrying `token`, oldest first.
    async fn find_by_token(&self, token: &str) -> Result<Vec<Registration>>;

    /// All registrations for `address`, oldest first.
    async fn find_by_address(&self, address: &str) -> Result<Vec<Registration>>;

    /// Fails with [`StoreError::MissingRecord`] if nothing was deleted.
    async fn delete(&self, reference: RegistrationRef) -> Result<()>;
}

/// The two storage handles the service runs on.
#[derive(Clone)]
pub struct Backends {
    pub quotas: Arc<dyn QuotaStore>,
    pub registrations: Arc<dyn RegistrationStore>,
}

impl Backends {
    /// Use one store for both concerns.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: QuotaStore + RegistrationStore + 'static,
    {
        Self {
            quotas: store.clone(),
            registrations: store,
        }
    }

    /// Open the backend named by `config.database_url`.
    pub async fn open(config: &StorageConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if config.database_url == "memory" {
            return Ok(Self::from_store(Arc::new(MemoryStore::new())));
        }
        let store = SqliteStore::connect_with_clock(&config.database_url, clock).await?;
        Ok(Self::from_store(Arc::new(store)))
    }
}

/// Window length in milliseconds, saturating.
pub(crate) fn window_millis(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}

/// Time left in a window that started at `start_ms`.
pub(crate) fn resets_in(start_ms: i64, window_ms: i64, now_ms: i64) -> Duration {
    let end = start_ms.saturating_add(window_ms);
    Duration::from_millis(end.saturating_sub(now_ms).max(0) as u64)
}
