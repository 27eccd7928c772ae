// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! In-process store.

use super::{
    resets_in, window_millis, QuotaCount, QuotaStore, Registration, RegistrationRef,
    RegistrationStore, Result, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Fixed-window counter.
#[derive(Debug)]
struct Counter {
    window_start_ms: i64,
    window_ms: i64,
    count: u64,
}

impl Counter {
    fn expired(&self, now_ms: i64) -> bool {
        self.window_start_ms.saturating_add(self.window_ms) <= now_ms
    }
}

#[derive(Debug, Clone)]
struct Record {
    token: String,
    address: String,
}

/// Store backed by process memory. State is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    counters: Mutex<HashMap<String, Counter>>,
    /// Keyed by reference so iteration order is insertion order
    registrations: RwLock<BTreeMap<RegistrationRef, Record>>,
    next_ref: Mutex<i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live counters.
    pub async fn counter_count(&self) -> usize {
        self.counters.lock().await.len()
    }

    /// Number of stored registrations.
    pub async fn registration_count(&self) -> usize {
        self.registrations.read().await.len()
    }

    async fn matching<F>(&self, pred: F) -> Vec<Registration>
    where
        F: Fn(&Record) -> bool,
    {
        let registrations = self.registrations.read().await;
        registrations
            .iter()
            .filter(|(_, record)| pred(record))
            .map(|(reference, record)| Registration {
                reference: *reference,
                token: record.token.clone(),
                address: record.address.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl QuotaStore for MemoryStore {
    async fn increment(&self, key: &str, window: Duration, now: DateTime<Utc>) -> Result<QuotaCount> {
        let now_ms = now.timestamp_millis();
        let window_ms = window_millis(window);

        // The lock is held across read-modify-write
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(key.to_string()).or_insert(Counter {
            window_start_ms: now_ms,
            window_ms,
            count: 0,
        });

        if counter.expired(now_ms) {
            debug!(key, "Quota window elapsed, starting new window");
            counter.window_start_ms = now_ms;
            counter.count = 0;
        }
        counter.window_ms = window_ms;
        counter.count += 1;

        Ok(QuotaCount {
            count: counter.count,
            resets_in: resets_in(counter.window_start_ms, counter.window_ms, now_ms),
        })
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let now_ms = now.timestamp_millis();
        let mut counters = self.counters.lock().await;
        let before = counters.len();
        counters.retain(|_, counter| !counter.expired(now_ms));
        Ok((before - counters.len()) as u64)
    }
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn insert(&self, token: &str, address: &str) -> Result<RegistrationRef> {
        let reference = {
            let mut next = self.next_ref.lock().await;
            *next += 1;
            RegistrationRef(*next)
        };
        self.registrations.write().await.insert(
            reference,
            Record {
                token: token.to_string(),
                address: address.to_string(),
            },
        );
        Ok(reference)
    }

    async fn find_by_token(&self, token: &str) -> Result<Vec<Registration>> {
        Ok(self.matching(|record| record.token == token).await)
    }

    async fn find_by_address(&self, address: &str) -> Result<Vec<Registration>> {
        Ok(self.matching(|record| record.address == address).await)
    }

    async fn delete(&self, reference: RegistrationRef) -> Result<()> {
        self.registrations
            .write()
            .await
            .remove(&reference)
            .map(|_| ())
            .ok_or(StoreError::MissingRecord(reference))
    }
}
