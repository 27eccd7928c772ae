// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window quota enforcement.
//!
//! Every mutating or notifying operation is gated by one or more quotas:
//! 1. Registrations per client network address
//! 2. Registrations per destination address
//! 3. Registrations globally
//! 4. Failure alerts per recipient address
//!
//! Counting lives in a [`QuotaStore`]. An event counts toward its quota
//! even when it is rejected, so retrying at the boundary keeps consuming
//! quota. Store failures are reported as errors and callers must not proceed.

use crate::clock::{Clock, SystemClock};
use crate::config::QuotaRule;
use crate::error::AppError;
use crate::store::{QuotaStore, StoreError};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Remaining events in current window
        remaining: u32,
        /// Time until window resets
        reset_in: Duration,
    },
    /// Request is rate limited
    Limited {
        /// Quota that denied the request
        reason: QuotaScope,
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_limited(&self) -> bool {
        matches!(self, RateLimitResult::Limited { .. })
    }
}

/// What a quota protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaScope {
    /// Registrations from one client network address
    ClientAddress,
    /// Registrations for one destination address
    DestinationAddress,
    /// Registrations across all clients
    GlobalRegistration,
    /// Failure alerts to one recipient
    AlertRecipient,
}

impl QuotaScope {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ClientAddress => "client_address",
            Self::DestinationAddress => "destination_address",
            Self::GlobalRegistration => "global",
            Self::AlertRecipient => "alert_recipient",
        }
    }
}

impl std::fmt::Display for QuotaScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientAddress => write!(f, "Too many registrations from your network address"),
            Self::DestinationAddress => write!(f, "Too many registrations for this email address"),
            Self::GlobalRegistration => write!(f, "Too many registrations, try again later"),
            Self::AlertRecipient => write!(f, "Too many alerts for this email address"),
        }
    }
}

/// A counting key together with its limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quota {
    pub scope: QuotaScope,
    pub key: String,
    pub rule: QuotaRule,
}

impl Quota {
    pub fn registrations_per_ip(ip: IpAddr, rule: QuotaRule) -> Self {
        Self {
            scope: QuotaScope::ClientAddress,
            key: ip_key("emailreg", ip),
            rule,
        }
    }

    pub fn registrations_per_address(address: &str, rule: QuotaRule) -> Self {
        Self {
            scope: QuotaScope::DestinationAddress,
            key: format!("emailreg:{}", address),
            rule,
        }
    }

    pub fn registrations_global(rule: QuotaRule) -> Self {
        Self {
            scope: QuotaScope::GlobalRegistration,
            key: "emailreg".to_string(),
            rule,
        }
    }

    pub fn alerts_per_address(address: &str, rule: QuotaRule) -> Self {
        Self {
            scope: QuotaScope::AlertRecipient,
            key: format!("alert:{}", address),
            rule,
        }
    }
}

/// Key a client network address under `purpose`.
///
/// IPv6 clients usually control a whole /64, so only that prefix counts.
pub fn ip_key(purpose: &str, ip: IpAddr) -> String {
    let ip = match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    };

    match ip {
        IpAddr::V4(v4) => format!("{}:{}", purpose, v4),
        IpAddr::V6(v6) => {
            let s = v6.segments();
            format!("{}:{:x}:{:x}:{:x}:{:x}::/64", purpose, s[0], s[1], s[2], s[3])
        }
    }
}

/// Quota checker over a shared store.
pub struct RateLimiter {
    store: Arc<dyn QuotaStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a new rate limiter on the system clock.
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn QuotaStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record one event against `quota` and decide whether it is over the limit.
    pub async fn check_and_consume(&self, quota: &Quota) -> Result<RateLimitResult, StoreError> {
        let counted = self
            .store
            .increment(&quota.key, quota.rule.window(), self.clock.now())
            .await?;

        let max = u64::from(quota.rule.max_events);
        if counted.count > max {
            debug!(
                key = %quota.key,
                count = counted.count,
                max,
                retry_after_secs = counted.resets_in.as_secs(),
                "Quota exceeded"
            );
            return Ok(RateLimitResult::Limited {
                reason: quota.scope,
                retry_after: counted.resets_in,
            });
        }

        Ok(RateLimitResult::Allowed {
            remaining: u32::try_from(max - counted.count).unwrap_or(u32::MAX),
            reset_in: counted.resets_in,
        })
    }

    /// Check quotas in order, stopping at the first that denies.
    ///
    /// Quotas after a denying one are not consumed.
    pub async fn check(&self, quotas: &[Quota]) -> Result<RateLimitResult, StoreError> {
        let mut last = RateLimitResult::Allowed {
            remaining: u32::MAX,
            reset_in: Duration::ZERO,
        };
        for quota in quotas {
            let result = self.check_and_consume(quota).await?;
            if result.is_limited() {
                return Ok(result);
            }
            last = result;
        }
        Ok(last)
    }

    /// Like [`check`](Self::check), but maps denial to a response.
    ///
    /// `Err` means stop processing: it renders as 429 when a quota is
    /// exhausted and as 500 when the store failed.
    pub async fn enforce(&self, quotas: &[Quota]) -> Result<(), AppError> {
        match self.check(quotas).await {
            Ok(RateLimitResult::Allowed { .. }) => Ok(()),
            Ok(RateLimitResult::Limited {
                reason,
                retry_after,
            }) => {
                info!(
                    scope = reason.label(),
                    retry_after_secs = retry_after.as_secs(),
                    "Request rate limited"
                );
                Err(AppError::RateLimited {
                    scope: reason,
                    retry_after,
                })
            }
            Err(err) => {
                error!(error = %err, "Quota store failure, refusing request");
                Err(AppError::Store(err))
            }
        }
    }

    /// Clean up elapsed counters (should be called periodically).
    pub async fn cleanup(&self) {
        match self.store.purge_expired(self.clock.now()).await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "Purged elapsed quota counters"),
            Err(err) => error!(error = %err, "Failed to purge quota counters"),
        }
    }
}
