// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Failure alert fan-out.
//!
//! A failure report carries a token. Every address registered under it
//! gets an alert, subject to a per-address daily quota. Alerts over quota
//! are dropped without telling the reporter; the report itself succeeds.

use crate::config::QuotaRule;
use crate::limiter::{Quota, RateLimitResult, RateLimiter};
use crate::mailer::{deliver, Mailer};
use crate::messages::alert_email;
use crate::metrics::Metrics;
use crate::registry::IdentityRegistry;
use std::sync::Arc;
use tracing::{debug, error, info};

/// What happened to the alerts of one report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifySummary {
    pub sent: usize,
    pub throttled: usize,
    pub failed: usize,
}

/// Sends failure alerts to registered addresses.
pub struct Notifier {
    registry: IdentityRegistry,
    limiter: Arc<RateLimiter>,
    mailer: Arc<dyn Mailer>,
    alert_quota: QuotaRule,
    service_name: String,
    metrics: Metrics,
}

impl Notifier {
    pub fn new(
        registry: IdentityRegistry,
        limiter: Arc<RateLimiter>,
        mailer: Arc<dyn Mailer>,
        alert_quota: QuotaRule,
        service_name: String,
        metrics: Metrics,
    ) -> Self {
        Self {
            registry,
            limiter,
            mailer,
            alert_quota,
            service_name,
            metrics,
        }
    }

    /// Alert everyone registered under `token` about a failure.
    ///
    /// Never fails: lookup errors, exhausted quotas and delivery errors
    /// are logged and reflected only in the returned summary.
    pub async fn notify(&self, token: &str, tag: &str, payload: &[u8], reason: &str) -> NotifySummary {
        let mut summary = NotifySummary::default();
        if token.is_empty() {
            return summary;
        }

        let registrations = match self.registry.resolve_all(token).await {
            Ok(registrations) => registrations,
            Err(err) => {
                error!(error = %err, "Datastore error resolving alert recipients");
                return summary;
            }
        };
        if registrations.is_empty() {
            debug!("No registration for reported id");
            return summary;
        }

        let email = alert_email(&self.service_name, tag, payload, reason);
        for registration in registrations {
            let address = registration.address.as_str();
            let quota = Quota::alerts_per_address(address, self.alert_quota);

            match self.limiter.check_and_consume(&quota).await {
                Ok(RateLimitResult::Allowed { .. }) => {}
                Ok(RateLimitResult::Limited { .. }) => {
                    debug!(to = address, "Alert quota exhausted, dropping alert");
                    self.metrics.alert("throttled");
                    summary.throttled += 1;
                    continue;
                }
                Err(err) => {
                    // Fail closed: no quota decision, no mail
                    error!(to = address, error = %err, "Quota store failure, dropping alert");
                    self.metrics.alert("throttled");
                    summary.throttled += 1;
                    continue;
                }
            }

            if deliver(self.mailer.as_ref(), address, &email.subject, &email.body).await {
                self.metrics.alert("sent");
                summary.sent += 1;
            } else {
                self.metrics.alert("failed");
                summary.failed += 1;
            }
        }

        info!(
            tag,
            sent = summary.sent,
            throttled = summary.throttled,
            failed = summary.failed,
            "Failure alerts processed"
        );
        summary
    }
}
