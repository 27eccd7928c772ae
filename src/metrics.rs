// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters.

use crate::limiter::QuotaScope;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Service counters, cheap to clone.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    registrations: IntCounterVec,
    unregistrations: IntCounter,
    rate_limited: IntCounterVec,
    alerts: IntCounterVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let registrations = IntCounterVec::new(
            Opts::new("rng_alert_registrations_total", "Successful registrations"),
            &["outcome"],
        )?;
        let unregistrations = IntCounter::new(
            "rng_alert_unregistrations_total",
            "Registrations deleted by their owner",
        )?;
        let rate_limited = IntCounterVec::new(
            Opts::new("rng_alert_rate_limited_total", "Requests denied by a quota"),
            &["scope"],
        )?;
        let alerts = IntCounterVec::new(
            Opts::new("rng_alert_alerts_total", "Failure alerts by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(registrations.clone()))?;
        registry.register(Box::new(unregistrations.clone()))?;
        registry.register(Box::new(rate_limited.clone()))?;
        registry.register(Box::new(alerts.clone()))?;

        Ok(Self {
            registry,
            registrations,
            unregistrations,
            rate_limited,
            alerts,
        })
    }

    /// `outcome` is `created` or `reissued`.
    pub fn registration(&self, outcome: &str) {
        self.registrations.with_label_values(&[outcome]).inc();
    }

    pub fn unregistration(&self) {
        self.unregistrations.inc();
    }

    pub fn rate_limited(&self, scope: QuotaScope) {
        self.rate_limited.with_label_values(&[scope.label()]).inc();
    }

    /// `outcome` is `sent`, `throttled` or `failed`.
    pub fn alert(&self, outcome: &str) {
        self.alerts.with_label_values(&[outcome]).inc();
    }

    /// Render all counters in the Prometheus text format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let metrics = Metrics::new().unwrap();
        metrics.registration("created");
        metrics.rate_limited(QuotaScope::ClientAddress);
        metrics.alert("throttled");

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"rng_alert_registrations_total{outcome="created"} 1"#));
        assert!(text.contains(r#"rng_alert_rate_limited_total{scope="client_address"} 1"#));
        assert!(text.contains(r#"rng_alert_alerts_total{outcome="throttled"} 1"#));
    }
}
