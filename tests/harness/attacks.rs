// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Abuse patterns against the registration endpoint.

use rng_alert_notifier::config::RateLimitConfig;
use std::time::Duration;

/// How the simulated clients are addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientSpread {
    /// Distinct IPv4 addresses
    Ipv4,
    /// Distinct IPv6 addresses inside one /64
    Ipv6SamePrefix,
}

/// Attack pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Total number of registration attempts
    pub total_requests: usize,
    /// Number of client addresses to rotate through
    pub unique_clients: usize,
    /// Number of destination addresses to rotate through
    pub unique_addresses: usize,
    /// Simulated time between attempts
    pub interval: Duration,
    /// User-Agent sent with every attempt
    pub user_agent: Option<&'static str>,
    /// Origin header sent with every attempt
    pub origin: Option<&'static str>,
    pub spread: ClientSpread,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            unique_clients: 1,
            unique_addresses: 1,
            interval: Duration::from_secs(1),
            user_agent: Some("curl/8.4.0"),
            origin: None,
            spread: ClientSpread::Ipv4,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// One client spraying many victims.
    pub fn single_client_spray() -> Self {
        Self {
            total_requests: 100,
            unique_clients: 1,
            unique_addresses: 100,
            ..Default::default()
        }
    }

    /// Many clients bombing one victim address.
    pub fn victim_bombing() -> Self {
        Self {
            total_requests: 50,
            unique_clients: 50,
            unique_addresses: 1,
            ..Default::default()
        }
    }

    /// Many clients, many victims, all within an hour.
    pub fn distributed_spray() -> Self {
        Self {
            total_requests: 200,
            unique_clients: 200,
            unique_addresses: 200,
            interval: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Distributed spray stretched over several days.
    pub fn slow_drip() -> Self {
        Self {
            total_requests: 120,
            unique_clients: 120,
            unique_addresses: 120,
            interval: Duration::from_secs(30 * 60),
            ..Default::default()
        }
    }

    /// Rotating through host addresses of a single IPv6 /64.
    pub fn ipv6_rotation() -> Self {
        Self {
            total_requests: 50,
            unique_clients: 50,
            unique_addresses: 50,
            spread: ClientSpread::Ipv6SamePrefix,
            ..Default::default()
        }
    }

    /// Registration attempts from a web page.
    pub fn browser_origin() -> Self {
        Self {
            total_requests: 30,
            unique_clients: 30,
            unique_addresses: 30,
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64)"),
            origin: Some("https://attacker.example"),
            ..Default::default()
        }
    }

    /// Scripted client that does not identify as curl or wget.
    pub fn scripted_client() -> Self {
        Self {
            total_requests: 30,
            unique_clients: 30,
            unique_addresses: 30,
            user_agent: Some("python-requests/2.31.0"),
            ..Default::default()
        }
    }

    /// Simulated time covered by the attack.
    pub fn span(&self) -> Duration {
        self.interval * self.total_requests.saturating_sub(1) as u32
    }

    /// Distinct client keys the quota store will see.
    pub fn effective_clients(&self) -> usize {
        match self.spread {
            ClientSpread::Ipv4 => self.unique_clients,
            ClientSpread::Ipv6SamePrefix => 1,
        }
    }
}

/// Expected outcomes for an attack pattern.
pub struct AttackExpectations {
    /// Upper bound on registrations that may succeed
    pub max_allowed: usize,
    /// Description of expected behavior
    pub description: &'static str,
}

/// Upper bound on the number of fixed windows of `window` length touched
/// by events spread over `span`.
fn windows_touched(span: Duration, window: Duration) -> usize {
    (span.as_secs() / window.as_secs().max(1)) as usize + 1
}

impl AttackConfig {
    /// Get expected outcomes for this attack pattern under `quotas`.
    pub fn expectations(&self, quotas: &RateLimitConfig) -> AttackExpectations {
        if self.origin.is_some() {
            return AttackExpectations {
                max_allowed: 0,
                description: "Browser requests must all be rejected",
            };
        }
        if !super::generators::is_cli_user_agent(self.user_agent) {
            return AttackExpectations {
                max_allowed: 0,
                description: "Non-CLI clients must all be rejected",
            };
        }

        let span = self.span();
        let bound = |rule: rng_alert_notifier::config::QuotaRule, keys: usize| {
            rule.max_events as usize * keys * windows_touched(span, rule.window())
        };

        let max_allowed = self
            .total_requests
            .min(bound(quotas.registrations_per_ip, self.effective_clients()))
            .min(bound(quotas.registrations_per_address, self.unique_addresses))
            .min(bound(quotas.registrations_global, 1));

        AttackExpectations {
            max_allowed,
            description: "Registrations bounded by every quota scope",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_client_bound() {
        let e = AttackConfig::single_client_spray().expectations(&RateLimitConfig::default());
        assert_eq!(e.max_allowed, 2);
    }

    #[test]
    fn test_global_bound_grows_with_span() {
        let quotas = RateLimitConfig::default();
        let burst = AttackConfig::distributed_spray().expectations(&quotas);
        let drip = AttackConfig::slow_drip().expectations(&quotas);
        assert_eq!(burst.max_allowed, 10);
        assert!(drip.max_allowed > burst.max_allowed);
    }
}
