// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the RNG alert notifier.
//!
//! Default quotas match the abuse policy for the public registration
//! endpoint: 2 registrations per client address per day, 1 per destination
//! address per week, 10 per hour globally, and 5 alerts per address per day.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the notifier service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// First path segment of the public routes (default: v1)
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Client policy for the registration endpoint
    #[serde(default)]
    pub client_policy: ClientPolicyConfig,

    /// Storage backend configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Outbound mail configuration
    #[serde(default)]
    pub mail: MailConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// A single quota: at most `max_events` accepted events per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRule {
    pub max_events: u32,
    pub window_secs: u64,
}

impl QuotaRule {
    pub const fn new(max_events: u32, window_secs: u64) -> Self {
        Self {
            max_events,
            window_secs,
        }
    }

    /// Get the counting window
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Quotas applied to registration and alerting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Registrations per client network address (default: 2 per 24h)
    #[serde(default = "default_registrations_per_ip")]
    pub registrations_per_ip: QuotaRule,

    /// Registrations per destination address (default: 1 per 7 days)
    #[serde(default = "default_registrations_per_address")]
    pub registrations_per_address: QuotaRule,

    /// Registrations across all clients (default: 10 per hour)
    #[serde(default = "default_registrations_global")]
    pub registrations_global: QuotaRule,

    /// Failure alerts per recipient address (default: 5 per 24h)
    #[serde(default = "default_alerts_per_address")]
    pub alerts_per_address: QuotaRule,

    /// Interval between purges of elapsed counters in seconds (default: 60)
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

/// Which clients may use the registration endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientPolicyConfig {
    /// Case-insensitive User-Agent prefixes of allowed command-line tools
    #[serde(default = "default_allowed_user_agents")]
    pub allowed_user_agents: Vec<String>,

    /// Reject requests carrying an Origin header (default: true)
    #[serde(default = "default_true")]
    pub reject_cross_origin: bool,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `memory` for the in-process store, or a `sqlite:` URL
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

/// Outbound mail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// From address for every message
    #[serde(default = "default_sender")]
    pub sender: String,

    /// Service name quoted in message bodies
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// SMTP relay host. When unset, messages are only logged.
    #[serde(default)]
    pub smtp_host: Option<String>,

    /// SMTP relay port (default: 587)
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_username: Option<String>,

    #[serde(default)]
    pub smtp_password: Option<String>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_route_prefix() -> String {
    "v1".to_string()
}

fn default_registrations_per_ip() -> QuotaRule {
    QuotaRule::new(2, 24 * 60 * 60)
}

fn default_registrations_per_address() -> QuotaRule {
    QuotaRule::new(1, 7 * 24 * 60 * 60)
}

fn default_registrations_global() -> QuotaRule {
    // Bounds a botnet with many addresses
    QuotaRule::new(10, 60 * 60)
}

fn default_alerts_per_address() -> QuotaRule {
    QuotaRule::new(5, 24 * 60 * 60)
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

fn default_allowed_user_agents() -> Vec<String> {
    vec!["curl".to_string(), "wget".to_string()]
}

fn default_database_url() -> String {
    "memory".to_string()
}

fn default_sender() -> String {
    "randomsanityalerts@gmail.com".to_string()
}

fn default_service_name() -> String {
    "randomsanity.org".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            route_prefix: default_route_prefix(),
            rate_limit: RateLimitConfig::default(),
            client_policy: ClientPolicyConfig::default(),
            storage: StorageConfig::default(),
            mail: MailConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            registrations_per_ip: default_registrations_per_ip(),
            registrations_per_address: default_registrations_per_address(),
            registrations_global: default_registrations_global(),
            alerts_per_address: default_alerts_per_address(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl Default for ClientPolicyConfig {
    fn default() -> Self {
        Self {
            allowed_user_agents: default_allowed_user_agents(),
            reject_cross_origin: default_true(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
            service_name: default_service_name(),
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RateLimitConfig {
    /// Get the counter purge interval
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}
