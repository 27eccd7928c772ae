// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! RNG Alert Notifier Service
//!
//! Registers email addresses for random number generator failure alerts.
//!
//! ## Routes
//!
//! - `POST /<prefix>/register/<email>`: mail an id to `<email>` (curl/wget only)
//! - `DELETE /<prefix>/unregister/<id>`: forget a registration
//! - `GET /health`, `GET /metrics`
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `ROUTE_PREFIX`: First path segment of the routes (default: v1)
//! - `DATABASE_URL`: `memory` or a `sqlite:` URL (default: memory)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`: SMTP relay;
//!   mail is only logged when `SMTP_HOST` is unset
//! - `MAIL_SENDER`: From address
//! - `SERVICE_NAME`: Service name used in message bodies
//! - `REGISTRATIONS_PER_IP`, `REGISTRATIONS_PER_ADDRESS`,
//!   `REGISTRATIONS_GLOBAL`, `ALERTS_PER_ADDRESS`: quota sizes
//! - `METRICS_ENABLED`: Serve `/metrics` (default: true)

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rng_alert_notifier::{
    clock::SystemClock,
    config::{Config, QuotaRule},
    handlers::{router, AppState},
    mailer,
    store::Backends,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = load_config();
    info!(
        bind_addr = %config.bind_addr,
        route_prefix = %config.route_prefix,
        registrations_per_ip = config.rate_limit.registrations_per_ip.max_events,
        registrations_per_address = config.rate_limit.registrations_per_address.max_events,
        registrations_global = config.rate_limit.registrations_global.max_events,
        alerts_per_address = config.rate_limit.alerts_per_address.max_events,
        "Starting RNG alert notifier"
    );

    // Create application state
    let clock = Arc::new(SystemClock);
    let backends = Backends::open(&config.storage, clock.clone()).await?;
    let mailer = mailer::from_config(&config.mail)?;
    let state = Arc::new(AppState::new(config.clone(), backends, mailer, clock)?);

    // Spawn cleanup task
    let cleanup_state = state.clone();
    let cleanup_interval = config.rate_limit.cleanup_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            cleanup_state.limiter.cleanup().await;
        }
    });

    // Build router
    let app: Router = router(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Load configuration from environment variables.
fn load_config() -> Config {
    let defaults = Config::default();
    let quotas = &defaults.rate_limit;

    let mut config = Config {
        bind_addr: env_or("BIND_ADDR", defaults.bind_addr.clone()),
        route_prefix: env_or("ROUTE_PREFIX", defaults.route_prefix.clone()),
        ..defaults.clone()
    };

    config.storage.database_url = env_or("DATABASE_URL", defaults.storage.database_url.clone());

    config.mail.sender = env_or("MAIL_SENDER", defaults.mail.sender.clone());
    config.mail.service_name = env_or("SERVICE_NAME", defaults.mail.service_name.clone());
    config.mail.smtp_host = std::env::var("SMTP_HOST").ok().filter(|h| !h.is_empty());
    config.mail.smtp_port = env_parse("SMTP_PORT", defaults.mail.smtp_port);
    config.mail.smtp_username = std::env::var("SMTP_USERNAME").ok();
    config.mail.smtp_password = std::env::var("SMTP_PASSWORD").ok();

    config.rate_limit.registrations_per_ip = quota_from_env("REGISTRATIONS_PER_IP", quotas.registrations_per_ip);
    config.rate_limit.registrations_per_address =
        quota_from_env("REGISTRATIONS_PER_ADDRESS", quotas.registrations_per_address);
    config.rate_limit.registrations_global = quota_from_env("REGISTRATIONS_GLOBAL", quotas.registrations_global);
    config.rate_limit.alerts_per_address = quota_from_env("ALERTS_PER_ADDRESS", quotas.alerts_per_address);

    config.metrics.enabled = env_parse("METRICS_ENABLED", defaults.metrics.enabled);

    config
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Override the event count of a quota, keeping its window.
fn quota_from_env(name: &str, default: QuotaRule) -> QuotaRule {
    QuotaRule {
        max_events: env_parse(name, default.max_events),
        ..default
    }
}
