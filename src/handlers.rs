// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the RNG alert notifier.
//!
//! Responses are plain text so that `curl` users can read them directly.
//! No response body ever contains a registration token.

use crate::clock::Clock;
use crate::config::Config;
use crate::error::AppError;
use crate::limiter::RateLimiter;
use crate::mailer::Mailer;
use crate::metrics::Metrics;
use crate::notify::Notifier;
use crate::registration::RegistrationFlow;
use crate::registry::IdentityRegistry;
use crate::store::Backends;
use crate::validator::{RegistrationValidator, ValidationError};
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, HeaderName, Method},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub validator: RegistrationValidator,
    pub limiter: Arc<RateLimiter>,
    pub registration: RegistrationFlow,
    pub notifier: Notifier,
    pub metrics: Metrics,
}

impl AppState {
    /// Wire the flows onto the given storage, mailer and clock.
    pub fn new(
        config: Config,
        backends: Backends,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> prometheus::Result<Self> {
        let metrics = Metrics::new()?;
        let limiter = Arc::new(RateLimiter::with_clock(backends.quotas, clock));
        let registry = IdentityRegistry::new(backends.registrations);

        let registration = RegistrationFlow::new(
            limiter.clone(),
            registry.clone(),
            mailer.clone(),
            config.rate_limit.clone(),
            config.mail.service_name.clone(),
            metrics.clone(),
        );
        let notifier = Notifier::new(
            registry,
            limiter.clone(),
            mailer,
            config.rate_limit.alerts_per_address,
            config.mail.service_name.clone(),
            metrics.clone(),
        );

        Ok(Self {
            validator: RegistrationValidator::new(config.client_policy.clone()),
            config,
            limiter,
            registration,
            notifier,
            metrics,
        })
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let prefix = state.config.route_prefix.trim_matches('/').to_string();

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route(&format!("/{}/register", prefix), any(register))
        .route(&format!("/{}/register/", prefix), any(register))
        .route(&format!("/{}/register/*address", prefix), any(register))
        .route(&format!("/{}/unregister", prefix), any(unregister))
        .route(&format!("/{}/unregister/", prefix), any(unregister))
        .route(&format!("/{}/unregister/*token", prefix), any(unregister));

    if state.config.metrics.enabled {
        router = router.route(&state.config.metrics.path, get(metrics));
    }

    router.with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "rng-alert-notifier",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Register an email address for failure alerts.
///
/// The token is mailed to the address; the response only confirms that
/// a message was sent.
pub async fn register(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    headers: HeaderMap,
    address: Option<Path<String>>,
) -> Result<String, AppError> {
    state
        .validator
        .validate(
            origin(&headers),
            header_str(&headers, &header::USER_AGENT),
        )
        .into_result()?;

    if method != Method::POST {
        return Err(ValidationError::WrongMethod("register", "POST").into());
    }

    let segment = address.map(|Path(a)| a).unwrap_or_default();
    let address = state.validator.parse_address(&segment)?;

    debug!(client = %peer.ip(), "Processing registration");
    state.registration.register(peer.ip(), &address).await?;

    Ok(format!("Check your email, ID sent to {}\n", address))
}

/// Delete the registration behind a token.
pub async fn unregister(
    State(state): State<Arc<AppState>>,
    method: Method,
    token: Option<Path<String>>,
) -> Result<String, AppError> {
    if method != Method::DELETE {
        return Err(ValidationError::WrongMethod("unregister", "DELETE").into());
    }

    let token = token.map(|Path(t)| t).unwrap_or_default();
    if token.is_empty() {
        return Err(ValidationError::MissingParameter("userID").into());
    }
    if token.contains('/') {
        return Err(ValidationError::PathTooLong.into());
    }

    state.registration.unregister(&token).await?;
    Ok("id unregistered\n".to_string())
}

/// Prometheus metrics endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => AppError::Internal(err.to_string()).into_response(),
    }
}

/// The `Origin` header, if present. Values that are not visible ASCII
/// still count as an origin.
fn origin(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ORIGIN)
        .map(|v| v.to_str().unwrap_or("<non-ascii>"))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
