// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Registration and unregistration of alert addresses.
//!
//! Client-class checks happen at the HTTP layer. From here on a request is
//! metered by three quotas (client address, destination address, global),
//! then either re-sends the address's existing token or creates a new one.
//! Re-registration is idempotent: it never creates a second record.

use crate::config::RateLimitConfig;
use crate::error::{AppError, Result};
use crate::limiter::{Quota, RateLimiter};
use crate::mailer::{deliver, Mailer};
use crate::messages::token_email;
use crate::metrics::Metrics;
use crate::registry::IdentityRegistry;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// How a successful registration was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A new token was created and mailed
    Created,
    /// The address's existing token was mailed again
    Reissued,
}

impl RegistrationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Reissued => "reissued",
        }
    }
}

/// Orchestrates registration and unregistration.
pub struct RegistrationFlow {
    limiter: Arc<RateLimiter>,
    registry: IdentityRegistry,
    mailer: Arc<dyn Mailer>,
    quotas: RateLimitConfig,
    service_name: String,
    metrics: Metrics,
}

impl RegistrationFlow {
    pub fn new(
        limiter: Arc<RateLimiter>,
        registry: IdentityRegistry,
        mailer: Arc<dyn Mailer>,
        quotas: RateLimitConfig,
        service_name: String,
        metrics: Metrics,
    ) -> Self {
        Self {
            limiter,
            registry,
            mailer,
            quotas,
            service_name,
            metrics,
        }
    }

    /// Quotas a registration consumes, cheapest rejection first.
    pub fn quotas_for(&self, client: IpAddr, address: &str) -> [Quota; 3] {
        [
            Quota::registrations_per_ip(client, self.quotas.registrations_per_ip),
            Quota::registrations_per_address(address, self.quotas.registrations_per_address),
            Quota::registrations_global(self.quotas.registrations_global),
        ]
    }

    /// Register `address` on behalf of `client` and mail its token.
    ///
    /// `address` must already be parsed and normalized.
    pub async fn register(&self, client: IpAddr, address: &str) -> Result<RegistrationOutcome> {
        let quotas = self.quotas_for(client, address);
        if let Err(err) = self.limiter.enforce(&quotas).await {
            if let AppError::RateLimited { scope, .. } = &err {
                self.metrics.rate_limited(*scope);
            }
            return Err(err);
        }

        let outcome = match self.registry.find_by_address(address).await? {
            Some(existing) => {
                debug!(reference = %existing.reference, "Address already registered, resending id");
                self.send_token(address, &existing.token).await;
                RegistrationOutcome::Reissued
            }
            None => {
                let token = self.registry.create(address).await?;
                self.send_token(address, &token).await;
                RegistrationOutcome::Created
            }
        };

        info!(%client, outcome = outcome.label(), "Registration handled");
        self.metrics.registration(outcome.label());
        Ok(outcome)
    }

    /// Delete the registration behind `token`.
    pub async fn unregister(&self, token: &str) -> Result<()> {
        let reference = self
            .registry
            .find_by_token(token)
            .await?
            .ok_or(AppError::TokenNotFound)?;

        self.registry.delete(reference).await?;
        self.metrics.unregistration();
        Ok(())
    }

    async fn send_token(&self, address: &str, token: &str) {
        let email = token_email(&self.service_name, address, token);
        deliver(self.mailer.as_ref(), address, &email.subject, &email.body).await;
    }
}
