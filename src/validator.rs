// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Registration request validator.
//!
//! Registration is restricted to command-line clients:
//! - Requests carrying an `Origin` header (browsers) are rejected
//! - The `User-Agent` must start with an allowed tool name
//! - The path must carry exactly one RFC 5322 address

use crate::config::ClientPolicyConfig;
use axum::http::StatusCode;
use lettre::message::Mailboxes;
use thiserror::Error;
use tracing::debug;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("CORS requests are not allowed")]
    CrossOrigin,

    #[error("Email registration must be done via {allowed}")]
    ClientNotAllowed { allowed: String },

    #[error("{0} method must be {1}")]
    WrongMethod(&'static str, &'static str),

    #[error("Missing {0}")]
    MissingParameter(&'static str),

    #[error("URL path too long")]
    PathTooLong,

    #[error("Invalid email address")]
    InvalidAddress,
}

impl ValidationError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::CrossOrigin | Self::ClientNotAllowed { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Result of validation.
#[derive(Debug, Clone)]
pub enum ValidationResult {
    /// Request is valid
    Valid,
    /// Request is invalid
    Invalid(ValidationError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        match self {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid(e) => Err(e),
        }
    }
}

/// Registration request validator.
pub struct RegistrationValidator {
    config: ClientPolicyConfig,
}

impl RegistrationValidator {
    /// Create a new validator with the given configuration.
    pub fn new(config: ClientPolicyConfig) -> Self {
        Self { config }
    }

    /// Reject browser-originated requests.
    pub fn validate_origin(&self, origin: Option<&str>) -> ValidationResult {
        match origin {
            Some(origin) if self.config.reject_cross_origin && !origin.is_empty() => {
                debug!(origin, "Cross-origin registration rejected");
                ValidationResult::Invalid(ValidationError::CrossOrigin)
            }
            _ => ValidationResult::Valid,
        }
    }

    /// Accept only the configured command-line tools.
    pub fn validate_user_agent(&self, user_agent: Option<&str>) -> ValidationResult {
        let ua = user_agent.unwrap_or("");
        let allowed = self.config.allowed_user_agents.iter().any(|prefix| {
            ua.len() >= prefix.len()
                && ua.is_char_boundary(prefix.len())
                && ua[..prefix.len()].eq_ignore_ascii_case(prefix)
        });

        if allowed {
            ValidationResult::Valid
        } else {
            debug!(user_agent = ua, "Client not allowed to register");
            ValidationResult::Invalid(ValidationError::ClientNotAllowed {
                allowed: self.config.allowed_user_agents.join(" or "),
            })
        }
    }

    /// Validate the client class of a registration request.
    pub fn validate(&self, origin: Option<&str>, user_agent: Option<&str>) -> ValidationResult {
        let result = self.validate_origin(origin);
        if !result.is_valid() {
            return result;
        }
        self.validate_user_agent(user_agent)
    }

    /// Parse the single address carried by a path segment.
    ///
    /// Display names are dropped and the domain is lower-cased, so
    /// `Alice <alice@Example.COM>` yields `alice@example.com`.
    pub fn parse_address(&self, segment: &str) -> Result<String, ValidationError> {
        if segment.is_empty() {
            return Err(ValidationError::MissingParameter("email"));
        }
        if segment.contains('/') {
            return Err(ValidationError::PathTooLong);
        }

        let mailboxes: Mailboxes = segment.parse().map_err(|_| {
            debug!(segment, "Unparseable address");
            ValidationError::InvalidAddress
        })?;

        let mut iter = mailboxes.into_iter();
        match (iter.next(), iter.next()) {
            (Some(mailbox), None) => {
                let email = mailbox.email;
                Ok(format!("{}@{}", email.user(), email.domain().to_lowercase()))
            }
            _ => {
                debug!(segment, "Expected exactly one address");
                Err(ValidationError::InvalidAddress)
            }
        }
    }
}
