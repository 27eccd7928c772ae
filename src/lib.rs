// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! RNG Alert Notifier
//!
//! Lets a detector of random number generator failures email the affected
//! user, without letting anyone use the service to spam arbitrary
//! addresses:
//!
//! - Address registration mails an opaque id to the address (curl/wget only)
//! - Per-client (2/day), per-address (1/week) and global (10/hour) quotas
//! - Idempotent re-registration: the existing id is mailed again
//! - Failure alerts fan out to every address behind an id, 5/day/address

pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod mailer;
pub mod messages;
pub mod metrics;
pub mod notify;
pub mod registration;
pub mod registry;
pub mod store;
pub mod validator;

pub use config::Config;
pub use error::AppError;
pub use limiter::{Quota, QuotaScope, RateLimitResult, RateLimiter};
pub use notify::{Notifier, NotifySummary};
pub use registration::{RegistrationFlow, RegistrationOutcome};
pub use registry::IdentityRegistry;
pub use validator::{RegistrationValidator, ValidationResult};
