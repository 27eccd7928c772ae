// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Identity registry: opaque tokens standing in for verified addresses.
//!
//! A token proves nothing beyond "was delivered to this address". It is
//! only ever revealed by email, never in an HTTP response.

use crate::error::{AppError, Result};
use crate::store::{Registration, RegistrationRef, RegistrationStore};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, info};

/// Random bytes per token (64 bits).
pub const TOKEN_BYTES: usize = 8;

/// Generate a fresh token: [`TOKEN_BYTES`] from the OS CSPRNG as lowercase hex.
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AppError::Internal(format!("rand error: {}", e)))?;
    Ok(hex::encode(bytes))
}

/// Lookup, creation and deletion of registrations.
#[derive(Clone)]
pub struct IdentityRegistry {
    store: Arc<dyn RegistrationStore>,
}

impl IdentityRegistry {
    pub fn new(store: Arc<dyn RegistrationStore>) -> Self {
        Self { store }
    }

    /// Resolve a caller-supplied token. Empty tokens resolve to nothing.
    pub async fn find_by_token(&self, token: &str) -> Result<Option<RegistrationRef>> {
        if token.is_empty() {
            return Ok(None);
        }
        let found = self.store.find_by_token(token).await?;
        Ok(found.first().map(|r| r.reference))
    }

    /// Every registration carrying `token`.
    pub async fn resolve_all(&self, token: &str) -> Result<Vec<Registration>> {
        if token.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.find_by_token(token).await?)
    }

    /// The first live registration for `address`, if any.
    pub async fn find_by_address(&self, address: &str) -> Result<Option<Registration>> {
        let mut found = self.store.find_by_address(address).await?;
        if found.len() > 1 {
            debug!(count = found.len(), "Duplicate registrations for address, using first");
        }
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    /// Register `address` under a new token and return the token.
    ///
    /// Does not check for an existing registration; callers look up
    /// [`find_by_address`](Self::find_by_address) first.
    pub async fn create(&self, address: &str) -> Result<String> {
        let token = generate_token()?;
        let reference = self.store.insert(&token, address).await?;
        info!(%reference, "Registration created");
        Ok(token)
    }

    /// Remove a registration. Missing references are an error.
    pub async fn delete(&self, reference: RegistrationRef) -> Result<()> {
        self.store.delete(reference).await?;
        info!(%reference, "Registration deleted");
        Ok(())
    }
}
