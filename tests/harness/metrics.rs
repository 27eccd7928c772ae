// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outcome tallies for abuse simulation runs.

use std::collections::HashMap;

/// Collects outcomes during an attack simulation.
#[derive(Debug, Default)]
pub struct AttackMetrics {
    /// Count of requests by outcome
    outcomes: HashMap<Outcome, usize>,
    /// Count of requests by client
    requests_per_client: HashMap<String, usize>,
    /// Count of requests by destination address
    requests_per_address: HashMap<String, usize>,
}

/// Possible outcomes for a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Registered,
    Reissued,
    RateLimitedClient,
    RateLimitedAddress,
    RateLimitedGlobal,
    CrossOrigin,
    ClientNotAllowed,
    InvalidAddress,
    StoreError,
}

impl Outcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Outcome::Registered | Outcome::Reissued)
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Outcome::RateLimitedClient | Outcome::RateLimitedAddress | Outcome::RateLimitedGlobal
        )
    }
}

impl AttackMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request outcome.
    pub fn record(&mut self, outcome: Outcome, client: &str, address: &str) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        *self.requests_per_client.entry(client.to_string()).or_insert(0) += 1;
        *self.requests_per_address.entry(address.to_string()).or_insert(0) += 1;
    }

    pub fn total_requests(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    pub fn allowed(&self) -> usize {
        self.sum_where(Outcome::is_allowed)
    }

    pub fn rate_limited(&self) -> usize {
        self.sum_where(Outcome::is_rate_limited)
    }

    /// Ratio of blocked attempts to all attempts.
    pub fn block_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        (total - self.allowed()) as f64 / total as f64
    }

    pub fn unique_clients(&self) -> usize {
        self.requests_per_client.len()
    }

    pub fn unique_addresses(&self) -> usize {
        self.requests_per_address.len()
    }

    fn sum_where(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|(o, _)| pred(*o))
            .map(|(_, n)| n)
            .sum()
    }

    /// Generate a summary report.
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            total_requests: self.total_requests(),
            allowed: self.allowed(),
            rate_limited_client: self.count(Outcome::RateLimitedClient),
            rate_limited_address: self.count(Outcome::RateLimitedAddress),
            rate_limited_global: self.count(Outcome::RateLimitedGlobal),
            client_rejected: self.count(Outcome::CrossOrigin) + self.count(Outcome::ClientNotAllowed),
            invalid_address: self.count(Outcome::InvalidAddress),
            store_errors: self.count(Outcome::StoreError),
            block_rate: self.block_rate(),
            unique_clients: self.unique_clients(),
            unique_addresses: self.unique_addresses(),
        }
    }
}

/// Summary report of attack outcomes.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub total_requests: usize,
    pub allowed: usize,
    pub rate_limited_client: usize,
    pub rate_limited_address: usize,
    pub rate_limited_global: usize,
    pub client_rejected: usize,
    pub invalid_address: usize,
    pub store_errors: usize,
    pub block_rate: f64,
    pub unique_clients: usize,
    pub unique_addresses: usize,
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Attack Metrics Report ===")?;
        writeln!(f, "Total Attempts:     {}", self.total_requests)?;
        writeln!(f)?;
        writeln!(f, "--- Outcomes ---")?;
        writeln!(f, "Allowed:            {}", self.allowed)?;
        writeln!(f, "Limited (client):   {}", self.rate_limited_client)?;
        writeln!(f, "Limited (address):  {}", self.rate_limited_address)?;
        writeln!(f, "Limited (global):   {}", self.rate_limited_global)?;
        writeln!(f, "Client Rejected:    {}", self.client_rejected)?;
        writeln!(f, "Invalid Address:    {}", self.invalid_address)?;
        writeln!(f, "Store Errors:       {}", self.store_errors)?;
        writeln!(f, "Block Rate:         {:.1}%", self.block_rate * 100.0)?;
        writeln!(f)?;
        writeln!(f, "--- Distribution ---")?;
        writeln!(f, "Unique Clients:     {}", self.unique_clients)?;
        writeln!(f, "Unique Addresses:   {}", self.unique_addresses)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        let mut metrics = AttackMetrics::new();
        metrics.record(Outcome::Registered, "10.0.0.1", "a@example.com");
        metrics.record(Outcome::Reissued, "10.0.0.1", "a@example.com");
        metrics.record(Outcome::RateLimitedClient, "10.0.0.1", "b@example.com");

        assert_eq!(metrics.total_requests(), 3);
        assert_eq!(metrics.allowed(), 2);
        assert_eq!(metrics.rate_limited(), 1);
        assert_eq!(metrics.unique_clients(), 1);
        assert_eq!(metrics.unique_addresses(), 2);
    }

    #[test]
    fn test_block_rate() {
        let mut metrics = AttackMetrics::new();
        for _ in 0..3 {
            metrics.record(Outcome::Registered, "10.0.0.1", "a@example.com");
        }
        for _ in 0..7 {
            metrics.record(Outcome::RateLimitedGlobal, "10.0.0.1", "a@example.com");
        }

        assert!((metrics.block_rate() - 0.7).abs() < 0.01);
    }
}
