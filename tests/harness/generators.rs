// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for abuse simulation.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Generate a pool of IPv4 client addresses.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Generate IPv6 clients that all sit inside one /64.
pub fn generate_ipv6_same_prefix(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0x1234, 0x5678, 0, 0, 0, i as u16 + 1)))
        .collect()
}

/// Generate a pool of distinct destination addresses.
pub fn generate_addresses(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("user{}@mail-{}.example.com", i, i % 7))
        .collect()
}

/// User-Agent values a registration might arrive with.
pub fn generate_user_agents() -> Vec<Option<&'static str>> {
    vec![
        // Allowed
        Some("curl/8.4.0"),
        Some("curl/7.68.0"),
        Some("Wget/1.21.4"),
        Some("wget"),
        Some("CURL/8.0"),
        // Rejected
        Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"),
        Some("python-requests/2.31.0"),
        Some("Go-http-client/1.1"),
        Some("libcurl-agent/1.0"),
        Some(" curl/8.4.0"),
        Some("cur"),
        Some(""),
        None,
    ]
}

/// Whether a User-Agent belongs to an allowed command-line client.
pub fn is_cli_user_agent(ua: Option<&str>) -> bool {
    match ua {
        Some(s) => {
            let lower = s.to_ascii_lowercase();
            lower.starts_with("curl") || lower.starts_with("wget")
        }
        None => false,
    }
}

/// Path segments that must not yield a registration.
pub fn generate_malformed_addresses() -> Vec<&'static str> {
    vec![
        "",
        "not-an-address",
        "@example.com",
        "alice@",
        "alice@example.com/extra",
        "alice@example.com,bob@example.com",
        "   ",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ips() {
        let ips = generate_ips(256);
        assert_eq!(ips.len(), 256);
        // All should be unique
        let unique: std::collections::HashSet<_> = ips.iter().collect();
        assert_eq!(unique.len(), 256);
    }

    #[test]
    fn test_generate_addresses() {
        let addresses = generate_addresses(100);
        assert_eq!(addresses.len(), 100);
        let unique: std::collections::HashSet<_> = addresses.iter().collect();
        assert_eq!(unique.len(), 100);
    }

    #[test]
    fn test_cli_user_agent_classification() {
        assert!(is_cli_user_agent(Some("curl/8.4.0")));
        assert!(is_cli_user_agent(Some("Wget/1.21")));
        assert!(!is_cli_user_agent(Some("Mozilla/5.0")));
        assert!(!is_cli_user_agent(None));
    }
}
