// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Message texts.

/// Subject and body of an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub body: String,
}

/// Delivers a registration token to its address.
pub fn token_email(service: &str, address: &str, token: &str) -> Email {
    Email {
        subject: "Random Sanity id request".to_string(),
        body: format!(
            "Somebody requested an id for this email address ({address})\n\
             for the {service} service.\n\
             \n\
             id: {token}\n\
             \n\
             Append ?id={token} to API calls to be notified of failures via email.\n\
             \n\
             If somebody is pretending to be you and you don't use the {service}\n\
             service, please ignore this message.\n"
        ),
    }
}

/// Reports a detected generator failure.
pub fn alert_email(service: &str, tag: &str, payload: &[u8], reason: &str) -> Email {
    Email {
        subject: "Random Number Generator Failure Detected".to_string(),
        body: format!(
            "The {service} service has detected a failure.\n\
             \n\
             Failure reason: {reason}\n\
             Data: 0x{}\n\
             Tag: {tag}\n",
            hex::encode(payload)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_email() {
        let email = token_email("randomsanity.org", "a@example.com", "0123456789abcdef");
        assert!(email.body.contains("(a@example.com)"));
        assert!(email.body.contains("id: 0123456789abcdef\n"));
        assert!(email.body.contains("?id=0123456789abcdef"));
    }

    #[test]
    fn test_alert_email() {
        let email = alert_email("randomsanity.org", "tag1", &[0xde, 0xad, 0x00], "bias detected");
        assert_eq!(email.subject, "Random Number Generator Failure Detected");
        assert!(email.body.contains("Failure reason: bias detected\n"));
        assert!(email.body.contains("Data: 0xdead00\n"));
        assert!(email.body.contains("Tag: tag1\n"));
    }
}
