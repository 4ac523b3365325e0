//! Webhook signature verification.
//!
//! Providers sign callback bodies with HMAC-SHA256 over the exact raw
//! bytes and send the hex digest in a header. Verification uses
//! `verify_slice`, which compares in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CourierError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Checks webhook signatures for one provider.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: Option<String>,
    allow_unsigned: bool,
}

impl WebhookVerifier {
    /// Builds a verifier from an optional shared secret.
    ///
    /// Running without a secret must be opted into explicitly; a missing
    /// secret with `allow_unsigned` off is a configuration error.
    pub fn new(secret: Option<String>, allow_unsigned: bool) -> Result<Self> {
        if secret.is_none() && !allow_unsigned {
            return Err(CourierError::Config(
                "webhook secret missing and unsigned webhooks are not allowed".to_string(),
            ));
        }
        Ok(Self {
            secret,
            allow_unsigned,
        })
    }

    /// Builds a verifier that always requires a valid signature.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            allow_unsigned: false,
        }
    }

    /// Whether unsigned webhooks are accepted.
    pub fn allows_unsigned(&self) -> bool {
        self.secret.is_none() && self.allow_unsigned
    }

    /// Checks a hex-encoded HMAC-SHA256 signature against the raw body.
    ///
    /// With no secret configured every body passes; construction already
    /// guaranteed that mode was opted into.
    pub fn verify(&self, raw_body: &[u8], signature: Option<&str>) -> bool {
        let Some(secret) = &self.secret else {
            tracing::warn!("accepting unsigned webhook, no secret configured");
            return true;
        };

        let Some(signature) = signature else {
            return false;
        };
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(raw_body);
        mac.verify_slice(&expected).is_ok()
    }
}

/// Computes the hex-encoded HMAC-SHA256 signature for a raw body.
pub fn sign(secret: &str, raw_body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| CourierError::Config("invalid webhook secret".to_string()))?;
    mac.update(raw_body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_signature_passes() {
        let verifier = WebhookVerifier::with_secret("shhh");
        let body = br#"{"consignment_id":"DX-1","order_status":"delivered"}"#;
        let signature = sign("shhh", body).unwrap();

        assert!(verifier.verify(body, Some(&signature)));
    }

    #[test]
    fn test_tampered_body_fails() {
        let verifier = WebhookVerifier::with_secret("shhh");
        let signature = sign("shhh", b"original body").unwrap();

        assert!(!verifier.verify(b"tampered body", Some(&signature)));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let verifier = WebhookVerifier::with_secret("shhh");
        let signature = sign("not-the-secret", b"body").unwrap();

        assert!(!verifier.verify(b"body", Some(&signature)));
    }

    #[test]
    fn test_missing_or_garbled_signature_fails() {
        let verifier = WebhookVerifier::with_secret("shhh");

        assert!(!verifier.verify(b"body", None));
        assert!(!verifier.verify(b"body", Some("not hex at all")));
        assert!(!verifier.verify(b"body", Some("")));
    }

    #[test]
    fn test_signature_whitespace_is_trimmed() {
        let verifier = WebhookVerifier::with_secret("shhh");
        let signature = sign("shhh", b"body").unwrap();

        assert!(verifier.verify(b"body", Some(&format!(" {signature}\n"))));
    }

    #[test]
    fn test_unsigned_mode_must_be_opted_into() {
        let err = WebhookVerifier::new(None, false).unwrap_err();
        assert!(matches!(err, CourierError::Config(_)));

        let verifier = WebhookVerifier::new(None, true).unwrap();
        assert!(verifier.allows_unsigned());
        assert!(verifier.verify(b"anything", None));
    }
}
