//! HMAC signed URLs
//!
//! A signature binds a resource id to an expiry timestamp:
//! `hex(HMAC-SHA256(secret, "{id}:{expiry}"))`. Nothing is persisted; a URL is
//! valid while `now < expiry` and its signature matches.

use crate::config::SigningConfig;
use crate::errors::{AppError, Result};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const GENERATED_SECRET_BYTES: usize = 32;

/// Unix timestamp `ttl` after `now`, pinned at `i64::MAX` for huge TTLs
pub fn expiry_after(now: i64, ttl: Duration) -> i64 {
    now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
}

/// Issues and validates signed links
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl UrlSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Use the configured secret or generate one for this process.
    ///
    /// A generated secret invalidates every URL issued before a restart.
    pub fn from_config(config: &SigningConfig) -> Self {
        let ttl = Duration::from_secs(config.url_ttl_secs);
        match config.secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => Self::new(secret.as_bytes(), ttl),
            None => {
                let mut secret = vec![0u8; GENERATED_SECRET_BYTES];
                rand::thread_rng().fill_bytes(&mut secret);
                tracing::warn!("No signing secret configured, generated an ephemeral one");
                Self::new(secret, ttl)
            }
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn mac(&self, id: &str, expiry: i64) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|e| AppError::Signing {
            message: e.to_string(),
        })?;
        mac.update(id.as_bytes());
        mac.update(b":");
        mac.update(expiry.to_string().as_bytes());
        Ok(mac)
    }

    /// Deterministic signature for `(id, expiry)`
    pub fn sign(&self, id: &str, expiry: i64) -> Result<String> {
        Ok(hex::encode(self.mac(id, expiry)?.finalize().into_bytes()))
    }

    /// Expiry timestamp and signature for a link issued at `now`
    pub fn issue(&self, id: &str, now: i64) -> Result<(i64, String)> {
        let expiry = expiry_after(now, self.ttl);
        Ok((expiry, self.sign(id, expiry)?))
    }

    /// True only for a well-formed, unexpired, matching signature
    pub fn validate(&self, id: &str, expiry: &str, signature: &str, now: i64) -> bool {
        let Ok(expiry) = expiry.parse::<i64>() else {
            return false;
        };
        now < expiry && self.signature_matches(id, expiry, signature)
    }

    /// Like `validate`, but says why a link was refused
    pub fn check(&self, id: &str, expiry: &str, signature: &str, now: i64) -> Result<()> {
        let Ok(expiry) = expiry.parse::<i64>() else {
            return Err(AppError::InvalidSignature);
        };
        if !self.signature_matches(id, expiry, signature) {
            return Err(AppError::InvalidSignature);
        }
        if now >= expiry {
            return Err(AppError::ExpiredSignature);
        }
        Ok(())
    }

    /// Constant-time MAC comparison, independent of the clock
    fn signature_matches(&self, id: &str, expiry: i64, signature: &str) -> bool {
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        match self.mac(id, expiry) {
            Ok(mac) => mac.verify_slice(&provided).is_ok(),
            Err(_) => false,
        }
    }
}
