//! Capability tokens for redemptions.
//!
//! A token is an HS256-signed JWT carrying `{redemption_id, user_id,
//! reward_type, exp}`. It lets a partner locate one redemption without a lookup
//! round trip; it is never the source of truth. Expiry is checked here with zero
//! leeway (`now >= exp` is expired).

use std::fmt;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::Error;
use crate::models::{Redemption, RewardType};

const MIN_SECRET_LEN: usize = 32;

/// Payload signed into a redemption token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub redemption_id: Uuid,
    pub user_id: String,
    pub reward_type: RewardType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl TokenClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp as i64, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp as i64
    }
}

/// Signature-checked claims plus whether their expiry has passed.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub claims: TokenClaims,
    pub expired: bool,
}

/// A freshly minted token and the expiry actually written into it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Stateless mint/verify. Cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    max_ttl: Option<Duration>,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("max_ttl", &self.max_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Returns an error if the secret is shorter than 32 bytes.
    pub fn new(secret: &[u8], max_ttl: Option<Duration>) -> Result<Self, Error> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(Error::Config(format!(
                "token secret must be at least {} bytes, got {}",
                MIN_SECRET_LEN,
                secret.len()
            )));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            max_ttl,
        })
    }

    /// Codec with a fixed, well-known secret. Never use outside tests and local runs.
    pub fn new_dev() -> Self {
        let secret = b"dev-mode-secret-not-for-production-use-123456";
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            max_ttl: None,
        }
    }

    pub fn with_max_ttl(mut self, max_ttl: Option<Duration>) -> Self {
        self.max_ttl = max_ttl;
        self
    }

    /// Mints a token for `redemption`. The token never outlives the redemption.
    pub fn issue(&self, redemption: &Redemption, now: DateTime<Utc>) -> Result<IssuedToken, Error> {
        let expires_at = match self.max_ttl {
            Some(ttl) => std::cmp::min(redemption.expires_at, now + ttl),
            None => redemption.expires_at,
        };
        let claims = TokenClaims {
            redemption_id: redemption.redemption_id,
            user_id: redemption.user_id.clone(),
            reward_type: redemption.reward_type(),
            iat: now.timestamp().max(0) as u64,
            exp: expires_at.timestamp().max(0) as u64,
        };
        let token = self.mint(&claims)?;
        Ok(IssuedToken { token, expires_at: claims.expires_at() })
    }

    pub fn mint(&self, claims: &TokenClaims) -> Result<String, Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| Error::Signing(e.to_string()))
    }

    /// Full check: signature and expiry.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, Error> {
        let verified = self.verify_signature(token, now)?;
        if verified.expired {
            return Err(Error::ExpiredToken);
        }
        Ok(verified.claims)
    }

    /// Signature-only check; expiry is reported rather than enforced.
    pub fn verify_signature(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedToken, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<TokenClaims>(token, &self.decoding, &validation).map_err(|e| {
            debug!("rejecting redemption token: {}", e);
            Error::InvalidToken
        })?;

        let expired = data.claims.is_expired_at(now);
        Ok(VerifiedToken { claims: data.claims, expired })
    }
}
