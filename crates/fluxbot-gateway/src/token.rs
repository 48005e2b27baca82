// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HS256 JSON Web Tokens for API sessions.
//!
//! Claims are `{userId, iat, exp}`. Verification needs only the secret, so a
//! request's identity is resolved without a storage lookup. Expiry is checked
//! against the caller's clock rather than the library's, which keeps it
//! testable.

use chrono::{DateTime, Duration, Utc};
use fluxbot_core::{FluxbotError, UserId};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: i64,
    iat: i64,
    exp: i64,
}

pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[redacted]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn invalid() -> FluxbotError {
    FluxbotError::Unauthorized("invalid or expired token".into())
}

impl TokenSigner {
    pub fn new(secret: SecretString, ttl_days: u32) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl: Duration::days(i64::from(ttl_days)),
        }
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }

    /// Issue a token for `user_id`, valid until `now + ttl`.
    pub fn issue(&self, user_id: UserId, now: DateTime<Utc>) -> Result<String, FluxbotError> {
        let claims = Claims {
            user_id: user_id.0,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| FluxbotError::Internal(format!("failed to sign token: {e}")))
    }

    /// Resolve the user a token was issued to.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, FluxbotError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &Self::validation())
            .map_err(|_| invalid())?;
        if data.claims.exp <= now.timestamp() {
            return Err(invalid());
        }
        Ok(UserId(data.claims.user_id))
    }
}
