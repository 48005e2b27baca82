// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id password hashing in PHC string format.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use fluxbot_core::FluxbotError;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::warn;

/// Hashes and verifies user passwords.
///
/// Hashing is CPU-bound; call from `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct Passwords {
    params: Params,
}

impl Default for Passwords {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Passwords {
    /// Custom cost parameters (memory in KiB, iterations, lanes).
    pub fn with_params(memory_kib: u32, iterations: u32, lanes: u32) -> Result<Self, FluxbotError> {
        let params = Params::new(memory_kib, iterations, lanes, None)
            .map_err(|e| FluxbotError::Config(format!("invalid Argon2id parameters: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, password: &str) -> Result<String, FluxbotError> {
        let mut salt = [0u8; 16];
        SystemRandom::new()
            .fill(&mut salt)
            .map_err(|_| FluxbotError::Internal("failed to generate random salt".into()))?;
        let salt = SaltString::encode_b64(&salt)
            .map_err(|e| FluxbotError::Internal(format!("failed to encode salt: {e}")))?;
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| FluxbotError::Internal(format!("password hashing failed: {e}")))
    }

    /// `false` for a wrong password or an unparseable stored hash.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        let parsed = match PasswordHash::new(stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "stored password hash is malformed");
                return false;
            }
        };
        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}
