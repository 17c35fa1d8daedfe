//! One-way credential hashing with Argon2id and a server-side pepper.
//!
//! Used for account passwords and for refresh-token secrets alike.

use super::errors::{AuthError, AuthResult};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Argon2 work factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl HashCost {
    /// Cheapest cost argon2 accepts comfortably. For tests and local tooling only.
    pub const fn minimal() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Salted, peppered Argon2id hasher
#[derive(Clone)]
pub struct CredentialHasher {
    pepper: String,
    params: Params,
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl CredentialHasher {
    /// Create a new hasher
    ///
    /// # Arguments
    ///
    /// * `pepper` - Server-side secret appended to every plaintext
    /// * `cost` - Argon2 work factor
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - The cost parameters are outside argon2's limits
    pub fn new(pepper: String, cost: HashCost) -> AuthResult<Self> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| AuthError::Validation(format!("argon2 parameters: {e}")))?;

        Ok(Self { pepper, params })
    }

    /// Hash a plaintext with a fresh random salt
    ///
    /// Two calls with the same input produce different hashes.
    ///
    /// # Errors
    ///
    /// * `AuthError::HashingFailed` - Argon2 could not produce a hash
    pub fn hash(&self, plaintext: &str) -> AuthResult<String> {
        let peppered = format!("{}{}", plaintext, self.pepper);
        let salt = SaltString::generate(&mut OsRng);

        Ok(self
            .argon2()
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    /// Verify a plaintext against a stored hash
    ///
    /// A malformed hash verifies as `false` instead of raising.
    pub fn verify(&self, hash: &str, plaintext: &str) -> bool {
        let peppered = format!("{}{}", plaintext, self.pepper);

        PasswordHash::new(hash)
            .map(|parsed| {
                self.argon2()
                    .verify_password(peppered.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}
