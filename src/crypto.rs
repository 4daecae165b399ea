use crate::StoreError;
use crate::config::HashingConfig;
use argon2::{Algorithm, Argon2, Params, PasswordVerifier, Version};
use password_hash::{PasswordHash, PasswordHasher as ArgonPasswordHasher, SaltString};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// A password or other credential that must never reach a log line.
///
/// `Debug` and `Display` print `[REDACTED]`. The type deserializes from a
/// plain string so it can sit in request bodies, but it does not serialize.
///
/// # Example
///
/// ```rust
/// use storegraph::crypto::SecretString;
///
/// let password = SecretString::new("correct horse");
///
/// assert_eq!(format!("{:?}", password), "SecretString([REDACTED])");
/// assert_eq!(password.expose_secret(), "correct horse");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The underlying value. Only pass it to a hasher.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString)
    }
}

/// Password hashing used by the login resolver and by callers creating
/// accounts.
///
/// Provisioned accounts copy the source account's hash verbatim, so every
/// hash stored in a tenant must be verifiable by the same implementation.
///
/// # Example
///
/// ```rust
/// use storegraph::crypto::{Argon2Hasher, PasswordHasher};
///
/// let hasher = Argon2Hasher::new(4096, 1, 1);
/// let hash = hasher.hash("mypassword").unwrap();
/// assert!(hasher.verify("mypassword", &hash).unwrap());
/// assert!(!hasher.verify("wrongpassword", &hash).unwrap());
/// ```
pub trait PasswordHasher: Send + Sync {
    /// # Errors
    ///
    /// Returns `StoreError::PasswordHashError` if hashing fails.
    fn hash(&self, password: &str) -> Result<String, StoreError>;

    /// Returns `Ok(false)` on a mismatch.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::PasswordHashError` if the hash is malformed.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, StoreError>;
}

/// Argon2id hasher.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    /// KiB
    memory_cost: u32,
    time_cost: u32,
    parallelism: u32,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::from(&HashingConfig::default())
    }
}

impl From<&HashingConfig> for Argon2Hasher {
    fn from(config: &HashingConfig) -> Self {
        Self::new(config.memory_cost, config.time_cost, config.parallelism)
    }
}

impl Argon2Hasher {
    #[must_use]
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    /// 64 MiB, 3 iterations, 4 lanes.
    #[must_use]
    pub fn production() -> Self {
        Self::new(65536, 3, 4)
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, StoreError> {
        let salt = SaltString::generate(&mut OsRng);
        let params = Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
            .map_err(|_| StoreError::PasswordHashError)?;

        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|_| StoreError::PasswordHashError)
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, StoreError> {
        let parsed = PasswordHash::new(hash).map_err(|_| StoreError::PasswordHashError)?;

        // Parameters come from the PHC string.
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_redacted() {
        let secret = SecretString::new("my_password");
        assert_eq!(format!("{secret:?}"), "SecretString([REDACTED])");
        assert_eq!(format!("{secret}"), "[REDACTED]");
        assert_eq!(secret.expose_secret(), "my_password");
    }

    #[test]
    fn test_secret_string_deserializes() {
        let secret: SecretString = serde_json::from_str("\"hunter2\"").unwrap();
        assert_eq!(secret, SecretString::from("hunter2"));
    }

    #[test]
    fn test_hash_and_verify_with_config() {
        let hasher = Argon2Hasher::from(&HashingConfig {
            memory_cost: 4096,
            time_cost: 1,
            parallelism: 1,
        });
        let hash = hasher.hash("s3cret").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("s3cret", &hash).unwrap());
        assert!(!hasher.verify("other", &hash).unwrap());
        assert!(Argon2Hasher::production().verify("s3cret", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let err = Argon2Hasher::default().verify("x", "not-a-hash").unwrap_err();
        assert_eq!(err, StoreError::PasswordHashError);
    }
}
