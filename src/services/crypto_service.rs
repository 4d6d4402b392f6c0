use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;
use zeroize::Zeroize;

use crate::types::errors::CryptoError;

/// PBKDF2 iteration count for password hashing.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length in bytes for PBKDF2.
const SALT_LENGTH: usize = 16;

/// Derived hash length in bytes.
const HASH_LENGTH: usize = 32;

/// Prefix identifying the stored hash format.
const HASH_SCHEME: &str = "pbkdf2-sha256";

/// Trait defining the password hashing operations used for accounts.
pub trait CryptoServiceTrait {
    /// Hashes a password with a fresh random salt.
    ///
    /// The result is self-describing: `pbkdf2-sha256$<iterations>$<salt>$<hash>`
    /// with base64 salt and hash.
    fn hash_password(&self, password: &str) -> Result<String, CryptoError>;

    /// Checks a password against a stored hash in constant time.
    fn verify_password(&self, password: &str, stored: &str) -> Result<bool, CryptoError>;

    /// Generates a cryptographically secure random salt.
    fn generate_salt(&self) -> Result<Vec<u8>, CryptoError>;
}

/// Implementation of password hashing using the `ring` crate.
pub struct CryptoService {
    rng: SystemRandom,
    iterations: NonZeroU32,
}

impl CryptoService {
    /// Creates a new CryptoService using [`PBKDF2_ITERATIONS`].
    pub fn new() -> Self {
        Self::with_iterations(PBKDF2_ITERATIONS)
    }

    /// Creates a CryptoService with a custom iteration count (minimum 1).
    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            rng: SystemRandom::new(),
            iterations: NonZeroU32::new(iterations).unwrap_or(NonZeroU32::MIN),
        }
    }
}

impl Default for CryptoService {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoServiceTrait for CryptoService {
    fn hash_password(&self, password: &str) -> Result<String, CryptoError> {
        let salt = self.generate_salt()?;
        let mut secret = password.as_bytes().to_vec();
        let mut hash = [0u8; HASH_LENGTH];

        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            &salt,
            &secret,
            &mut hash,
        );
        secret.zeroize();

        let encoded = format!(
            "{}${}${}${}",
            HASH_SCHEME,
            self.iterations,
            BASE64.encode(&salt),
            BASE64.encode(hash)
        );
        hash.zeroize();
        Ok(encoded)
    }

    fn verify_password(&self, password: &str, stored: &str) -> Result<bool, CryptoError> {
        let parts: Vec<&str> = stored.split('$').collect();
        if parts.len() != 4 || parts[0] != HASH_SCHEME {
            return Err(CryptoError::InvalidEncoding(
                "Unrecognized password hash format".to_string(),
            ));
        }

        let iterations = parts[1]
            .parse::<u32>()
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| CryptoError::InvalidEncoding("Invalid iteration count".to_string()))?;
        let salt = BASE64
            .decode(parts[2])
            .map_err(|e| CryptoError::InvalidEncoding(format!("Invalid salt: {}", e)))?;
        let hash = BASE64
            .decode(parts[3])
            .map_err(|e| CryptoError::InvalidEncoding(format!("Invalid hash: {}", e)))?;

        let mut secret = password.as_bytes().to_vec();
        let matches = pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            &salt,
            &secret,
            &hash,
        )
        .is_ok();
        secret.zeroize();
        Ok(matches)
    }

    fn generate_salt(&self) -> Result<Vec<u8>, CryptoError> {
        let mut salt = vec![0u8; SALT_LENGTH];
        self.rng
            .fill(&mut salt)
            .map_err(|_| CryptoError::RandomGeneration("Failed to generate salt".to_string()))?;
        Ok(salt)
    }
}
