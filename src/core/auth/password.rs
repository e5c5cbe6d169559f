//! Password hashing and credential material.
//!
//! bcrypt digests with a configurable cost factor, a strength policy that
//! reports every violated rule at once, and the random-token helpers shared
//! by the stored-token repositories.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Default bcrypt cost factor
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum accepted password length
const MIN_PASSWORD_LENGTH: usize = 8;

/// Password hashing errors
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingError(String),
}

/// A single violated strength rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    TooShort,
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
}

impl PasswordRule {
    pub fn message(&self) -> &'static str {
        match self {
            PasswordRule::TooShort => "Password must be at least 8 characters long",
            PasswordRule::MissingUppercase => {
                "Password must contain at least one uppercase letter"
            }
            PasswordRule::MissingLowercase => {
                "Password must contain at least one lowercase letter"
            }
            PasswordRule::MissingDigit => "Password must contain at least one number",
        }
    }
}

impl std::fmt::Display for PasswordRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Password hasher with a fixed cost factor
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

impl PasswordHasher {
    /// Create a hasher with the given bcrypt cost
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Create a hasher from the `BCRYPT_COST` environment variable
    pub fn from_env() -> Self {
        let cost = std::env::var("BCRYPT_COST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_BCRYPT_COST);

        Self::new(cost)
    }

    /// Hash a plaintext password
    pub fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        bcrypt::hash(plain, self.cost).map_err(|e| PasswordError::HashingError(e.to_string()))
    }

    /// Verify a plaintext password against a stored digest.
    /// A malformed digest verifies as false, never as an error.
    pub fn verify(&self, plain: &str, digest: &str) -> bool {
        bcrypt::verify(plain, digest).unwrap_or(false)
    }

    /// Whether a stored digest was produced with a different cost than the
    /// one currently configured. Unparseable digests always need a rehash.
    pub fn needs_rehash(&self, digest: &str) -> bool {
        match digest.split('$').nth(2).and_then(|c| c.parse::<u32>().ok()) {
            Some(cost) => cost != self.cost,
            None => true,
        }
    }

    /// Check a password against the strength policy, returning every
    /// violated rule rather than stopping at the first.
    pub fn validate_strength(password: &str) -> Vec<PasswordRule> {
        let mut violations = Vec::new();

        if password.len() < MIN_PASSWORD_LENGTH {
            violations.push(PasswordRule::TooShort);
        }
        if !password.chars().any(|c| c.is_ascii_uppercase()) {
            violations.push(PasswordRule::MissingUppercase);
        }
        if !password.chars().any(|c| c.is_ascii_lowercase()) {
            violations.push(PasswordRule::MissingLowercase);
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push(PasswordRule::MissingDigit);
        }

        violations
    }
}

/// Generate a cryptographically random token, hex-encoded.
/// The output is twice `byte_length` characters long.
pub fn generate_token(byte_length: usize) -> String {
    let mut bytes = vec![0u8; byte_length];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a token using SHA-256. Stored tokens are looked up by this digest so
/// the raw value never touches the database.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}
