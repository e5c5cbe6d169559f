//! JWT issuance and validation.
//!
//! Three token kinds share one codec: short-lived access tokens carrying the
//! caller's roles and permissions, long-lived refresh tokens identified by a
//! random `jti`, and email-verification tokens bound to the address they
//! confirm.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::password;

/// Default access token expiration (15 minutes)
const ACCESS_TOKEN_EXPIRY_SECS: i64 = 900;

/// Default refresh token expiration (7 days)
const REFRESH_TOKEN_EXPIRY_SECS: i64 = 604_800;

/// Default email-verification token expiration (24 hours)
const EMAIL_VERIFICATION_EXPIRY_SECS: i64 = 86_400;

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    pub secret: String,
    /// Signing algorithm (HMAC family only)
    pub algorithm: Algorithm,
    /// Token issuer
    pub issuer: String,
    /// Access token expiration in seconds
    pub access_token_expiry_secs: i64,
    /// Refresh token expiration in seconds
    pub refresh_token_expiry_secs: i64,
    /// Email-verification token expiration in seconds
    pub email_verification_expiry_secs: i64,
}

impl JwtConfig {
    /// Create a new JWT configuration with default expirations
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: Algorithm::HS256,
            issuer: "gatekey".to_string(),
            access_token_expiry_secs: ACCESS_TOKEN_EXPIRY_SECS,
            refresh_token_expiry_secs: REFRESH_TOKEN_EXPIRY_SECS,
            email_verification_expiry_secs: EMAIL_VERIFICATION_EXPIRY_SECS,
        }
    }

    /// Create config from environment variables
    pub fn from_env() -> Result<Self, JwtError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| JwtError::MissingSecret)?;

        let algorithm = match std::env::var("JWT_ALGORITHM") {
            Ok(name) => parse_algorithm(&name)?,
            Err(_) => Algorithm::HS256,
        };

        let issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| "gatekey".to_string());

        let access_exp = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(ACCESS_TOKEN_EXPIRY_SECS);

        let refresh_exp = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(REFRESH_TOKEN_EXPIRY_SECS);

        let verification_exp = std::env::var("JWT_EMAIL_VERIFICATION_EXPIRY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(EMAIL_VERIFICATION_EXPIRY_SECS);

        Ok(Self {
            secret,
            algorithm,
            issuer,
            access_token_expiry_secs: access_exp,
            refresh_token_expiry_secs: refresh_exp,
            email_verification_expiry_secs: verification_exp,
        })
    }

    /// Set the signing algorithm
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set issuer
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set access token expiration
    pub fn access_token_expiry(mut self, secs: i64) -> Self {
        self.access_token_expiry_secs = secs;
        self
    }

    /// Set refresh token expiration
    pub fn refresh_token_expiry(mut self, secs: i64) -> Self {
        self.refresh_token_expiry_secs = secs;
        self
    }

    /// Set email-verification token expiration
    pub fn email_verification_expiry(mut self, secs: i64) -> Self {
        self.email_verification_expiry_secs = secs;
        self
    }
}

/// Parse an algorithm name from configuration. Only the HMAC family is
/// accepted because keys are derived from a shared secret.
fn parse_algorithm(name: &str) -> Result<Algorithm, JwtError> {
    match name.to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(JwtError::UnsupportedAlgorithm(other.to_string())),
    }
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT_SECRET environment variable not set")]
    MissingSecret,

    #[error("Unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token decoding failed: {0}")]
    DecodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid token type")]
    InvalidTokenType,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidToken | ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                JwtError::InvalidToken
            }
            _ => JwtError::DecodingError(err.to_string()),
        }
    }
}

/// Token type enum. The `type` claim is decoded into this closed set so that
/// checking a token's intended use is an exhaustive match, never a string
/// comparison at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
    Verify,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
            TokenType::Verify => write!(f, "verify"),
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer
    pub iss: String,
    /// Subject (user ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// User email (access and verification tokens)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Role names (access tokens)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Permission names (access tokens)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    /// Token type (access, refresh or verify)
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// JWT ID (refresh tokens; random per token)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    /// Check if this is an access token
    pub fn is_access_token(&self) -> bool {
        self.token_type == TokenType::Access
    }

    /// Check if this is a refresh token
    pub fn is_refresh_token(&self) -> bool {
        self.token_type == TokenType::Refresh
    }

    /// Check if this is an email-verification token
    pub fn is_verification_token(&self) -> bool {
        self.token_type == TokenType::Verify
    }

    /// Get user ID as UUID
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }
}

/// Token pair (access + refresh)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token (short-lived)
    pub access_token: String,
    /// Refresh token (long-lived)
    pub refresh_token: String,
    /// Access token expiration (Unix timestamp)
    pub access_expires_at: i64,
    /// Refresh token expiration (Unix timestamp)
    pub refresh_expires_at: i64,
    /// Token type (always "Bearer")
    pub token_type: String,
}

/// JWT service for token operations
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Create a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Create JWT service from environment variables
    pub fn from_env() -> Result<Self, JwtError> {
        let config = JwtConfig::from_env()?;
        Ok(Self::new(config))
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(self.config.algorithm), claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))
    }

    /// Generate an access token carrying the user's roles and permissions
    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        roles: &[String],
        permissions: &[String],
    ) -> Result<(String, i64), JwtError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.access_token_expiry_secs);

        let claims = Claims {
            iss: self.config.issuer.clone(),
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            email: Some(email.to_string()),
            roles: roles.to_vec(),
            permissions: permissions.to_vec(),
            token_type: TokenType::Access,
            jti: None,
        };

        let token = self.encode_claims(&claims)?;

        Ok((token, exp.timestamp()))
    }

    /// Generate a refresh token with a fresh random `jti`
    pub fn generate_refresh_token(&self, user_id: Uuid) -> Result<(String, i64), JwtError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.refresh_token_expiry_secs);

        let claims = Claims {
            iss: self.config.issuer.clone(),
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            email: None,
            roles: Vec::new(),
            permissions: Vec::new(),
            token_type: TokenType::Refresh,
            jti: Some(password::generate_token(16)),
        };

        let token = self.encode_claims(&claims)?;

        Ok((token, exp.timestamp()))
    }

    /// Generate an email-verification token bound to the given address
    pub fn generate_verification_token(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.email_verification_expiry_secs);

        let claims = Claims {
            iss: self.config.issuer.clone(),
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            email: Some(email.to_string()),
            roles: Vec::new(),
            permissions: Vec::new(),
            token_type: TokenType::Verify,
            jti: None,
        };

        self.encode_claims(&claims)
    }

    /// Generate both access and refresh tokens
    pub fn generate_token_pair(
        &self,
        user_id: Uuid,
        email: &str,
        roles: &[String],
        permissions: &[String],
    ) -> Result<TokenPair, JwtError> {
        let (access_token, access_expires_at) =
            self.generate_access_token(user_id, email, roles, permissions)?;
        let (refresh_token, refresh_expires_at) = self.generate_refresh_token(user_id)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
            token_type: "Bearer".to_string(),
        })
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.config.algorithm);
        validation.set_issuer(&[&self.config.issuer]);
        // Set leeway to 0 for strict expiration checking
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }

    /// Validate an access token specifically
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;

        if !claims.is_access_token() {
            return Err(JwtError::InvalidTokenType);
        }

        Ok(claims)
    }

    /// Validate a refresh token specifically
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;

        if !claims.is_refresh_token() {
            return Err(JwtError::InvalidTokenType);
        }

        Ok(claims)
    }

    /// Validate an email-verification token specifically
    pub fn validate_verification_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;

        if !claims.is_verification_token() {
            return Err(JwtError::InvalidTokenType);
        }

        Ok(claims)
    }

    /// Access token lifetime in seconds (the `expires_in` of token responses)
    pub fn access_token_ttl_secs(&self) -> i64 {
        self.config.access_token_expiry_secs
    }

    /// Refresh token lifetime in seconds
    pub fn refresh_token_ttl_secs(&self) -> i64 {
        self.config.refresh_token_expiry_secs
    }
}
