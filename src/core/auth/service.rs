//! Authentication service
//!
//! Provides business logic for registration, login, token refresh, logout,
//! password reset, and email verification. Coordinates the repositories,
//! the password hasher, the JWT service, and the outbound mailer.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::core::auth::jwt::{JwtError, JwtService};
use crate::core::auth::password::{self, PasswordError, PasswordHasher};
use crate::core::config::AppConfig;
use crate::core::db::models::{CreateUser, UpdateProfile, User, UserResponse};
use crate::core::db::repositories::{
    PasswordResetRepository, PasswordResetRepositoryError, RefreshTokenRepository,
    RefreshTokenRepositoryError, UserRepository, UserRepositoryError,
};
use crate::core::mail::Mailer;
use crate::core::response::{Pagination, ValidationErrors};

/// Message returned by the forgot-password flow whether or not the account
/// exists, so responses cannot be used to enumerate registered emails.
const FORGOT_PASSWORD_MESSAGE: &str = "If the account exists, a reset link has been generated.";

/// Authentication service error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Field-level input failures, rejected before any side effect
    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Email already registered")]
    EmailExists,

    /// Authentication failure with a flow-specific message
    #[error("{0}")]
    Unauthorized(String),

    #[error("You do not have access to this resource")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    /// Mail delivery failure; the state change it was reporting on has
    /// already been committed
    #[error("{0}")]
    MailSend(String),

    /// Internal failure. The payload is for the log, never the client.
    #[error("Something went wrong")]
    Internal(String),
}

impl From<UserRepositoryError> for AuthError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => AuthError::NotFound("User not found".to_string()),
            UserRepositoryError::EmailAlreadyExists => AuthError::EmailExists,
            UserRepositoryError::DatabaseError(e) => AuthError::Internal(e.to_string()),
        }
    }
}

impl From<RefreshTokenRepositoryError> for AuthError {
    fn from(err: RefreshTokenRepositoryError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<PasswordResetRepositoryError> for AuthError {
    fn from(err: PasswordResetRepositoryError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

// Token generation failures are internal; verification failures are handled
// at the call sites that know the flow-specific message.
impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

/// Registration request data
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// Login request data
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Refresh and logout request data
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Forgot-password request data
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Reset-password request data
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub confirm_password: Option<String>,
}

/// Change-password request data
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: Option<String>,
}

/// Email verification request data
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// Profile update request data. Absent fields keep their current values.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

/// Registration response payload
#[derive(Debug, Clone, serde::Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub message: String,
    pub verification_email_sent: bool,
}

/// Token payload returned by login and refresh
#[derive(Debug, Clone, serde::Serialize)]
pub struct TokenResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Plain message payload
#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Forgot-password response payload. The token fields are only populated
/// outside production.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ForgotPasswordResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

/// Knobs the auth flows read from application configuration
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub default_user_role: String,
    pub password_reset_expiry_secs: i64,
    pub expose_reset_tokens: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            default_user_role: "subscriber".to_string(),
            password_reset_expiry_secs: 3600,
            expose_reset_tokens: false,
        }
    }
}

impl From<&AppConfig> for AuthSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_user_role: config.default_user_role.clone(),
            password_reset_expiry_secs: config.password_reset_expiry_secs,
            expose_reset_tokens: config.expose_reset_tokens(),
        }
    }
}

/// Basic structural email check: local@domain with a dotted domain
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }

    domain.contains('.') && !domain.split('.').any(|part| part.is_empty())
}

/// Authentication service
pub struct AuthService<U, R, P>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    users: Arc<U>,
    refresh_tokens: Arc<R>,
    reset_tokens: Arc<P>,
    mailer: Arc<dyn Mailer>,
    jwt: JwtService,
    hasher: PasswordHasher,
    settings: AuthSettings,
}

impl<U, R, P> AuthService<U, R, P>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    /// Create a new authentication service with injected dependencies
    pub fn new(
        users: Arc<U>,
        refresh_tokens: Arc<R>,
        reset_tokens: Arc<P>,
        mailer: Arc<dyn Mailer>,
        jwt: JwtService,
        hasher: PasswordHasher,
        settings: AuthSettings,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            reset_tokens,
            mailer,
            jwt,
            hasher,
            settings,
        }
    }

    /// The JWT service backing this instance, for request-gating middleware
    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Register a new user
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, AuthError> {
        // Validate input
        let mut errors = ValidationErrors::new();
        if request.email.is_empty() {
            errors.add("email", "Email is required");
        } else if !is_valid_email(&request.email) {
            errors.add("email", "Invalid email format");
        }
        if request.password.is_empty() {
            errors.add("password", "Password is required");
        }
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }

        // Check if email already exists
        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(AuthError::EmailExists);
        }

        // Validate password strength
        let violations = PasswordHasher::validate_strength(&request.password);
        if !violations.is_empty() {
            let mut errors = ValidationErrors::new();
            errors.add_list(
                "password",
                violations.iter().map(|v| v.message().to_string()).collect(),
            );
            return Err(AuthError::Validation(errors));
        }

        // Create user with the default role
        let password_hash = self.hasher.hash(&request.password)?;
        let user = self
            .users
            .create(&CreateUser {
                email: request.email,
                password_hash,
                first_name: request.first_name,
                last_name: request.last_name,
                phone: request.phone,
                roles: vec![self.settings.default_user_role.clone()],
            })
            .await?;

        // Verification email failure must not block registration
        let verification_email_sent = match self.send_verification_email(&user).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(user_id = %user.id, error = %err, "verification email not sent");
                false
            }
        };

        Ok(RegisterResponse {
            user: user.into(),
            message: "Registration successful. Please verify your email.".to_string(),
            verification_email_sent,
        })
    }

    /// Login an existing user
    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse, AuthError> {
        if request.email.is_empty() || request.password.is_empty() {
            return Err(AuthError::Validation(ValidationErrors::single(
                "email",
                "Email and password are required",
            )));
        }

        // Unknown email and wrong password produce the same error
        let user = self
            .users
            .find_by_email(&request.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.hasher.verify(&request.password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        self.users.update_last_login(user.id).await?;

        let (response, _) = self.issue_tokens(&user).await?;
        Ok(response)
    }

    /// Rotate a refresh token: issue a new pair, then revoke the old token
    /// recording its successor
    pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenResponse, AuthError> {
        if request.refresh_token.is_empty() {
            return Err(AuthError::Validation(ValidationErrors::single(
                "refresh_token",
                "Refresh token is required",
            )));
        }

        // Signature, expiry, and token type are all checked here
        if self.jwt.validate_refresh_token(&request.refresh_token).is_err() {
            return Err(AuthError::Unauthorized("Invalid refresh token".to_string()));
        }

        let stored = self
            .refresh_tokens
            .find_by_token(&request.refresh_token)
            .await?
            .filter(|token| token.is_active())
            .ok_or_else(|| {
                AuthError::Unauthorized("Refresh token expired or revoked".to_string())
            })?;

        let user = self
            .users
            .find_by_id(stored.user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| AuthError::Unauthorized("User not found or inactive".to_string()))?;

        let (response, new_session_id) = self.issue_tokens(&user).await?;

        // First-writer-wins: a lost race means a concurrent refresh already
        // rotated this token. The pair issued above is still valid.
        let rotated = self
            .refresh_tokens
            .revoke(stored.id, Some(new_session_id))
            .await?;
        if !rotated {
            tracing::warn!(token_id = %stored.id, "refresh token already rotated concurrently");
        }

        Ok(response)
    }

    /// Revoke a refresh token. Unknown tokens are ignored so logout is
    /// idempotent.
    pub async fn logout(&self, request: RefreshRequest) -> Result<MessageResponse, AuthError> {
        if request.refresh_token.is_empty() {
            return Err(AuthError::Validation(ValidationErrors::single(
                "refresh_token",
                "Refresh token is required",
            )));
        }

        if let Some(stored) = self
            .refresh_tokens
            .find_by_token(&request.refresh_token)
            .await?
        {
            self.refresh_tokens.revoke(stored.id, None).await?;
        }

        Ok(MessageResponse::new("Logged out successfully"))
    }

    /// Revoke every active session for a user
    pub async fn logout_all(&self, user_id: Uuid) -> Result<MessageResponse, AuthError> {
        let revoked = self.refresh_tokens.revoke_all_for_user(user_id).await?;
        if revoked > 0 {
            tracing::debug!(user_id = %user_id, revoked, "revoked active refresh sessions");
        }

        Ok(MessageResponse::new("Logged out from all devices"))
    }

    /// Initiate the password reset flow
    pub async fn forgot_password(
        &self,
        request: ForgotPasswordRequest,
    ) -> Result<ForgotPasswordResponse, AuthError> {
        let email = request.email.trim();

        if email.is_empty() {
            return Err(AuthError::Validation(ValidationErrors::single(
                "email",
                "Email is required",
            )));
        }
        if !is_valid_email(email) {
            return Err(AuthError::Validation(ValidationErrors::single(
                "email",
                "Invalid email format",
            )));
        }

        // Unknown accounts get the same response with no side effects
        let Some(user) = self.users.find_by_email(email).await? else {
            return Ok(ForgotPasswordResponse {
                message: FORGOT_PASSWORD_MESSAGE.to_string(),
                reset_token: None,
                expires_in: None,
            });
        };

        let token = password::generate_token(16);
        let expires_at = Utc::now() + Duration::seconds(self.settings.password_reset_expiry_secs);
        self.reset_tokens.create(user.id, &token, expires_at).await?;

        let swept = self.reset_tokens.sweep_expired().await?;
        if swept > 0 {
            tracing::debug!(swept, "cleaned up dead password reset tokens");
        }

        // The reset record is already committed; a failed send reports
        // MAIL_SEND_FAILED without undoing it
        if let Err(err) = self
            .mailer
            .send_password_reset(&user.email, &token, Some(&user.full_name()))
            .await
        {
            tracing::error!(user_id = %user.id, error = %err, "password reset email failed");
            return Err(AuthError::MailSend(
                "Unable to send password reset email".to_string(),
            ));
        }

        let expose = self.settings.expose_reset_tokens;
        Ok(ForgotPasswordResponse {
            message: FORGOT_PASSWORD_MESSAGE.to_string(),
            reset_token: expose.then_some(token),
            expires_in: expose.then_some(self.settings.password_reset_expiry_secs),
        })
    }

    /// Complete the password reset flow with a single-use token
    pub async fn reset_password(
        &self,
        request: ResetPasswordRequest,
    ) -> Result<MessageResponse, AuthError> {
        if request.token.is_empty() {
            return Err(AuthError::Validation(ValidationErrors::single(
                "token",
                "Reset token is required",
            )));
        }

        let confirm = request
            .confirm_password
            .as_deref()
            .unwrap_or(&request.password);
        if request.password != confirm {
            return Err(AuthError::Validation(ValidationErrors::single(
                "confirm_password",
                "Passwords do not match",
            )));
        }

        let violations = PasswordHasher::validate_strength(&request.password);
        if !violations.is_empty() {
            let mut errors = ValidationErrors::new();
            errors.add_list(
                "password",
                violations.iter().map(|v| v.message().to_string()).collect(),
            );
            return Err(AuthError::Validation(errors));
        }

        // Only unused, unexpired tokens are returned
        let record = self
            .reset_tokens
            .find_valid(&request.token)
            .await?
            .ok_or_else(|| {
                AuthError::Unauthorized("Invalid or expired reset token".to_string())
            })?;

        let user = self
            .users
            .find_by_id(record.user_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized("User no longer exists".to_string()))?;

        let hashed = self.hasher.hash(&request.password)?;
        self.users.update_password(user.id, &hashed).await?;

        let consumed = self.reset_tokens.mark_used(record.id).await?;
        if !consumed {
            tracing::warn!(token_id = %record.id, "reset token consumed concurrently");
        }

        // Force re-login everywhere
        self.refresh_tokens.revoke_all_for_user(user.id).await?;

        Ok(MessageResponse::new("Password has been reset successfully"))
    }

    /// Change the password of an authenticated user
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<MessageResponse, AuthError> {
        let confirm = request
            .confirm_password
            .as_deref()
            .unwrap_or(&request.new_password);

        // Collect all field errors in one pass
        let mut errors = ValidationErrors::new();
        if request.current_password.is_empty() {
            errors.add("current_password", "Current password is required");
        }
        if request.new_password.is_empty() {
            errors.add("new_password", "New password is required");
        } else {
            let violations = PasswordHasher::validate_strength(&request.new_password);
            if !violations.is_empty() {
                errors.add_list(
                    "new_password",
                    violations.iter().map(|v| v.message().to_string()).collect(),
                );
            }
        }
        if request.new_password != confirm {
            errors.add("confirm_password", "Passwords do not match");
        }
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized("User not found".to_string()))?;

        if !self
            .hasher
            .verify(&request.current_password, &user.password_hash)
        {
            return Err(AuthError::Validation(ValidationErrors::single(
                "current_password",
                "Current password is incorrect",
            )));
        }

        if request.current_password == request.new_password {
            return Err(AuthError::Validation(ValidationErrors::single(
                "new_password",
                "New password must be different from current password",
            )));
        }

        let hashed = self.hasher.hash(&request.new_password)?;
        self.users.update_password(user.id, &hashed).await?;

        // Force re-login everywhere
        self.refresh_tokens.revoke_all_for_user(user.id).await?;

        Ok(MessageResponse::new("Password changed successfully"))
    }

    /// Verify an email address using a verification token
    pub async fn verify_email(
        &self,
        request: VerifyEmailRequest,
    ) -> Result<MessageResponse, AuthError> {
        if request.token.is_empty() {
            return Err(AuthError::Validation(ValidationErrors::single(
                "token",
                "Verification token is required",
            )));
        }

        let Ok(claims) = self.jwt.validate_verification_token(&request.token) else {
            return Err(AuthError::Unauthorized(
                "Invalid or expired verification token".to_string(),
            ));
        };

        let user = match claims.user_id() {
            Ok(user_id) => self.users.find_by_id(user_id).await?,
            Err(_) => None,
        }
        .ok_or_else(|| AuthError::Unauthorized("User not found".to_string()))?;

        // The token is bound to the address it was issued for
        let claim_email = claims.email.as_deref().unwrap_or("");
        if !user.email.eq_ignore_ascii_case(claim_email) {
            return Err(AuthError::Unauthorized(
                "Token does not match this user".to_string(),
            ));
        }

        if user.email_verified {
            return Ok(MessageResponse::new("Email already verified"));
        }

        self.users.mark_email_verified(user.id).await?;

        Ok(MessageResponse::new("Email verified successfully"))
    }

    /// Resend the verification email for an authenticated user
    pub async fn resend_verification(&self, user_id: Uuid) -> Result<MessageResponse, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized("Authentication required".to_string()))?;

        if user.email_verified {
            return Ok(MessageResponse::new("Email already verified"));
        }

        self.send_verification_email(&user).await?;

        Ok(MessageResponse::new("Verification email sent successfully"))
    }

    /// Fetch a user's profile
    pub async fn get_user(&self, user_id: Uuid) -> Result<UserResponse, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

        Ok(user.into())
    }

    /// Update a user's profile. Changing the email address resets its
    /// verification state and triggers a new verification email.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserResponse, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

        let new_email = request
            .email
            .as_deref()
            .map(str::trim)
            .map(str::to_string)
            .unwrap_or_else(|| user.email.clone());
        let email_changed = !new_email.eq_ignore_ascii_case(&user.email);

        if email_changed {
            if new_email.is_empty() || !is_valid_email(&new_email) {
                return Err(AuthError::Validation(ValidationErrors::single(
                    "email",
                    "Valid email is required",
                )));
            }
            if let Some(existing) = self.users.find_by_email(&new_email).await?
                && existing.id != user.id
            {
                return Err(AuthError::Validation(ValidationErrors::single(
                    "email",
                    "This email is already in use",
                )));
            }
        }

        let changes = UpdateProfile {
            email: if email_changed {
                new_email
            } else {
                user.email.clone()
            },
            first_name: request.first_name.or(user.first_name),
            last_name: request.last_name.or(user.last_name),
            phone: request.phone.or(user.phone),
            avatar_url: request.avatar_url.or(user.avatar_url),
            email_verified: if email_changed {
                false
            } else {
                user.email_verified
            },
            email_verified_at: if email_changed {
                None
            } else {
                user.email_verified_at
            },
        };

        let updated = self.users.update_profile(user.id, &changes).await?;

        // Best effort: the profile change already succeeded
        if email_changed
            && let Err(err) = self.send_verification_email(&updated).await
        {
            tracing::error!(user_id = %updated.id, error = %err, "verification email after profile update failed");
        }

        Ok(updated.into())
    }

    /// List users, newest first, with pagination metadata
    pub async fn list_users(
        &self,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<UserResponse>, Pagination), AuthError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);
        let offset = (page - 1) * per_page;

        let users = self.users.list(per_page, offset).await?;
        let total = self.users.count().await?;

        let responses = users.into_iter().map(UserResponse::from).collect();
        Ok((responses, Pagination::new(total, page, per_page)))
    }

    /// Issue an access/refresh pair for a user and persist the refresh
    /// session, returning its row ID for rotation bookkeeping
    async fn issue_tokens(&self, user: &User) -> Result<(TokenResponse, Uuid), AuthError> {
        let pair = self
            .jwt
            .generate_token_pair(user.id, &user.email, &user.roles, &user.permissions)?;

        // The stored session expires exactly when the refresh JWT does
        let expires_at = DateTime::from_timestamp(pair.refresh_expires_at, 0)
            .unwrap_or_else(|| Utc::now() + Duration::seconds(self.jwt.refresh_token_ttl_secs()));
        let session = self
            .refresh_tokens
            .create(user.id, &pair.refresh_token, expires_at)
            .await?;

        let response = TokenResponse {
            user: user.clone().into(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type,
            expires_in: self.jwt.access_token_ttl_secs(),
        };

        Ok((response, session.id))
    }

    async fn send_verification_email(&self, user: &User) -> Result<(), AuthError> {
        let token = self.jwt.generate_verification_token(user.id, &user.email)?;

        self.mailer
            .send_email_verification(&user.email, &token, Some(&user.full_name()))
            .await
            .map_err(|err| {
                tracing::error!(user_id = %user.id, error = %err, "verification email failed");
                AuthError::MailSend("Unable to send verification email".to_string())
            })
    }
}
