//! Auth API endpoints
//!
//! Provides REST API endpoints for authentication:
//! - POST /api/v1/auth/register - Register a new user
//! - POST /api/v1/auth/login - Login and get tokens
//! - POST /api/v1/auth/refresh - Rotate a refresh token
//! - POST /api/v1/auth/logout - Logout (revoke refresh token)
//! - POST /api/v1/auth/forgot-password - Request a password reset
//! - POST /api/v1/auth/reset-password - Complete a password reset
//! - POST /api/v1/auth/verify-email - Verify an email address
//! - POST /api/v1/auth/logout-all - Logout everywhere (authenticated)
//! - POST /api/v1/auth/change-password - Change password (authenticated)
//! - POST /api/v1/auth/resend-verification - Resend verification (authenticated)

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequest, Request, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::post,
};

use crate::core::auth::jwt::JwtService;
use crate::core::auth::middleware::{CurrentUser, authenticate};
use crate::core::auth::service::{
    AuthError, AuthService, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
    RefreshRequest, RegisterRequest, ResetPasswordRequest, VerifyEmailRequest,
};
use crate::core::db::repositories::{
    PasswordResetRepository, RefreshTokenRepository, UserRepository,
};
use crate::core::response;

/// Shared state for the authenticated API surface
pub struct ApiState<U, R, P>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    pub auth: Arc<AuthService<U, R, P>>,
    pub jwt: JwtService,
}

impl<U, R, P> Clone for ApiState<U, R, P>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
            jwt: self.jwt.clone(),
        }
    }
}

impl<U, R, P> ApiState<U, R, P>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    pub fn new(auth: Arc<AuthService<U, R, P>>) -> Self {
        let jwt = auth.jwt().clone();
        Self { auth, jwt }
    }
}

/// JSON body extractor that reports malformed payloads inside the standard
/// error envelope instead of the default plain-text rejection
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(_) => Err(response::error(
                StatusCode::BAD_REQUEST,
                "INVALID_JSON",
                "Invalid JSON payload",
            )),
        }
    }
}

/// Convert AuthError to an envelope error response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = self.to_string();

        match self {
            AuthError::Validation(errors) => response::validation_error(errors),
            AuthError::InvalidCredentials => {
                response::error(StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", &message)
            }
            AuthError::AccountInactive => {
                response::error(StatusCode::FORBIDDEN, "ACCOUNT_INACTIVE", &message)
            }
            AuthError::EmailExists => {
                response::error(StatusCode::CONFLICT, "EMAIL_EXISTS", &message)
            }
            AuthError::Unauthorized(_) => response::unauthorized(&message),
            AuthError::Forbidden => response::forbidden(&message),
            AuthError::NotFound(_) => response::not_found(&message),
            AuthError::MailSend(_) => response::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "MAIL_SEND_FAILED",
                &message,
            ),
            AuthError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed with internal error");
                response::error(StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR", &message)
            }
        }
    }
}

/// Create the auth API router
pub fn auth_api_router<U, R, P>(state: ApiState<U, R, P>) -> Router
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    let authenticated = Router::new()
        .route("/api/v1/auth/logout-all", post(logout_all_handler))
        .route(
            "/api/v1/auth/change-password",
            post(change_password_handler),
        )
        .route(
            "/api/v1/auth/resend-verification",
            post(resend_verification_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            authenticate,
        ));

    Router::new()
        .route("/api/v1/auth/register", post(register_handler))
        .route("/api/v1/auth/login", post(login_handler))
        .route("/api/v1/auth/refresh", post(refresh_handler))
        .route("/api/v1/auth/logout", post(logout_handler))
        .route("/api/v1/auth/forgot-password", post(forgot_password_handler))
        .route("/api/v1/auth/reset-password", post(reset_password_handler))
        .route("/api/v1/auth/verify-email", post(verify_email_handler))
        .merge(authenticated)
        .with_state(state)
}

/// POST /api/v1/auth/register
/// Register a new user
async fn register_handler<U, R, P>(
    State(state): State<ApiState<U, R, P>>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<Response, AuthError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    tracing::info!("Registration attempt for email: {}", request.email);

    let result = state.auth.register(request).await?;

    tracing::info!("User registered successfully: {}", result.user.email);

    Ok(response::created(result))
}

/// POST /api/v1/auth/login
/// Login and get access/refresh tokens
async fn login_handler<U, R, P>(
    State(state): State<ApiState<U, R, P>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Response, AuthError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    tracing::info!("Login attempt for email: {}", request.email);

    let result = state.auth.login(request).await?;

    tracing::info!("User logged in successfully: {}", result.user.email);

    Ok(response::success(result))
}

/// POST /api/v1/auth/refresh
/// Rotate a refresh token into a new token pair
async fn refresh_handler<U, R, P>(
    State(state): State<ApiState<U, R, P>>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<Response, AuthError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    tracing::debug!("Token refresh request");

    let result = state.auth.refresh(request).await?;

    Ok(response::success(result))
}

/// POST /api/v1/auth/logout
/// Logout and revoke the refresh token
async fn logout_handler<U, R, P>(
    State(state): State<ApiState<U, R, P>>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<Response, AuthError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    tracing::info!("Logout request");

    let result = state.auth.logout(request).await?;

    Ok(response::success(result))
}

/// POST /api/v1/auth/forgot-password
/// Request a password reset token
async fn forgot_password_handler<U, R, P>(
    State(state): State<ApiState<U, R, P>>,
    ApiJson(request): ApiJson<ForgotPasswordRequest>,
) -> Result<Response, AuthError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    tracing::info!("Password reset requested");

    let result = state.auth.forgot_password(request).await?;

    Ok(response::success(result))
}

/// POST /api/v1/auth/reset-password
/// Complete a password reset with a single-use token
async fn reset_password_handler<U, R, P>(
    State(state): State<ApiState<U, R, P>>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> Result<Response, AuthError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    tracing::info!("Password reset submission");

    let result = state.auth.reset_password(request).await?;

    Ok(response::success(result))
}

/// POST /api/v1/auth/verify-email
/// Verify an email address with a verification token
async fn verify_email_handler<U, R, P>(
    State(state): State<ApiState<U, R, P>>,
    ApiJson(request): ApiJson<VerifyEmailRequest>,
) -> Result<Response, AuthError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    let result = state.auth.verify_email(request).await?;

    Ok(response::success(result))
}

/// POST /api/v1/auth/logout-all
/// Revoke every active session for the authenticated user
async fn logout_all_handler<U, R, P>(
    State(state): State<ApiState<U, R, P>>,
    user: CurrentUser,
) -> Result<Response, AuthError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    let result = state.auth.logout_all(user.user_id).await?;

    tracing::info!("All sessions revoked for user: {}", user.user_id);

    Ok(response::success(result))
}

/// POST /api/v1/auth/change-password
/// Change password for the authenticated user
async fn change_password_handler<U, R, P>(
    State(state): State<ApiState<U, R, P>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Response, AuthError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    let result = state.auth.change_password(user.user_id, request).await?;

    tracing::info!("Password changed for user: {}", user.user_id);

    Ok(response::success(result))
}

/// POST /api/v1/auth/resend-verification
/// Resend the verification email for the authenticated user
async fn resend_verification_handler<U, R, P>(
    State(state): State<ApiState<U, R, P>>,
    user: CurrentUser,
) -> Result<Response, AuthError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    let result = state.auth.resend_verification(user.user_id).await?;

    Ok(response::success(result))
}
