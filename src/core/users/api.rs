//! User API endpoints
//!
//! Provides REST API endpoints for user profiles:
//! - GET /api/v1/users/me - Current user's profile
//! - PUT /api/v1/users/me - Update current user's profile
//! - GET /api/v1/users - List users (admin)
//! - GET /api/v1/users/{id} - Get a user by ID (admin)

use axum::{
    Router,
    extract::{Path, Query, State},
    middleware,
    response::Response,
    routing::get,
};
use uuid::Uuid;

use crate::core::auth::api::{ApiJson, ApiState};
use crate::core::auth::middleware::{AccessPolicy, CurrentUser, authenticate, authorize};
use crate::core::auth::service::{AuthError, UpdateProfileRequest};
use crate::core::db::repositories::{
    PasswordResetRepository, RefreshTokenRepository, UserRepository,
};
use crate::core::response;

/// Pagination query parameters. Values are coerced the way form inputs
/// usually are; junk falls back to the defaults.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ListUsersQuery {
    page: Option<String>,
    per_page: Option<String>,
}

impl ListUsersQuery {
    fn page(&self) -> i64 {
        parse_param(self.page.as_deref(), 1)
    }

    fn per_page(&self) -> i64 {
        parse_param(self.per_page.as_deref(), 20)
    }
}

fn parse_param(value: Option<&str>, default: i64) -> i64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Create the user API router
pub fn users_api_router<U, R, P>(state: ApiState<U, R, P>) -> Router
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    let admin = Router::new()
        .route("/api/v1/users", get(list_users_handler))
        .route("/api/v1/users/{id}", get(get_user_handler))
        .route_layer(middleware::from_fn_with_state(
            AccessPolicy::require_role("admin"),
            authorize,
        ));

    // authenticate is layered after the merge so it wraps the admin routes
    // too and runs before their authorize check
    Router::new()
        .route("/api/v1/users/me", get(me_handler).put(update_me_handler))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            authenticate,
        ))
        .with_state(state)
}

/// GET /api/v1/users/me
/// Fetch the authenticated user's profile
async fn me_handler<U, R, P>(
    State(state): State<ApiState<U, R, P>>,
    user: CurrentUser,
) -> Result<Response, AuthError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    let profile = state.auth.get_user(user.user_id).await?;

    Ok(response::success(profile))
}

/// PUT /api/v1/users/me
/// Update the authenticated user's profile
async fn update_me_handler<U, R, P>(
    State(state): State<ApiState<U, R, P>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<Response, AuthError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    let profile = state.auth.update_profile(user.user_id, request).await?;

    tracing::info!("Profile updated for user: {}", user.user_id);

    Ok(response::success(profile))
}

/// GET /api/v1/users
/// List users, newest first (admin only)
async fn list_users_handler<U, R, P>(
    State(state): State<ApiState<U, R, P>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Response, AuthError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    let (users, pagination) = state.auth.list_users(query.page(), query.per_page()).await?;

    Ok(response::success_paginated(users, pagination))
}

/// GET /api/v1/users/{id}
/// Fetch a user by ID (admin only)
async fn get_user_handler<U, R, P>(
    State(state): State<ApiState<U, R, P>>,
    Path(id): Path<String>,
) -> Result<Response, AuthError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    P: PasswordResetRepository,
{
    // Malformed IDs look the same as missing ones to the caller
    let user_id =
        Uuid::parse_str(&id).map_err(|_| AuthError::NotFound("User not found".to_string()))?;

    let user = state.auth.get_user(user_id).await?;

    Ok(response::success(user))
}

#[cfg(test)]
mod tests {
    use axum::http::Uri;

    use super::*;

    // ========================================================================
    // Query Parameter Tests
    // ========================================================================

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param(Some("5"), 1), 5);
        assert_eq!(parse_param(Some("abc"), 1), 1);
        assert_eq!(parse_param(Some(""), 20), 20);
        assert_eq!(parse_param(None, 20), 20);
    }

    #[test]
    fn test_list_users_query_defaults() {
        let uri: Uri = "/api/v1/users".parse().unwrap();
        let Query(query) = Query::<ListUsersQuery>::try_from_uri(&uri).unwrap();

        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), 20);
    }

    #[test]
    fn test_list_users_query_values() {
        let uri: Uri = "/api/v1/users?page=3&per_page=50".parse().unwrap();
        let Query(query) = Query::<ListUsersQuery>::try_from_uri(&uri).unwrap();

        assert_eq!(query.page(), 3);
        assert_eq!(query.per_page(), 50);
    }

    #[test]
    fn test_list_users_query_tolerates_junk() {
        let uri: Uri = "/api/v1/users?page=abc&per_page=-nope".parse().unwrap();
        let Query(query) = Query::<ListUsersQuery>::try_from_uri(&uri).unwrap();

        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), 20);
    }
}
