//! Request gating middleware
//!
//! `authenticate` turns a bearer access token into a [`CurrentUser`] request
//! extension; `authorize` checks that extension against an [`AccessPolicy`].
//! Handlers receive the authenticated identity through the `CurrentUser`
//! extractor.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::core::auth::jwt::JwtService;
use crate::core::response;

/// Identity attached to a request after successful authentication
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: uuid::Uuid,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl CurrentUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p.eq_ignore_ascii_case(permission))
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| response::unauthorized("Authentication required"))
    }
}

/// Role and permission requirements for a route group. Within each list any
/// match passes; a populated list of each kind must be satisfied.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    roles: Vec<String>,
    permissions: Vec<String>,
}

impl AccessPolicy {
    pub fn require_role(role: impl Into<String>) -> Self {
        Self::require_any_role([role])
    }

    pub fn require_any_role<I, T>(roles: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            roles: roles
                .into_iter()
                .map(|r| r.into().to_ascii_lowercase())
                .collect(),
            permissions: Vec::new(),
        }
    }

    pub fn require_permission(permission: impl Into<String>) -> Self {
        Self::default().and_any_permission([permission])
    }

    /// Add a permission requirement on top of an existing role requirement
    pub fn and_any_permission<I, T>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.permissions.extend(
            permissions
                .into_iter()
                .map(|p| p.into().to_ascii_lowercase()),
        );
        self
    }

    /// Check a user against this policy
    pub fn allows(&self, user: &CurrentUser) -> bool {
        let roles_ok = self.roles.is_empty() || self.roles.iter().any(|r| user.has_role(r));
        let permissions_ok = self.permissions.is_empty()
            || self.permissions.iter().any(|p| user.has_permission(p));

        roles_ok && permissions_ok
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header. The error
/// carries the client-facing message.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err("Authorization header missing");
    };

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or("Invalid authorization header format")
}

/// Authentication middleware. Rejects the request unless it carries a valid
/// access token, and stores the token's identity as a request extension.
pub async fn authenticate(
    State(jwt): State<JwtService>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(request.headers()) {
        Ok(token) => token.to_string(),
        Err(message) => return response::unauthorized(message),
    };

    let claims = match jwt.validate_token(&token) {
        Ok(claims) => claims,
        Err(_) => return response::unauthorized("Invalid or expired token"),
    };

    // Refresh and verification tokens must never pass as credentials
    if !claims.is_access_token() {
        return response::unauthorized("Invalid token type");
    }

    let Ok(user_id) = claims.user_id() else {
        return response::unauthorized("Invalid or expired token");
    };

    request.extensions_mut().insert(CurrentUser {
        user_id,
        email: claims.email,
        roles: claims.roles,
        permissions: claims.permissions,
    });

    next.run(request).await
}

/// Authorization middleware. Runs after `authenticate` and checks the
/// attached identity against the policy configured for the route group.
pub async fn authorize(
    State(policy): State<AccessPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let Some(user) = request.extensions().get::<CurrentUser>() else {
        return response::unauthorized("Authentication required");
    };

    if !policy.allows(user) {
        return response::forbidden("You do not have access to this resource");
    }

    next.run(request).await
}
