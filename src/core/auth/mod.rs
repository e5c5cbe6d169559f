//! Authentication module for Gatekey
//!
//! This module provides authentication functionality including:
//! - Password hashing and strength policy
//! - JWT token generation and validation
//! - Login, registration, and refresh token rotation
//! - Password reset and email verification flows
//! - Request gating middleware and REST API endpoints

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

pub use api::{ApiJson, ApiState, auth_api_router};
pub use jwt::{Claims, JwtConfig, JwtError, JwtService, TokenPair, TokenType};
pub use middleware::{AccessPolicy, CurrentUser, authenticate, authorize, bearer_token};
pub use password::{PasswordError, PasswordHasher, PasswordRule, generate_token, hash_token};
pub use service::{
    AuthError, AuthService, AuthSettings, ChangePasswordRequest, ForgotPasswordRequest,
    ForgotPasswordResponse, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest,
    RegisterResponse, ResetPasswordRequest, TokenResponse, UpdateProfileRequest,
    VerifyEmailRequest,
};
