//! User management module
//!
//! Profile endpoints for the authenticated user and admin-only listing and
//! lookup of accounts. All routes require a valid access token.

pub mod api;

pub use api::users_api_router;
