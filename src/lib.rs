//! Gatekey - Session and identity service
//!
//! A JWT-backed authentication API over PostgreSQL: registration with email
//! verification, login, refresh token rotation with revocation chains,
//! password reset, and role/permission request gating.

pub mod core;
