//! Core domain logic: authentication, user management, persistence, and the
//! JSON response envelope shared by every endpoint

pub mod auth;
pub mod config;
pub mod db;
pub mod mail;
pub mod response;
pub mod users;
