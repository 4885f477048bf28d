//! Data models for the Questbook API.
//!
//! This module contains the data structures exchanged with the Questbook
//! backend:
//!
//! - `UserProfile`: the authenticated user's account record
//! - `LoginRequest`, `RegisterRequest`: credential payloads
//! - `AuthResponse`: the `{user, token}` envelope returned by the
//!   authentication endpoints

pub mod auth;
pub mod user;

pub use auth::{AuthResponse, LoginRequest, RegisterRequest};
pub use user::UserProfile;
