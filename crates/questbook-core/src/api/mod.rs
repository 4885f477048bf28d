//! REST API client module for the Questbook backend.
//!
//! This module provides the request pipeline every outbound call rides:
//! the stored bearer credential is attached when present, and every failure
//! is normalized into `ApiError` regardless of transport failure mode.
//!
//! A 401 response revokes the local credential before the error surfaces,
//! and the revocation is published as a `SessionEvent` so the coordinator
//! can observe it.

pub mod client;
pub mod error;

pub use client::{ApiClient, AuthApi, SessionEvent};
pub use error::ApiError;
