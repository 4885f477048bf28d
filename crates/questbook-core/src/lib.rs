//! Core library for Questbook - session and authentication lifecycle
//! management for the Questbook mobile client.
//!
//! The UI shells (screens, navigation, animation) live elsewhere; this crate
//! owns the pieces with real invariants:
//!
//! - `auth`: secure credential persistence and the pure session state machine
//! - `api`: the request pipeline with bearer injection and normalized errors
//! - `cache`: the profile fetch-and-cache layer with bounded retry
//! - `coordinator`: the session coordinator exposing login, register,
//!   logout, restore and user update as atomic-feeling operations
//!
//! Business endpoints (habits, packets, quests, events, QR scans, point
//! conversion) ride the same pipeline through `ApiClient::get`/`post` but
//! are owned by their own layers.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod models;

pub use api::{ApiClient, ApiError, AuthApi, SessionEvent};
pub use auth::{
    KeyringTokenStore, MemoryTokenStore, Session, SessionState, TokenStore, Transition,
};
pub use cache::ProfileCache;
pub use config::Config;
pub use coordinator::SessionCoordinator;
pub use models::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};
