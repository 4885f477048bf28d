//! Profile caching module.
//!
//! This module provides the `ProfileCache`, a fetch-and-cache layer for the
//! authenticated user's profile. The cached copy is served while fresh and
//! re-fetched with a bounded retry policy on first access or after
//! invalidation. The profile is never persisted to disk.

pub mod profile;

pub use profile::{CachedProfile, ProfileCache};
