use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::api::{ApiError, AuthApi};
use crate::auth::TokenStore;
use crate::config::Config;
use crate::models::UserProfile;

/// A cached profile together with the instant it was fetched.
#[derive(Debug, Clone)]
pub struct CachedProfile {
    pub profile: UserProfile,
    pub cached_at: DateTime<Utc>,
}

impl CachedProfile {
    fn new(profile: UserProfile) -> Self {
        Self {
            profile,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }
}

/// Fetch-and-cache layer for the authenticated user's profile.
///
/// A fetch is only attempted when a credential is present. Transient
/// failures are retried up to the configured bound with exponential
/// backoff; 401/403 mean the session itself is invalid and propagate
/// immediately so the coordinator can terminate it.
pub struct ProfileCache {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn TokenStore>,
    entry: RwLock<Option<CachedProfile>>,
    stale_minutes: i64,
    retry_limit: u32,
    retry_backoff_ms: u64,
}

impl ProfileCache {
    pub fn new(config: &Config, api: Arc<dyn AuthApi>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            api,
            store,
            entry: RwLock::new(None),
            stale_minutes: config.profile_stale_minutes,
            retry_limit: config.profile_retry_limit,
            retry_backoff_ms: config.profile_retry_backoff_ms,
        }
    }

    fn is_fresh(&self, entry: &CachedProfile) -> bool {
        entry.age_minutes() <= self.stale_minutes
    }

    /// The cached profile, if present and fresh.
    pub async fn cached(&self) -> Option<UserProfile> {
        let entry = self.entry.read().await;
        entry
            .as_ref()
            .filter(|cached| self.is_fresh(cached))
            .map(|cached| cached.profile.clone())
    }

    /// Fetch the authenticated user's profile, serving the cached copy while
    /// fresh.
    pub async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        if let Some(profile) = self.cached().await {
            debug!(user_id = profile.id, "Serving cached profile");
            return Ok(profile);
        }

        match self.store.read().await {
            Ok(None) => return Err(ApiError::unauthenticated()),
            Ok(Some(_)) => {}
            // Fail open: let the server decide whether the credential exists
            Err(e) => warn!(error = %e, "Token store read failed, attempting profile fetch anyway"),
        }

        let profile = self.fetch_with_retry().await?;
        *self.entry.write().await = Some(CachedProfile::new(profile.clone()));
        Ok(profile)
    }

    async fn fetch_with_retry(&self) -> Result<UserProfile, ApiError> {
        let mut attempts = 0;
        let mut backoff_ms = self.retry_backoff_ms;

        loop {
            match self.api.fetch_profile().await {
                Ok(profile) => return Ok(profile),
                Err(e) if e.is_auth_error() => {
                    // The session is invalid, not the network; retrying
                    // cannot help and delays the logout
                    return Err(e);
                }
                Err(e) => {
                    attempts += 1;
                    if attempts > self.retry_limit {
                        return Err(e);
                    }
                    warn!(
                        error = %e,
                        attempt = attempts,
                        backoff_ms,
                        "Profile fetch failed, backing off"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    /// Replace the cached copy (optimistic local edit).
    pub async fn set(&self, profile: UserProfile) {
        *self.entry.write().await = Some(CachedProfile::new(profile));
    }

    /// Drop the cached copy; the next fetch goes to the network.
    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use crate::models::{AuthResponse, LoginRequest, RegisterRequest};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    fn profile(id: i64) -> UserProfile {
        UserProfile {
            id,
            username: format!("user{}", id),
            name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            avatar_url: None,
            points: None,
            created_at: None,
        }
    }

    fn server_error() -> ApiError {
        ApiError::Status {
            status: 500,
            message: "boom".to_string(),
            field_errors: None,
        }
    }

    /// Pops programmed profile results in order; counts calls.
    struct ScriptedProfileApi {
        results: Mutex<VecDeque<Result<UserProfile, ApiError>>>,
        calls: AtomicU32,
    }

    impl ScriptedProfileApi {
        fn new(results: Vec<Result<UserProfile, ApiError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthApi for ScriptedProfileApi {
        async fn login(&self, _credentials: &LoginRequest) -> Result<AuthResponse, ApiError> {
            unimplemented!("not used by cache tests")
        }

        async fn register(&self, _credentials: &RegisterRequest) -> Result<AuthResponse, ApiError> {
            unimplemented!("not used by cache tests")
        }

        async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .await
                .pop_front()
                .expect("Profile fetch called more times than scripted")
        }

        async fn logout(&self) -> Result<(), ApiError> {
            unimplemented!("not used by cache tests")
        }
    }

    fn test_config() -> Config {
        Config {
            profile_retry_limit: 3,
            profile_retry_backoff_ms: 1,
            ..Config::default()
        }
    }

    async fn cache_with(
        results: Vec<Result<UserProfile, ApiError>>,
        token: Option<&str>,
    ) -> (ProfileCache, Arc<ScriptedProfileApi>) {
        let api = Arc::new(ScriptedProfileApi::new(results));
        let store = Arc::new(MemoryTokenStore::new());
        if let Some(token) = token {
            store.save(token).await.expect("Failed to seed token");
        }
        (ProfileCache::new(&test_config(), api.clone(), store), api)
    }

    #[tokio::test]
    async fn fetch_is_gated_on_token_presence() {
        let (cache, api) = cache_with(vec![], None).await;
        let err = cache.fetch_profile().await.expect_err("Expected auth error");
        assert_eq!(err.status(), 401);
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn first_fetch_hits_network_then_serves_cache() {
        let (cache, api) = cache_with(vec![Ok(profile(1))], Some("abc")).await;
        assert_eq!(cache.fetch_profile().await.expect("fetch failed").id, 1);
        // Second call is served from cache; the scripted queue is empty
        assert_eq!(cache.fetch_profile().await.expect("fetch failed").id, 1);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_a_refetch() {
        let (cache, api) = cache_with(vec![Ok(profile(1)), Ok(profile(1))], Some("abc")).await;
        cache.fetch_profile().await.expect("fetch failed");
        cache.invalidate().await;
        cache.fetch_profile().await.expect("fetch failed");
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn transient_failures_retry_up_to_the_bound() {
        let (cache, api) = cache_with(
            vec![
                Err(server_error()),
                Err(server_error()),
                Err(server_error()),
                Err(server_error()),
            ],
            Some("abc"),
        )
        .await;

        let err = cache.fetch_profile().await.expect_err("Expected failure");
        assert_eq!(err.status(), 500);
        // Initial attempt plus profile_retry_limit retries
        assert_eq!(api.calls(), 4);
    }

    #[tokio::test]
    async fn retry_stops_early_on_success() {
        let (cache, api) =
            cache_with(vec![Err(server_error()), Ok(profile(1))], Some("abc")).await;
        assert_eq!(cache.fetch_profile().await.expect("fetch failed").id, 1);
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn unauthorized_is_never_retried() {
        let (cache, api) = cache_with(
            vec![Err(ApiError::Status {
                status: 401,
                message: "Session expired".to_string(),
                field_errors: None,
            })],
            Some("stale"),
        )
        .await;

        let err = cache.fetch_profile().await.expect_err("Expected auth error");
        assert_eq!(err.status(), 401);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn forbidden_is_never_retried() {
        let (cache, api) = cache_with(
            vec![Err(ApiError::Status {
                status: 403,
                message: "No access".to_string(),
                field_errors: None,
            })],
            Some("abc"),
        )
        .await;

        let err = cache.fetch_profile().await.expect_err("Expected auth error");
        assert_eq!(err.status(), 403);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn network_failures_are_retried() {
        let (cache, api) =
            cache_with(vec![Err(ApiError::Network), Ok(profile(1))], Some("abc")).await;
        assert!(cache.fetch_profile().await.is_ok());
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn set_replaces_the_cached_copy() {
        let (cache, api) = cache_with(vec![], Some("abc")).await;
        let mut edited = profile(1);
        edited.name = "Edited".to_string();
        cache.set(edited).await;

        let cached = cache.fetch_profile().await.expect("fetch failed");
        assert_eq!(cached.name, "Edited");
        assert_eq!(api.calls(), 0);
    }
}
