//! Session coordinator for the Questbook client.
//!
//! Orchestrates the I/O-bearing session operations (restore, login,
//! register, logout, user update) over the pure state machine in
//! `auth::session`. One coordinator instance owns the session for the
//! process; consumers (screens, the navigation guard) receive it by
//! injection rather than through ambient global state.
//!
//! Ordering discipline: network I/O runs outside the write lock so a
//! logout can proceed while a login is in flight, and each operation's
//! terminal section (store write + state transition) runs inside it. The
//! store write always happens before the state machine observes the new
//! token, and a logout epoch makes `Logout` authoritative over a
//! late-arriving login success.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, AuthApi, SessionEvent};
use crate::auth::{KeyringTokenStore, Session, TokenStore, Transition};
use crate::cache::ProfileCache;
use crate::config::Config;
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};

pub struct SessionCoordinator {
    store: Arc<dyn TokenStore>,
    api: Arc<dyn AuthApi>,
    cache: ProfileCache,
    session: RwLock<Session>,
    /// Serializes each operation's terminal store-write + transition section.
    write_lock: Mutex<()>,
    /// Bumped at logout start; a login that began before the bump must not
    /// complete.
    logout_epoch: AtomicU64,
    /// Revocations published by the request pipeline on 401 responses.
    events: Mutex<mpsc::UnboundedReceiver<SessionEvent>>,
}

impl SessionCoordinator {
    /// Production wiring: keychain-backed store and the HTTP pipeline.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let store: Arc<dyn TokenStore> = Arc::new(KeyringTokenStore::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let api = Arc::new(ApiClient::new(config, store.clone(), events_tx)?);
        Ok(Self::with_parts(config, store, api, events_rx))
    }

    /// Assemble a coordinator from injected parts.
    pub fn with_parts(
        config: &Config,
        store: Arc<dyn TokenStore>,
        api: Arc<dyn AuthApi>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> Self {
        Self {
            cache: ProfileCache::new(config, api.clone(), store.clone()),
            store,
            api,
            session: RwLock::new(Session::new()),
            write_lock: Mutex::new(()),
            logout_epoch: AtomicU64::new(0),
            events: Mutex::new(events),
        }
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_authenticated()
    }

    pub async fn is_loading(&self) -> bool {
        self.session.read().await.is_loading()
    }

    pub async fn current_user(&self) -> Option<UserProfile> {
        self.session.read().await.user().cloned()
    }

    /// Next session revocation detected by the transport layer. Returns
    /// `None` once the pipeline side of the channel is gone.
    pub async fn next_session_event(&self) -> Option<SessionEvent> {
        self.events.lock().await.recv().await
    }

    async fn apply(&self, transition: Transition) {
        self.session.write().await.apply(transition);
    }

    /// Resolve the session from the stored credential.
    ///
    /// Any failure to produce a profile discards the stored credential and
    /// resolves to unauthenticated; a stale token never leaves the machine
    /// claiming authenticated.
    pub async fn restore_session(&self) {
        self.apply(Transition::SetLoading(true)).await;

        let token = match self.store.read().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Token store unavailable during restore");
                None
            }
        };

        let Some(token) = token else {
            debug!("No stored credential, starting unauthenticated");
            let _guard = self.write_lock.lock().await;
            self.apply(Transition::Logout).await;
            return;
        };

        match self.cache.fetch_profile().await {
            Ok(user) => {
                let _guard = self.write_lock.lock().await;
                // A logout during the fetch already cleared the store and
                // wins over this restore.
                if matches!(self.store.read().await, Ok(Some(_))) {
                    info!(user_id = user.id, "Session restored");
                    self.apply(Transition::RestoreSession { user, token }).await;
                } else {
                    self.apply(Transition::Logout).await;
                }
            }
            Err(e) => {
                warn!(
                    status = e.status(),
                    error = %e,
                    "Profile fetch failed during restore, discarding stored credential"
                );
                let _guard = self.write_lock.lock().await;
                if let Err(e) = self.store.clear().await {
                    warn!(error = %e, "Failed to clear stored credential");
                }
                self.apply(Transition::Logout).await;
            }
        }
    }

    /// Authenticate against the backend and persist the returned credential.
    ///
    /// On failure the error is returned unchanged for the caller to display
    /// and the session is left unauthenticated, never half-authenticated.
    /// A logout issued while the call was in flight wins: the stale success
    /// is discarded and reported as a client error.
    pub async fn login(&self, credentials: LoginRequest) -> Result<UserProfile, ApiError> {
        self.apply(Transition::SetLoading(true)).await;
        let epoch = self.logout_epoch.load(Ordering::SeqCst);

        match self.api.login(&credentials).await {
            Ok(AuthResponse { user, token }) => {
                let _guard = self.write_lock.lock().await;
                if self.logout_epoch.load(Ordering::SeqCst) != epoch {
                    debug!("Discarding login success that arrived after logout");
                    return Err(ApiError::Client(
                        "Login superseded by logout".to_string(),
                    ));
                }

                // Store write happens before the state machine observes the
                // token; a request issued after the transition reads the
                // fresh credential.
                if let Err(e) = self.store.save(&token).await {
                    warn!(error = %e, "Failed to persist credential");
                    self.apply(Transition::SetLoading(false)).await;
                    return Err(ApiError::Client(format!(
                        "Failed to persist credential: {e}"
                    )));
                }

                self.cache.set(user.clone()).await;
                self.apply(Transition::LoginSuccess {
                    user: user.clone(),
                    token,
                })
                .await;
                info!(user_id = user.id, "Login succeeded");
                Ok(user)
            }
            Err(e) => {
                self.apply(Transition::SetLoading(false)).await;
                Err(e)
            }
        }
    }

    /// Create an account. The session is untouched on either outcome; the
    /// caller decides whether to prompt a login afterwards.
    pub async fn register(&self, credentials: RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.apply(Transition::SetLoading(true)).await;
        let result = self.api.register(&credentials).await;
        self.apply(Transition::SetLoading(false)).await;
        result
    }

    /// End the session. The server notification is best-effort; local
    /// logout succeeds unconditionally so a backend outage can never leave
    /// the device stuck authenticated.
    pub async fn logout(&self) {
        self.apply(Transition::SetLoading(true)).await;
        // Bump first so an in-flight login cannot apply a stale success
        self.logout_epoch.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.api.logout().await {
            warn!(
                status = e.status(),
                error = %e,
                "Logout notification failed, proceeding with local logout"
            );
        }

        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear stored credential during logout");
        }
        self.cache.invalidate().await;
        self.apply(Transition::Logout).await;
        info!("Logged out");
    }

    /// Optimistic local edit of the cached user. No I/O, no loading toggle;
    /// the token and authentication state are untouched.
    pub async fn update_user(&self, user: UserProfile) {
        self.cache.set(user.clone()).await;
        self.apply(Transition::UpdateUser(user)).await;
    }
}
