//! HTTP pipeline for the Questbook REST API.
//!
//! Every outbound request reads the stored credential immediately before
//! send, so a token persisted by one operation is visible to the next
//! request without any client-side mutation. Failures are normalized into
//! `ApiError` in `check_response` / the `From<reqwest::Error>` impl.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::auth::TokenStore;
use crate::config::Config;
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};

use super::ApiError;

/// Emitted when the transport layer detects server-side session
/// invalidation and revokes the local credential.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Revoked { status: u16 },
}

/// Authentication endpoints of the Questbook backend.
///
/// The coordinator depends on this trait rather than on `ApiClient` so it
/// can be driven by a scripted double in tests.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ApiError>;
    async fn register(&self, credentials: &RegisterRequest) -> Result<AuthResponse, ApiError>;
    async fn fetch_profile(&self) -> Result<UserProfile, ApiError>;
    async fn logout(&self) -> Result<(), ApiError>;
}

/// API client for the Questbook backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl ApiClient {
    /// Create a new API client reading its credential from `store` and
    /// publishing revocations on `events`.
    pub fn new(
        config: &Config,
        store: Arc<dyn TokenStore>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            store,
            events,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Read the stored credential for this request. Storage failures do not
    /// block the request; a call that needed the credential fails at the
    /// server with a 401 and is handled uniformly there.
    async fn bearer_token(&self) -> Option<String> {
        match self.store.read().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Token store read failed, sending request without credential");
                None
            }
        }
    }

    /// Attach the credential, send, and normalize the failure path.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let request = match self.bearer_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        self.check_response(response).await
    }

    /// Check if the response is successful, normalizing it into `ApiError`
    /// if not. A 401 revokes the stored credential before the error is
    /// returned, so the next store read observes an absent token.
    async fn check_response(&self, response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            self.revoke_session(status.as_u16()).await;
        }
        Err(ApiError::from_status(status, &body))
    }

    async fn revoke_session(&self, status: u16) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear token after unauthorized response");
        }
        debug!(status, "Server invalidated the session, local credential revoked");
        // Nobody listening is fine; the store is already cleared.
        let _ = self.events.send(SessionEvent::Revoked { status });
    }

    /// GET `path` and parse the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.client.get(self.url(path))).await?;
        Ok(response.json().await?)
    }

    /// POST `body` to `path` and parse the JSON response.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send(self.client.post(self.url(path)).json(body)).await?;
        Ok(response.json().await?)
    }

    /// POST `body` to `path`, ignoring the response body.
    pub async fn post_no_content<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        self.send(self.client.post(self.url(path)).json(body)).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.post("/auth/login", credentials).await
    }

    async fn register(&self, credentials: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.post("/auth/register", credentials).await
    }

    async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        self.get("/auth/profile").await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.post_no_content("/auth/logout", &serde_json::json!({})).await
    }
}
