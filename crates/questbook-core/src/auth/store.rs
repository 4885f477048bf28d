use anyhow::{Context, Result};
use async_trait::async_trait;
use keyring::Entry;
use tokio::sync::RwLock;

/// Keychain service name for the Questbook credential
const SERVICE_NAME: &str = "questbook";

/// Account key under which the bearer token is stored.
/// A single key: the app manages exactly one credential per installation.
const TOKEN_ACCOUNT: &str = "session-token";

/// Durable persistence for the bearer credential.
///
/// All three operations are idempotent. `read` on a never-written key returns
/// `None`, not an error, and `clear` on an empty store is a no-op success.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn save(&self, token: &str) -> Result<()>;
    async fn read(&self) -> Result<Option<String>>;
    async fn clear(&self) -> Result<()>;
}

/// Token store backed by the OS keychain.
///
/// Survives process restarts and is inaccessible to other applications,
/// unlike a file in the cache directory.
#[derive(Debug, Default)]
pub struct KeyringTokenStore;

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self
    }

    fn entry() -> Result<Entry> {
        Entry::new(SERVICE_NAME, TOKEN_ACCOUNT).context("Failed to create keyring entry")
    }
}

#[async_trait]
impl TokenStore for KeyringTokenStore {
    async fn save(&self, token: &str) -> Result<()> {
        let entry = Self::entry()?;
        entry
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    async fn read(&self) -> Result<Option<String>> {
        let entry = Self::entry()?;
        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read token from keychain"),
        }
    }

    async fn clear(&self) -> Result<()> {
        let entry = Self::entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

/// In-process token store for tests and ephemeral embeddings.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, token: &str) -> Result<()> {
        *self.token.write().await = Some(token.to_string());
        Ok(())
    }

    async fn read(&self) -> Result<Option<String>> {
        Ok(self.token.read().await.clone())
    }

    async fn clear(&self) -> Result<()> {
        *self.token.write().await = None;
        Ok(())
    }
}
