//! Client-side credential store
//!
//! The bearer token and claims written on a successful login or enrollment
//! are consumed by every other screen for authorization headers and
//! role-based routing. The store is an injected capability rather than
//! ambient global state, so tests substitute the in-memory variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Credential store errors
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration directory not found")]
    NoConfigDir,
}

/// Result type for credential store operations
pub type CredentialResult<T> = Result<T, CredentialError>;

/// The credential record persisted on a successful login or enrollment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Opaque bearer token sent on every authorized request
    pub auth_token: String,
    /// Role claim used for routing
    pub role: String,
    /// Human-readable account name for display
    pub display_name: String,
    /// When this record was written
    pub saved_at: DateTime<Utc>,
}

impl Credentials {
    pub fn new(
        auth_token: impl Into<String>,
        role: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            auth_token: auth_token.into(),
            role: role.into(),
            display_name: display_name.into(),
            saved_at: Utc::now(),
        }
    }
}

/// Injected persistence capability for the signed-in identity
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the stored credentials, if any
    async fn get(&self) -> Option<Credentials>;

    /// Replace the stored credentials
    async fn set(&self, credentials: Credentials) -> CredentialResult<()>;

    /// Remove the stored credentials (sign out)
    async fn clear(&self) -> CredentialResult<()>;
}

/// File-backed credential store with an in-memory cache
///
/// Persists as JSON under the platform config dir, one record per file.
pub struct FileCredentialStore {
    path: PathBuf,
    cached: Arc<RwLock<Option<Credentials>>>,
}

impl FileCredentialStore {
    /// Open the store at its default path (~/.config/handoff/credentials.json)
    pub fn new() -> CredentialResult<Self> {
        let config_dir = dirs::config_dir().ok_or(CredentialError::NoConfigDir)?;
        Self::with_path(config_dir.join("handoff").join("credentials.json"))
    }

    /// Open the store at a specific path, loading existing data if present
    pub fn with_path(path: PathBuf) -> CredentialResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let cached = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            match serde_json::from_str(&contents) {
                Ok(credentials) => {
                    info!("Loaded credentials from {:?}", path);
                    Some(credentials)
                }
                Err(e) => {
                    warn!("Failed to parse stored credentials, starting fresh: {}", e);
                    None
                }
            }
        } else {
            debug!("No stored credentials at {:?}", path);
            None
        };

        Ok(Self {
            path,
            cached: Arc::new(RwLock::new(cached)),
        })
    }
}

#[async_trait::async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self) -> Option<Credentials> {
        self.cached.read().await.clone()
    }

    async fn set(&self, credentials: Credentials) -> CredentialResult<()> {
        let json = serde_json::to_string_pretty(&credentials)?;
        std::fs::write(&self.path, json)?;
        *self.cached.write().await = Some(credentials);
        info!("Saved credentials to {:?}", self.path);
        Ok(())
    }

    async fn clear(&self) -> CredentialResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        *self.cached.write().await = None;
        info!("Cleared stored credentials");
        Ok(())
    }
}

/// In-memory credential store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryCredentialStore {
    cached: RwLock<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Option<Credentials> {
        self.cached.read().await.clone()
    }

    async fn set(&self, credentials: Credentials) -> CredentialResult<()> {
        *self.cached.write().await = Some(credentials);
        Ok(())
    }

    async fn clear(&self) -> CredentialResult<()> {
        *self.cached.write().await = None;
        Ok(())
    }
}
