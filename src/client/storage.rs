use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::ClientError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSet {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub csrf_token: Option<String>,
}

/// On-disk shape; older clients only wrote `token`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTokens {
    access_token: Option<String>,
    token: Option<String>,
    refresh_token: Option<String>,
    csrf_token: Option<String>,
}

impl<'de> Deserialize<'de> for TokenSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let stored = StoredTokens::deserialize(deserializer)?;
        Ok(TokenSet {
            access_token: stored.access_token.or(stored.token),
            refresh_token: stored.refresh_token,
            csrf_token: stored.csrf_token,
        })
    }
}

#[async_trait]
pub trait TokenStorage: Send + Sync {
    async fn load(&self) -> Result<TokenSet, ClientError>;

    async fn save(&self, tokens: &TokenSet) -> Result<(), ClientError>;

    async fn clear(&self) -> Result<(), ClientError>;
}

#[derive(Default)]
pub struct MemoryTokenStorage {
    tokens: RwLock<TokenSet>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenSet) -> Self {
        Self {
            tokens: RwLock::new(tokens),
        }
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn load(&self) -> Result<TokenSet, ClientError> {
        Ok(self.tokens.read().await.clone())
    }

    async fn save(&self, tokens: &TokenSet) -> Result<(), ClientError> {
        *self.tokens.write().await = tokens.clone();
        Ok(())
    }

    async fn clear(&self) -> Result<(), ClientError> {
        *self.tokens.write().await = TokenSet::default();
        Ok(())
    }
}

/// JSON file that survives process restarts. A missing file is an empty set.
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn load(&self) -> Result<TokenSet, ClientError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ClientError::Storage(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TokenSet::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, tokens: &TokenSet) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(tokens)
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), ClientError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
