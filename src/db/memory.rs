use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::credentials::CredentialStore;
use crate::models::principal::Principal;

/// In-process store with the same row semantics as the Postgres one.
#[derive(Default)]
pub struct MemoryCredentialStore {
    rows: RwLock<HashMap<Uuid, Principal>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, principal: Principal) {
        self.rows.write().await.insert(principal.id, principal);
    }

    pub async fn remove(&self, id: Uuid) -> Option<Principal> {
        self.rows.write().await.remove(&id)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<Principal>> {
        let rows = self.rows.read().await;
        Ok(rows.values().find(|p| p.username == username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Principal>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        if let Some(row) = self.rows.write().await.get_mut(&id) {
            row.password_hash = password_hash.to_string();
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> anyhow::Result<u64> {
        match self.rows.write().await.get_mut(&id) {
            Some(row) => {
                row.refresh_token_hash = hash.map(String::from);
                row.updated_at = Utc::now();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn swap_refresh_token_hash(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> anyhow::Result<bool> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id) {
            Some(row) if row.refresh_token_hash.as_deref() == Some(expected) => {
                row.refresh_token_hash = Some(next.to_string());
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
