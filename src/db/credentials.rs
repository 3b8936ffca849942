use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::principal::Principal;

/// Persistence for principals and their current refresh-token hash.
///
/// Only the session service writes through this trait.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<Principal>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Principal>>;

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;

    /// Unconditional write. Returns the number of rows touched (0 when the
    /// principal is gone), never a not-found error.
    async fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> anyhow::Result<u64>;

    /// Row-level compare-and-swap: writes `next` only if the stored hash is
    /// still `expected`. Returns whether the write happened.
    async fn swap_refresh_token_hash(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> anyhow::Result<bool>;

    async fn ping(&self) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PRINCIPAL_COLUMNS: &str =
    "id, username, password_hash, refresh_token_hash, role, created_at, updated_at";

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<Principal>> {
        let principal = sqlx::query_as::<_, Principal>(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM admins WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(principal)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Principal>> {
        let principal = sqlx::query_as::<_, Principal>(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM admins WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(principal)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE admins SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE admins SET refresh_token_hash = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn swap_refresh_token_hash(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE admins SET refresh_token_hash = $1, updated_at = NOW()
             WHERE id = $2 AND refresh_token_hash = $3",
        )
        .bind(next)
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
