use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::CredentialStore,
    error::AuthError,
    models::{
        auth::{TokenPair, TokenPayload, TokenType},
        principal::Principal,
    },
    services::{
        password::{check_password, hash_password, PasswordCheck},
        token::{hash_refresh_token, refresh_token_matches, TokenCodec},
    },
};

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub access_ttl_seconds: u64,
    pub refresh_ttl_days: u64,
    pub bcrypt_cost: u32,
}

impl SessionSettings {
    fn refresh_ttl_seconds(&self) -> u64 {
        self.refresh_ttl_days * 86400
    }
}

/// Issues, rotates and revokes token pairs against the credential store.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
    settings: SessionSettings,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        codec: Arc<TokenCodec>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            codec,
            settings,
        }
    }

    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AuthError> {
        let principal = self
            .store
            .find_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        match check_password(password, &principal.password_hash) {
            PasswordCheck::Valid => {}
            PasswordCheck::LegacyPlaintext => {
                let hash = hash_password(password, self.settings.bcrypt_cost)?;
                self.store.update_password_hash(principal.id, &hash).await?;
                tracing::info!(principal_id = %principal.id, "migrated legacy plaintext password");
            }
            PasswordCheck::Invalid => return Err(AuthError::InvalidCredentials),
        }

        let pair = self.issue_pair(&principal)?;
        self.store
            .set_refresh_token_hash(principal.id, Some(&hash_refresh_token(&pair.refresh_token)))
            .await?;

        tracing::info!(principal_id = %principal.id, username = %principal.username, "login succeeded");
        Ok(pair)
    }

    /// Rotate: the presented refresh token is spent and a new pair is issued.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let invalid = || AuthError::InvalidToken(TokenType::Refresh);

        let claims = self.codec.verify(refresh_token, TokenType::Refresh)?;
        if claims.token_type != TokenType::Refresh {
            return Err(invalid());
        }
        let subject_id: Uuid = claims.sub.parse().map_err(|_| invalid())?;

        let principal = self
            .store
            .find_by_id(subject_id)
            .await?
            .ok_or_else(invalid)?;
        let stored_hash = principal.refresh_token_hash.clone().ok_or_else(invalid)?;

        if !refresh_token_matches(refresh_token, &stored_hash) {
            tracing::warn!(principal_id = %principal.id, token_id = %claims.token_id, "refresh token reuse detected");
            return Err(AuthError::RefreshReuseDetected);
        }

        let pair = self.issue_pair(&principal)?;
        let swapped = self
            .store
            .swap_refresh_token_hash(
                principal.id,
                &stored_hash,
                &hash_refresh_token(&pair.refresh_token),
            )
            .await?;

        // Another refresh with the same token committed first.
        if !swapped {
            tracing::warn!(principal_id = %principal.id, token_id = %claims.token_id, "lost refresh rotation race");
            return Err(AuthError::RefreshReuseDetected);
        }

        tracing::info!(principal_id = %principal.id, "refresh token rotated");
        Ok(pair)
    }

    /// Revoke the outstanding refresh token. Idempotent: a missing principal is not an error.
    pub async fn logout(&self, principal_id: Uuid) -> Result<(), AuthError> {
        let affected = self.store.set_refresh_token_hash(principal_id, None).await?;
        tracing::info!(principal_id = %principal_id, affected, "logged out");
        Ok(())
    }

    fn issue_pair(&self, principal: &Principal) -> anyhow::Result<TokenPair> {
        let payload = |token_type| TokenPayload {
            subject_id: principal.id,
            username: principal.username.clone(),
            role: principal.role(),
            token_type,
            token_id: Uuid::new_v4(),
        };

        let access_token = self
            .codec
            .sign(&payload(TokenType::Access), self.settings.access_ttl_seconds)?;
        let refresh_token = self.codec.sign(
            &payload(TokenType::Refresh),
            self.settings.refresh_ttl_seconds(),
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}
