use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::{
    error::AuthError,
    models::auth::{TokenClaims, TokenPayload, TokenType},
};

/// Signs and verifies HS256 tokens. Agnostic to token class: callers check
/// `token_type` themselves.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn sign(&self, payload: &TokenPayload, ttl_seconds: u64) -> anyhow::Result<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = TokenClaims {
            sub: payload.subject_id.to_string(),
            username: payload.username.clone(),
            role: payload.role,
            token_type: payload.token_type,
            token_id: payload.token_id.to_string(),
            iat: now,
            exp: now + ttl_seconds as usize,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    /// Fails on a bad signature, a malformed token, or once `now >= exp`.
    /// The error names `expected` so the rendered message matches the caller's intent.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(|_| AuthError::InvalidToken(expected))?;

        // jsonwebtoken accepts exp == now; expiry is exclusive here.
        if data.claims.exp <= Utc::now().timestamp() as usize {
            return Err(AuthError::InvalidToken(expected));
        }

        Ok(data.claims)
    }
}

/// Hash stored at rest for the current refresh token.
///
/// SHA-256 rather than bcrypt: bcrypt only reads 72 bytes, and all JWTs for a
/// principal share a longer prefix.
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn refresh_token_matches(token: &str, stored_hash: &str) -> bool {
    let presented = hash_refresh_token(token);
    presented.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::principal::Role;
    use uuid::Uuid;

    fn payload(token_type: TokenType) -> TokenPayload {
        TokenPayload {
            subject_id: Uuid::new_v4(),
            username: "admin".to_string(),
            role: Role::Super,
            token_type,
            token_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn verify_returns_signed_claims() {
        let codec = TokenCodec::new("secret");
        let p = payload(TokenType::Refresh);
        let token = codec.sign(&p, 60).unwrap();

        let claims = codec.verify(&token, TokenType::Refresh).unwrap();
        assert_eq!(claims.sub, p.subject_id.to_string());
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.role, Role::Super);
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert_eq!(claims.token_id, p.token_id.to_string());
        assert_eq!(claims.exp, claims.iat + 60);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = TokenCodec::new("one").sign(&payload(TokenType::Access), 60).unwrap();
        let err = TokenCodec::new("two")
            .verify(&token, TokenType::Access)
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(TokenType::Access)));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let codec = TokenCodec::new("secret");
        let token = codec.sign(&payload(TokenType::Access), 60).unwrap();
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        let forged = TokenCodec::new("attacker")
            .sign(&payload(TokenType::Access), 60)
            .unwrap();
        parts[1] = forged.split('.').nth(1).unwrap().to_string();

        assert!(codec.verify(&parts.join("."), TokenType::Access).is_err());
    }

    #[test]
    fn malformed_token_is_rejected() {
        let codec = TokenCodec::new("secret");
        assert!(codec.verify("not-a-jwt", TokenType::Access).is_err());
        assert!(codec.verify("", TokenType::Access).is_err());
    }

    #[test]
    fn token_is_invalid_at_its_expiry_instant() {
        let codec = TokenCodec::new("secret");
        let token = codec.sign(&payload(TokenType::Access), 0).unwrap();
        assert!(codec.verify(&token, TokenType::Access).is_err());
    }

    #[test]
    fn refresh_hash_comparison() {
        let stored = hash_refresh_token("a.b.c");
        assert_eq!(stored.len(), 64);
        assert!(refresh_token_matches("a.b.c", &stored));
        assert!(!refresh_token_matches("a.b.d", &stored));
        assert!(!refresh_token_matches("a.b.c", "deadbeef"));
    }
}
