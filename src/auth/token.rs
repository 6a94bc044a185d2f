use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Unix seconds.
    pub exp: i64,
    pub typ: TokenType,
    pub jti: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("expected a {expected:?} token")]
    WrongType { expected: TokenType },

    #[error("token payload carries no id")]
    MissingSubject,
}

/// Signing keys and lifetimes for access and refresh credentials.
#[derive(Clone)]
pub struct TokenKeys {
    access_secret: Arc<[u8]>,
    refresh_secret: Arc<[u8]>,
    access_ttl: time::Duration,
    refresh_ttl: time::Duration,
}

impl TokenKeys {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: time::Duration,
        refresh_ttl: time::Duration,
    ) -> Self {
        TokenKeys {
            access_secret: Arc::from(access_secret.as_bytes()),
            refresh_secret: Arc::from(refresh_secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    fn secret(&self, typ: TokenType) -> &[u8] {
        match typ {
            TokenType::Access => &self.access_secret,
            TokenType::Refresh => &self.refresh_secret,
        }
    }

    pub fn issue_access(&self, id: &str, role: Option<&str>) -> Result<String, TokenError> {
        self.issue(id, role, TokenType::Access, self.access_ttl)
    }

    pub fn issue_refresh(&self, id: &str, role: Option<&str>) -> Result<String, TokenError> {
        self.issue(id, role, TokenType::Refresh, self.refresh_ttl)
    }

    fn issue(&self, id: &str, role: Option<&str>, typ: TokenType, ttl: time::Duration) -> Result<String, TokenError> {
        let claims = Claims {
            id: Some(id.to_owned()),
            role: role.map(str::to_owned),
            exp: (time::OffsetDateTime::now_utc() + ttl).unix_timestamp(),
            typ,
            jti: format!("{:016x}", rand::random::<u64>()),
        };
        self.sign(&claims)
    }

    /// Signs arbitrary claims with the secret for `claims.typ`.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let payload = serde_json::to_vec(claims).map_err(|_| TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD.encode(payload);

        let mut mac = HmacSha256::new_from_slice(self.secret(claims.typ)).map_err(|_| TokenError::Malformed)?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    /// Checks signature, expiry and type, in that order, then requires a subject.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let (payload, signature) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| TokenError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(self.secret(expected)).map_err(|_| TokenError::Malformed)?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.exp <= time::OffsetDateTime::now_utc().unix_timestamp() {
            return Err(TokenError::Expired);
        }
        if claims.typ != expected {
            return Err(TokenError::WrongType { expected });
        }
        if claims.id.as_deref().is_none_or(|id| id.trim().is_empty()) {
            return Err(TokenError::MissingSubject);
        }
        Ok(claims)
    }
}
