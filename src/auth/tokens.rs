//! Signed bearer tokens
//!
//! A token is `hex(claims_json).hex(hmac_sha256(claims_json))`. Access and
//! refresh tokens share the format and are told apart by the `kind` claim,
//! so a refresh token is never accepted where an access token is expected.

use super::{decode_hex, encode_hex, HmacSha256};
use crate::config::AuthConfig;
use crate::error::{AuzolanError, Result};
use chrono::{Duration, Utc};
use hmac::Mac;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub kind: TokenKind,
    /// Expiry, unix seconds
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.secret,
            Duration::minutes(config.access_ttl_minutes),
            Duration::hours(config.refresh_ttl_hours),
        )
    }

    pub fn issue(&self, user_id: i64, kind: TokenKind) -> Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user_id,
            kind,
            exp: (Utc::now() + ttl).timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
        };
        self.encode(&claims)
    }

    pub fn issue_pair(&self, user_id: i64) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenKind::Access)?,
            refresh: self.issue(user_id, TokenKind::Refresh)?,
        })
    }

    pub fn encode(&self, claims: &Claims) -> Result<String> {
        let payload = serde_json::to_vec(claims)?;
        let signature = self.sign(&payload)?;
        Ok(format!("{}.{}", encode_hex(&payload), encode_hex(&signature)))
    }

    /// Verify signature, kind and expiry
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims> {
        let invalid = || AuzolanError::InvalidToken("Token is invalid or expired".to_string());

        let (payload_hex, signature_hex) = token.split_once('.').ok_or_else(invalid)?;
        let payload = decode_hex(payload_hex).ok_or_else(invalid)?;
        let signature = decode_hex(signature_hex).ok_or_else(invalid)?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| invalid())?;
        if claims.kind != expected {
            return Err(AuzolanError::InvalidToken(
                "Token has wrong type".to_string(),
            ));
        }
        if claims.exp <= Utc::now().timestamp() {
            return Err(invalid());
        }

        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuzolanError::Other(format!("Invalid HMAC key: {}", e)))
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
