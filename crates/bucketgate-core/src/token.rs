//! Transport envelope for bearer payloads (access claims, inline bucket configs).
//!
//! Two modes are supported:
//! - `local`: the payload is encrypted and authenticated with a shared 32-byte key.
//!   Token format is `v1.local.<base64url(nonce || ciphertext)>`, with the header bound
//!   as associated data.
//! - `public`: the payload is signed only (EdDSA JWS) and verified with a public key.
//!
//! Verification never hands back a partial payload. Callers branch on [`TokenOutcome`].

use crate::AppError;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::str::FromStr;

const LOCAL_HEADER: &str = "v1.local.";
const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMode {
    Local,
    Public,
}

impl FromStr for TokenMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(TokenMode::Local),
            "public" => Ok(TokenMode::Public),
            other => Err(AppError::Configuration(format!(
                "TOKEN_MODE must be 'local' or 'public', got '{}'",
                other
            ))),
        }
    }
}

/// Why a token was rejected. Only ever logged; clients see one generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFailure {
    Malformed,
    Rejected,
    Expired,
    InvalidPayload,
}

impl fmt::Display for TokenFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            TokenFailure::Malformed => "malformed token",
            TokenFailure::Rejected => "signature or ciphertext rejected",
            TokenFailure::Expired => "token expired",
            TokenFailure::InvalidPayload => "payload has unexpected shape",
        };
        f.write_str(reason)
    }
}

#[derive(Debug)]
pub enum TokenOutcome<T> {
    Authenticated(T),
    Failed(TokenFailure),
}

impl<T> TokenOutcome<T> {
    /// Collapse into the uniform `Unauthorized` error used at the HTTP edge.
    pub fn into_result(self) -> Result<T, AppError> {
        match self {
            TokenOutcome::Authenticated(payload) => Ok(payload),
            TokenOutcome::Failed(reason) => Err(AppError::Unauthorized(reason.to_string())),
        }
    }
}

enum TokenKey {
    Local(Aes256Gcm),
    Public(Box<DecodingKey>),
}

#[derive(Clone)]
pub struct TokenService {
    key: std::sync::Arc<TokenKey>,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn local_from_key_bytes(key_bytes: &[u8]) -> Result<Self, AppError> {
        if key_bytes.len() != 32 {
            return Err(AppError::Configuration(format!(
                "Local token key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes));
        Ok(Self {
            key: std::sync::Arc::new(TokenKey::Local(cipher)),
        })
    }

    pub fn local_from_base64(encoded: &str) -> Result<Self, AppError> {
        let key_bytes = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::Configuration(format!("Failed to decode token key: {}", e)))?;
        Self::local_from_key_bytes(&key_bytes)
    }

    /// Ed25519 public key in PEM (`-----BEGIN PUBLIC KEY-----`).
    pub fn public_from_pem(pem: &str) -> Result<Self, AppError> {
        let key = DecodingKey::from_ed_pem(pem.as_bytes()).map_err(|e| {
            AppError::Configuration(format!("Invalid token public key PEM: {}", e))
        })?;
        Ok(Self {
            key: std::sync::Arc::new(TokenKey::Public(Box::new(key))),
        })
    }

    pub fn mode(&self) -> TokenMode {
        match self.key.as_ref() {
            TokenKey::Local(_) => TokenMode::Local,
            TokenKey::Public(_) => TokenMode::Public,
        }
    }

    /// Seal a payload as a local token. Include an `exp` field (Unix seconds) to bound it.
    pub fn seal_local<T: Serialize>(&self, payload: &T) -> Result<String, AppError> {
        let TokenKey::Local(cipher) = self.key.as_ref() else {
            return Err(AppError::Configuration(
                "Tokens can only be sealed in local mode".to_string(),
            ));
        };

        let plaintext = serde_json::to_vec(payload)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: &plaintext,
                    aad: LOCAL_HEADER.as_bytes(),
                },
            )
            .map_err(|e| AppError::Internal(format!("Token encryption failed: {}", e)))?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(format!(
            "{}{}",
            LOCAL_HEADER,
            general_purpose::URL_SAFE_NO_PAD.encode(combined)
        ))
    }

    pub fn verify_or_decrypt<T: DeserializeOwned>(&self, token: &str) -> TokenOutcome<T> {
        let claims = match self.key.as_ref() {
            TokenKey::Local(cipher) => open_local(cipher, token.trim()),
            TokenKey::Public(key) => verify_public(key, token.trim()),
        };

        match claims.and_then(|value| {
            serde_json::from_value::<T>(value).map_err(|_| TokenFailure::InvalidPayload)
        }) {
            Ok(payload) => TokenOutcome::Authenticated(payload),
            Err(reason) => TokenOutcome::Failed(reason),
        }
    }
}

fn open_local(cipher: &Aes256Gcm, token: &str) -> Result<serde_json::Value, TokenFailure> {
    let body = token
        .strip_prefix(LOCAL_HEADER)
        .ok_or(TokenFailure::Malformed)?;
    let combined = general_purpose::URL_SAFE_NO_PAD
        .decode(body)
        .map_err(|_| TokenFailure::Malformed)?;
    if combined.len() <= NONCE_LEN {
        return Err(TokenFailure::Malformed);
    }

    let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: LOCAL_HEADER.as_bytes(),
            },
        )
        .map_err(|_| TokenFailure::Rejected)?;

    let value: serde_json::Value =
        serde_json::from_slice(&plaintext).map_err(|_| TokenFailure::InvalidPayload)?;
    check_expiry(&value)?;
    Ok(value)
}

fn check_expiry(value: &serde_json::Value) -> Result<(), TokenFailure> {
    match value.get("exp") {
        None | Some(serde_json::Value::Null) => Ok(()),
        Some(exp) => {
            let exp = exp.as_i64().ok_or(TokenFailure::InvalidPayload)?;
            if exp <= chrono::Utc::now().timestamp() {
                Err(TokenFailure::Expired)
            } else {
                Ok(())
            }
        }
    }
}

fn verify_public(key: &DecodingKey, token: &str) -> Result<serde_json::Value, TokenFailure> {
    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.required_spec_claims.clear();
    validation.validate_aud = false;
    validation.leeway = 0;

    jsonwebtoken::decode::<serde_json::Value>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenFailure::Expired,
            ErrorKind::InvalidSignature => TokenFailure::Rejected,
            _ => TokenFailure::Malformed,
        })
}
