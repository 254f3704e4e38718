use crate::{AppError, EncryptionService};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One storage bucket as persisted in `s3_buckets`, or carried inline in a config token.
/// Credential fields are field-level envelopes, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct BucketConfig {
    pub id: i64,
    pub name: String,
    pub region: String,
    pub endpoint: String,
    pub access_key_encrypted: String,
    pub secret_key_encrypted: String,
    #[serde(default)]
    pub cdn_url: Option<String>,
}

impl BucketConfig {
    /// Open both credential envelopes. Fails uniformly with `AppError::Decryption`.
    pub fn resolve(&self, encryption: &EncryptionService) -> Result<ResolvedBucket, AppError> {
        Ok(ResolvedBucket {
            id: self.id,
            name: self.name.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            access_key: encryption.decrypt_field(&self.access_key_encrypted)?,
            secret_key: encryption.decrypt_field(&self.secret_key_encrypted)?,
            cdn_url: self.cdn_url.clone(),
        })
    }
}

/// Decrypted bucket configuration. Lives only for a request or a cache entry.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedBucket {
    pub id: i64,
    pub name: String,
    pub region: String,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub cdn_url: Option<String>,
}

impl fmt::Debug for ResolvedBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedBucket")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("cdn_url", &self.cdn_url)
            .finish()
    }
}

impl ResolvedBucket {
    /// Public URL of an object: `<cdnUrl>/<key>` when a CDN is configured, otherwise the
    /// path-style object URL on the bucket endpoint. Buckets without an endpoint live on
    /// AWS and get the virtual-hosted URL.
    pub fn public_url(&self, key: &str) -> String {
        if let Some(cdn) = self.cdn_url.as_deref().filter(|u| !u.is_empty()) {
            return format!("{}/{}", cdn.trim_end_matches('/'), key);
        }
        if self.endpoint.is_empty() {
            return format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.name, self.region, key
            );
        }
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.name,
            key
        )
    }
}
