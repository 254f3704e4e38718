//! Helpers shared by the `bucketgate` operator commands.

use bucketgate_core::models::{AccessClaims, BucketConfig};
use bucketgate_core::{AppError, EncryptionService};
use bucketgate_db::NewBucket;
use chrono::{DateTime, Utc};

/// Plaintext bucket settings as typed by the operator.
#[derive(Debug, Clone)]
pub struct BucketArgs {
    pub name: String,
    pub region: String,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub cdn_url: Option<String>,
}

impl BucketArgs {
    /// Seal both credentials for storage in `s3_buckets`.
    pub fn seal(self, encryption: &EncryptionService) -> Result<NewBucket, AppError> {
        Ok(NewBucket {
            access_key_encrypted: encryption.encrypt_field(&self.access_key)?,
            secret_key_encrypted: encryption.encrypt_field(&self.secret_key)?,
            name: self.name,
            region: self.region,
            endpoint: self.endpoint,
            cdn_url: self.cdn_url.filter(|u| !u.trim().is_empty()),
        })
    }

    /// Sealed bucket config suitable for an inline config token.
    pub fn into_config(
        self,
        id: i64,
        encryption: &EncryptionService,
    ) -> Result<BucketConfig, AppError> {
        let sealed = self.seal(encryption)?;
        Ok(BucketConfig {
            id,
            name: sealed.name,
            region: sealed.region,
            endpoint: sealed.endpoint,
            access_key_encrypted: sealed.access_key_encrypted,
            secret_key_encrypted: sealed.secret_key_encrypted,
            cdn_url: sealed.cdn_url,
        })
    }
}

/// Access claims for `bucket_id`, expiring `ttl_secs` after `now` when given.
pub fn access_claims(bucket_id: i64, ttl_secs: Option<u64>, now: DateTime<Utc>) -> AccessClaims {
    AccessClaims {
        bucket_id,
        exp: ttl_secs.map(|ttl| now.timestamp().saturating_add(ttl.min(i64::MAX as u64) as i64)),
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn encryption() -> EncryptionService {
        EncryptionService::from_key_bytes(&[7u8; 32]).unwrap()
    }

    fn args() -> BucketArgs {
        BucketArgs {
            name: "media".to_string(),
            region: "eu-west-1".to_string(),
            endpoint: String::new(),
            access_key: "AKIDEXAMPLE".to_string(),
            secret_key: "wJalrXUtnFEMI".to_string(),
            cdn_url: Some("  ".to_string()),
        }
    }

    #[test]
    fn seal_encrypts_credentials() {
        let encryption = encryption();
        let sealed = args().seal(&encryption).unwrap();

        assert_ne!(sealed.access_key_encrypted, "AKIDEXAMPLE");
        assert_eq!(
            encryption.decrypt_field(&sealed.access_key_encrypted).unwrap(),
            "AKIDEXAMPLE"
        );
        assert_eq!(
            encryption.decrypt_field(&sealed.secret_key_encrypted).unwrap(),
            "wJalrXUtnFEMI"
        );
        assert_eq!(sealed.cdn_url, None);
    }

    #[test]
    fn config_resolves_with_same_key() {
        let encryption = encryption();
        let config = args().into_config(42, &encryption).unwrap();
        assert_eq!(config.id, 42);

        let resolved = config.resolve(&encryption).unwrap();
        assert_eq!(resolved.access_key, "AKIDEXAMPLE");
        assert_eq!(resolved.name, "media");
    }

    #[test]
    fn access_claims_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(access_claims(3, None, now).exp, None);
        assert_eq!(
            access_claims(3, Some(3600), now).exp,
            Some(now.timestamp() + 3600)
        );
    }
}
