//! Configuration module
//!
//! Configuration is read once at process start. Key material is decoded and checked by
//! `validate()`, so a malformed or wrong-length key stops startup instead of failing
//! individual requests.

use std::env;
use std::fmt;

use crate::constants::{
    DEFAULT_CLIENT_CACHE_SWEEP_SECS, DEFAULT_CLIENT_CACHE_TTL_SECS, DEFAULT_PRESIGN_EXPIRY_SECS,
};
use crate::encryption::EncryptionService;
use crate::error::AppError;
use crate::snowflake::MAX_NODE_ID;
use crate::token::{TokenMode, TokenService};

const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SERVER_PORT: u16 = 3000;
const MAX_UPLOAD_SIZE_BYTES: usize = 100 * 1024 * 1024;

#[derive(Clone)]
pub struct Config {
    server_port: u16,
    environment: String,
    database_url: String,
    db_max_connections: u32,
    db_timeout_seconds: u64,
    field_encryption_key: String,
    token_mode: TokenMode,
    token_local_key: Option<String>,
    token_public_key_pem: Option<String>,
    snowflake_datacenter_id: u8,
    snowflake_worker_id: u8,
    client_cache_ttl_secs: u64,
    client_cache_sweep_secs: u64,
    presign_expiry_secs: u64,
    max_upload_size_bytes: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_port", &self.server_port)
            .field("environment", &self.environment)
            .field("db_max_connections", &self.db_max_connections)
            .field("token_mode", &self.token_mode)
            .field("snowflake_datacenter_id", &self.snowflake_datacenter_id)
            .field("snowflake_worker_id", &self.snowflake_worker_id)
            .field("client_cache_ttl_secs", &self.client_cache_ttl_secs)
            .field("presign_expiry_secs", &self.presign_expiry_secs)
            .finish_non_exhaustive()
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &str,
    default: T,
) -> Result<T, anyhow::Error> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", name)),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (used by tests to avoid env mutation).
    pub fn from_source<F>(get: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = get("ENVIRONMENT")
            .or_else(|| get("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let token_mode = get("TOKEN_MODE")
            .map(|m| m.parse::<TokenMode>())
            .transpose()?
            .unwrap_or(TokenMode::Local);

        let config = Config {
            server_port: parse_or(
                get("SERVER_PORT").or_else(|| get("PORT")),
                "SERVER_PORT",
                SERVER_PORT,
            )?,
            environment,
            database_url: get("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: parse_or(
                get("DB_MAX_CONNECTIONS"),
                "DB_MAX_CONNECTIONS",
                MAX_CONNECTIONS,
            )?,
            db_timeout_seconds: parse_or(
                get("DB_TIMEOUT_SECONDS"),
                "DB_TIMEOUT_SECONDS",
                CONNECTION_TIMEOUT_SECS,
            )?,
            field_encryption_key: get("FIELD_ENCRYPTION_KEY")
                .ok_or_else(|| anyhow::anyhow!("FIELD_ENCRYPTION_KEY must be set"))?,
            token_mode,
            token_local_key: get("TOKEN_LOCAL_KEY"),
            token_public_key_pem: get("TOKEN_PUBLIC_KEY_PEM"),
            snowflake_datacenter_id: parse_or(
                get("SNOWFLAKE_DATACENTER_ID"),
                "SNOWFLAKE_DATACENTER_ID",
                0,
            )?,
            snowflake_worker_id: parse_or(get("SNOWFLAKE_WORKER_ID"), "SNOWFLAKE_WORKER_ID", 0)?,
            client_cache_ttl_secs: parse_or(
                get("CLIENT_CACHE_TTL_SECS"),
                "CLIENT_CACHE_TTL_SECS",
                DEFAULT_CLIENT_CACHE_TTL_SECS,
            )?,
            client_cache_sweep_secs: parse_or(
                get("CLIENT_CACHE_SWEEP_SECS"),
                "CLIENT_CACHE_SWEEP_SECS",
                DEFAULT_CLIENT_CACHE_SWEEP_SECS,
            )?,
            presign_expiry_secs: parse_or(
                get("PRESIGN_EXPIRY_SECS"),
                "PRESIGN_EXPIRY_SECS",
                DEFAULT_PRESIGN_EXPIRY_SECS,
            )?,
            max_upload_size_bytes: parse_or(
                get("MAX_UPLOAD_SIZE_BYTES"),
                "MAX_UPLOAD_SIZE_BYTES",
                MAX_UPLOAD_SIZE_BYTES,
            )?,
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.snowflake_datacenter_id > MAX_NODE_ID || self.snowflake_worker_id > MAX_NODE_ID {
            return Err(anyhow::anyhow!(
                "SNOWFLAKE_DATACENTER_ID and SNOWFLAKE_WORKER_ID must be between 0 and {}",
                MAX_NODE_ID
            ));
        }

        if self.client_cache_ttl_secs == 0 || self.client_cache_sweep_secs == 0 {
            return Err(anyhow::anyhow!(
                "CLIENT_CACHE_TTL_SECS and CLIENT_CACHE_SWEEP_SECS must be positive"
            ));
        }

        // 7 days is the S3 ceiling for presigned URLs
        if self.presign_expiry_secs == 0 || self.presign_expiry_secs > 604_800 {
            return Err(anyhow::anyhow!(
                "PRESIGN_EXPIRY_SECS must be between 1 and 604800"
            ));
        }

        self.encryption_service()?;
        self.token_service()?;

        Ok(())
    }

    pub fn encryption_service(&self) -> Result<EncryptionService, AppError> {
        EncryptionService::from_base64(&self.field_encryption_key)
    }

    pub fn token_service(&self) -> Result<TokenService, AppError> {
        match self.token_mode {
            TokenMode::Local => {
                let key = self.token_local_key.as_deref().ok_or_else(|| {
                    AppError::Configuration(
                        "TOKEN_LOCAL_KEY must be set when TOKEN_MODE=local".to_string(),
                    )
                })?;
                TokenService::local_from_base64(key)
            }
            TokenMode::Public => {
                let pem = self.token_public_key_pem.as_deref().ok_or_else(|| {
                    AppError::Configuration(
                        "TOKEN_PUBLIC_KEY_PEM must be set when TOKEN_MODE=public".to_string(),
                    )
                })?;
                // Allow single-line env values with literal \n separators
                TokenService::public_from_pem(&pem.replace("\\n", "\n"))
            }
        }
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.db_timeout_seconds
    }

    pub fn token_mode(&self) -> TokenMode {
        self.token_mode
    }

    pub fn snowflake_datacenter_id(&self) -> u8 {
        self.snowflake_datacenter_id
    }

    pub fn snowflake_worker_id(&self) -> u8 {
        self.snowflake_worker_id
    }

    pub fn client_cache_ttl_secs(&self) -> u64 {
        self.client_cache_ttl_secs
    }

    pub fn client_cache_sweep_secs(&self) -> u64 {
        self.client_cache_sweep_secs
    }

    pub fn presign_expiry_secs(&self) -> u64 {
        self.presign_expiry_secs
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.max_upload_size_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY_B64: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgresql://localhost/bucketgate"),
            ("FIELD_ENCRYPTION_KEY", KEY_B64),
            ("TOKEN_LOCAL_KEY", KEY_B64),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_source(source(&minimal())).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server_port(), 3000);
        assert_eq!(config.token_mode(), TokenMode::Local);
        assert_eq!(config.client_cache_ttl_secs(), 600);
        assert_eq!(config.presign_expiry_secs(), 360);
        assert_eq!(config.environment(), "development");
    }

    #[test]
    fn test_missing_database_url() {
        let pairs = vec![("FIELD_ENCRYPTION_KEY", KEY_B64)];
        assert!(Config::from_source(source(&pairs)).is_err());
    }

    #[test]
    fn test_short_field_key_is_fatal() {
        let mut pairs = minimal();
        pairs[1] = ("FIELD_ENCRYPTION_KEY", "AAAAAAAAAAAAAAAAAAAAAA==");
        let config = Config::from_source(source(&pairs)).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_public_mode_requires_pem() {
        let mut pairs = minimal();
        pairs.push(("TOKEN_MODE", "public"));
        let config = Config::from_source(source(&pairs)).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_node_ids_validated() {
        let mut pairs = minimal();
        pairs.push(("SNOWFLAKE_WORKER_ID", "40"));
        let config = Config::from_source(source(&pairs)).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_omits_keys() {
        let config = Config::from_source(source(&minimal())).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains(KEY_B64));
        assert!(!debug.contains("postgresql://"));
    }
}
