//! Bucketgate Core Library
//!
//! Domain models, error types, configuration and the credential-protection primitives
//! (field envelope, transport envelope, id generation) shared by all bucketgate crates.

pub mod config;
pub mod constants;
pub mod encryption;
pub mod error;
pub mod models;
pub mod snowflake;
pub mod token;

// Re-export commonly used types
pub use config::Config;
pub use encryption::EncryptionService;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use snowflake::{Clock, IdGenerator, SnowflakeId, SystemClock};
pub use token::{TokenFailure, TokenMode, TokenOutcome, TokenService};
