//! bucketgate operator CLI.
//!
//! Seals bucket credentials, registers buckets and mints local-mode tokens. Keys are read
//! from FIELD_ENCRYPTION_KEY and TOKEN_LOCAL_KEY (a `.env` file is honoured).

use anyhow::Context;
use bucketgate_cli::{access_claims, init_tracing, BucketArgs};
use bucketgate_core::{EncryptionService, TokenService};
use bucketgate_db::{BucketRepository, PostgresBucketRepository};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

#[derive(Parser)]
#[command(name = "bucketgate", about = "bucketgate operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FieldKey {
    /// Base64 of the 32-byte field encryption key
    #[arg(long, env = "FIELD_ENCRYPTION_KEY", hide_env_values = true)]
    field_key: String,
}

#[derive(Args)]
struct BucketFields {
    /// Bucket name
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "us-east-1")]
    region: String,
    /// Custom endpoint for S3-compatible stores; empty means AWS
    #[arg(long, default_value = "")]
    endpoint: String,
    #[arg(long)]
    access_key: String,
    #[arg(long, env = "BUCKET_SECRET_KEY", hide_env_values = true)]
    secret_key: String,
    /// Public base URL for uploaded objects
    #[arg(long)]
    cdn_url: Option<String>,
}

impl From<BucketFields> for BucketArgs {
    fn from(fields: BucketFields) -> Self {
        BucketArgs {
            name: fields.name,
            region: fields.region,
            endpoint: fields.endpoint,
            access_key: fields.access_key,
            secret_key: fields.secret_key,
            cdn_url: fields.cdn_url,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Seal a value with the field key and print the envelope
    EncryptField {
        plaintext: String,
        #[command(flatten)]
        key: FieldKey,
    },
    /// Insert a bucket with sealed credentials
    RegisterBucket {
        #[command(flatten)]
        bucket: BucketFields,
        #[command(flatten)]
        key: FieldKey,
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: String,
    },
    /// Mint a local-mode token
    MintToken {
        #[command(subcommand)]
        kind: TokenKind,
    },
}

#[derive(Subcommand)]
enum TokenKind {
    /// Access token scoped to a registered bucket
    Access {
        #[arg(long)]
        bucket_id: i64,
        /// Lifetime in seconds; omit for a token without expiry
        #[arg(long)]
        ttl_secs: Option<u64>,
        #[arg(long, env = "TOKEN_LOCAL_KEY", hide_env_values = true)]
        token_key: String,
    },
    /// Inline bucket config token for `/upload`
    Config {
        /// Id recorded on files written with this config
        #[arg(long)]
        bucket_id: i64,
        #[command(flatten)]
        bucket: BucketFields,
        #[command(flatten)]
        key: FieldKey,
        #[arg(long, env = "TOKEN_LOCAL_KEY", hide_env_values = true)]
        token_key: String,
    },
}

fn encryption(key: &FieldKey) -> anyhow::Result<EncryptionService> {
    EncryptionService::from_base64(&key.field_key).context("Invalid FIELD_ENCRYPTION_KEY")
}

fn tokens(token_key: &str) -> anyhow::Result<TokenService> {
    TokenService::local_from_base64(token_key).context("Invalid TOKEN_LOCAL_KEY")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::EncryptField { plaintext, key } => {
            let envelope = encryption(&key)?.encrypt_field(&plaintext)?;
            println!("{}", envelope);
        }
        Commands::RegisterBucket {
            bucket,
            key,
            database_url,
        } => {
            let sealed = BucketArgs::from(bucket).seal(&encryption(&key)?)?;
            let pool = PgPoolOptions::new()
                .max_connections(1)
                .connect(&database_url)
                .await
                .context("Failed to connect to database")?;
            let repo = PostgresBucketRepository::new(pool);
            let config = repo.insert(sealed).await?;
            tracing::info!(bucket_id = config.id, name = %config.name, "Bucket registered");

            let out = serde_json::json!({ "id": config.id.to_string(), "name": config.name });
            println!(
                "{}",
                serde_json::to_string_pretty(&out).context("Serialize response")?
            );
        }
        Commands::MintToken { kind } => {
            let token = match kind {
                TokenKind::Access {
                    bucket_id,
                    ttl_secs,
                    token_key,
                } => tokens(&token_key)?
                    .seal_local(&access_claims(bucket_id, ttl_secs, chrono::Utc::now()))?,
                TokenKind::Config {
                    bucket_id,
                    bucket,
                    key,
                    token_key,
                } => {
                    let config =
                        BucketArgs::from(bucket).into_config(bucket_id, &encryption(&key)?)?;
                    tokens(&token_key)?.seal_local(&config)?
                }
            };
            println!("{}", token);
        }
    }

    Ok(())
}
