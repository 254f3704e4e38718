use bucketgate_core::models::BucketConfig;
use bucketgate_core::AppError;
use sqlx::PgPool;

/// Fields of a bucket being registered. Credentials must already be sealed.
#[derive(Debug, Clone)]
pub struct NewBucket {
    pub name: String,
    pub region: String,
    pub endpoint: String,
    pub access_key_encrypted: String,
    pub secret_key_encrypted: String,
    pub cdn_url: Option<String>,
}

/// Trait for bucket configuration lookups. Rows are read-mostly.
#[async_trait::async_trait]
pub trait BucketRepository: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<BucketConfig>, AppError>;

    async fn insert(&self, bucket: NewBucket) -> Result<BucketConfig, AppError>;
}

#[derive(Clone)]
pub struct PostgresBucketRepository {
    pool: PgPool,
}

impl PostgresBucketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BucketRepository for PostgresBucketRepository {
    async fn get(&self, id: i64) -> Result<Option<BucketConfig>, AppError> {
        let bucket = sqlx::query_as::<_, BucketConfig>(
            r#"
            SELECT id, name, region, endpoint,
                   access_key_encrypted, secret_key_encrypted, cdn_url
            FROM s3_buckets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bucket)
    }

    async fn insert(&self, bucket: NewBucket) -> Result<BucketConfig, AppError> {
        let row = sqlx::query_as::<_, BucketConfig>(
            r#"
            INSERT INTO s3_buckets (
                name, region, endpoint, access_key_encrypted, secret_key_encrypted, cdn_url
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, region, endpoint,
                      access_key_encrypted, secret_key_encrypted, cdn_url
            "#,
        )
        .bind(&bucket.name)
        .bind(&bucket.region)
        .bind(&bucket.endpoint)
        .bind(&bucket.access_key_encrypted)
        .bind(&bucket.secret_key_encrypted)
        .bind(&bucket.cdn_url)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(bucket_id = row.id, name = %row.name, "Bucket registered");
        Ok(row)
    }
}
