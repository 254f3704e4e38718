use bucketgate_core::models::{FileRecord, FileStatus, FileTransition};
use bucketgate_core::{AppError, SnowflakeId};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Trait for file record persistence.
///
/// Status transitions are conditional on the record still being `pending`, so a
/// terminal record can never be moved again regardless of caller behaviour.
#[async_trait::async_trait]
pub trait FileRepository: Send + Sync {
    /// Insert a new record. Returns `false` if a record with the same id already exists.
    async fn insert(&self, record: &FileRecord) -> Result<bool, AppError>;

    async fn get(&self, id: SnowflakeId) -> Result<Option<FileRecord>, AppError>;

    /// Move a pending record to a terminal status.
    ///
    /// Fails with `NotFound` if the record does not exist and `InvalidState` if it is
    /// already terminal.
    async fn transition(
        &self,
        id: SnowflakeId,
        transition: FileTransition,
    ) -> Result<FileRecord, AppError>;

    /// Cheap connectivity check for health probes.
    async fn ping(&self) -> Result<(), AppError>;
}

#[derive(sqlx::FromRow)]
struct FileRow {
    id: i64,
    key: String,
    file_name: String,
    size_bytes: Option<i64>,
    content_type: String,
    bucket_id: i64,
    bucket_name: String,
    status: String,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = AppError;

    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        Ok(FileRecord {
            id: SnowflakeId::try_from(row.id)?,
            key: row.key,
            file_name: row.file_name,
            size_bytes: row.size_bytes,
            content_type: row.content_type,
            bucket_id: row.bucket_id,
            bucket_name: row.bucket_name,
            status: row.status.parse::<FileStatus>()?,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PostgresFileRepository {
    pool: PgPool,
}

impl PostgresFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FileRepository for PostgresFileRepository {
    async fn insert(&self, record: &FileRecord) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO files (
                id, key, file_name, size_bytes, content_type,
                bucket_id, bucket_name, status, completed_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(record.id.as_i64())
        .bind(&record.key)
        .bind(&record.file_name)
        .bind(record.size_bytes)
        .bind(&record.content_type)
        .bind(record.bucket_id)
        .bind(&record.bucket_name)
        .bind(record.status.as_str())
        .bind(record.completed_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        tracing::debug!(
            file_id = %record.id,
            status = %record.status,
            inserted,
            "File record insert"
        );
        Ok(inserted)
    }

    async fn get(&self, id: SnowflakeId) -> Result<Option<FileRecord>, AppError> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT id, key, file_name, size_bytes, content_type,
                   bucket_id, bucket_name, status, completed_at, created_at
            FROM files
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileRecord::try_from).transpose()
    }

    async fn transition(
        &self,
        id: SnowflakeId,
        transition: FileTransition,
    ) -> Result<FileRecord, AppError> {
        let (size_bytes, completed_at) = match transition {
            FileTransition::Complete {
                size_bytes,
                completed_at,
            } => (size_bytes, Some(completed_at)),
            FileTransition::Fail => (None, None),
        };

        let row = sqlx::query_as::<_, FileRow>(
            r#"
            UPDATE files
            SET status = $2,
                size_bytes = COALESCE($3, size_bytes),
                completed_at = COALESCE($4, completed_at)
            WHERE id = $1 AND status = 'pending'
            RETURNING id, key, file_name, size_bytes, content_type,
                      bucket_id, bucket_name, status, completed_at, created_at
            "#,
        )
        .bind(id.as_i64())
        .bind(transition.target().as_str())
        .bind(size_bytes)
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            tracing::info!(file_id = %id, status = %transition.target(), "File status updated");
            return FileRecord::try_from(row);
        }

        match self.get(id).await? {
            None => Err(AppError::NotFound(format!("File {} not found", id))),
            Some(existing) => Err(AppError::InvalidState(format!(
                "File {} is already {}",
                id, existing.status
            ))),
        }
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
