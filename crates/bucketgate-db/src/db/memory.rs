//! In-memory repositories used by tests in this and downstream crates.

use super::{BucketRepository, FileRepository, NewBucket};
use bucketgate_core::models::{BucketConfig, FileRecord, FileTransition};
use bucketgate_core::{AppError, SnowflakeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryFileRepository {
    records: RwLock<HashMap<SnowflakeId, FileRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl FileRepository for InMemoryFileRepository {
    async fn insert(&self, record: &FileRecord) -> Result<bool, AppError> {
        self.check_available()?;
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Ok(false);
        }
        records.insert(record.id, record.clone());
        Ok(true)
    }

    async fn get(&self, id: SnowflakeId) -> Result<Option<FileRecord>, AppError> {
        self.check_available()?;
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn transition(
        &self,
        id: SnowflakeId,
        transition: FileTransition,
    ) -> Result<FileRecord, AppError> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))?;
        record.apply(transition)?;
        Ok(record.clone())
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.check_available()
    }
}

pub struct InMemoryBucketRepository {
    buckets: RwLock<HashMap<i64, BucketConfig>>,
    next_id: AtomicI64,
}

impl Default for InMemoryBucketRepository {
    fn default() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryBucketRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BucketRepository for InMemoryBucketRepository {
    async fn get(&self, id: i64) -> Result<Option<BucketConfig>, AppError> {
        Ok(self.buckets.read().await.get(&id).cloned())
    }

    async fn insert(&self, bucket: NewBucket) -> Result<BucketConfig, AppError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let config = BucketConfig {
            id,
            name: bucket.name,
            region: bucket.region,
            endpoint: bucket.endpoint,
            access_key_encrypted: bucket.access_key_encrypted,
            secret_key_encrypted: bucket.secret_key_encrypted,
            cdn_url: bucket.cdn_url,
        };
        self.buckets.write().await.insert(id, config.clone());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketgate_core::models::FileStatus;
    use chrono::Utc;

    fn record(id: u64) -> FileRecord {
        FileRecord {
            id: SnowflakeId::from_raw(id),
            key: format!("uploads/{}-a.bin", id),
            file_name: "a.bin".to_string(),
            size_bytes: None,
            content_type: "application/octet-stream".to_string(),
            bucket_id: 1,
            bucket_name: "media".to_string(),
            status: FileStatus::Pending,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_on_id() {
        let repo = InMemoryFileRepository::new();
        assert!(repo.insert(&record(1)).await.unwrap());
        assert!(!repo.insert(&record(1)).await.unwrap());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_transition_rules() {
        let repo = InMemoryFileRepository::new();
        repo.insert(&record(1)).await.unwrap();

        let updated = repo
            .transition(SnowflakeId::from_raw(1), FileTransition::Fail)
            .await
            .unwrap();
        assert_eq!(updated.status, FileStatus::Failed);

        assert!(matches!(
            repo.transition(SnowflakeId::from_raw(1), FileTransition::Fail)
                .await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            repo.transition(SnowflakeId::from_raw(2), FileTransition::Fail)
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_surfaces_database_error() {
        let repo = InMemoryFileRepository::new();
        repo.set_unavailable(true);
        assert!(matches!(
            repo.insert(&record(1)).await,
            Err(AppError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_bucket_ids_are_assigned() {
        let repo = InMemoryBucketRepository::new();
        let bucket = repo
            .insert(NewBucket {
                name: "media".to_string(),
                region: "us-east-1".to_string(),
                endpoint: "http://localhost:9000".to_string(),
                access_key_encrypted: "a".to_string(),
                secret_key_encrypted: "b".to_string(),
                cdn_url: None,
            })
            .await
            .unwrap();
        assert_eq!(bucket.id, 1);
        assert_eq!(repo.get(1).await.unwrap(), Some(bucket));
        assert!(repo.get(2).await.unwrap().is_none());
    }
}
