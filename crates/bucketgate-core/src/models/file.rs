use crate::{AppError, SnowflakeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
        }
    }

    /// No transition is defined out of a terminal status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FileStatus::Pending)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FileStatus::Pending),
            "completed" => Ok(FileStatus::Completed),
            "failed" => Ok(FileStatus::Failed),
            other => Err(AppError::Internal(format!("Unknown file status: {}", other))),
        }
    }
}

/// One upload attempt, as stored in `files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: SnowflakeId,
    pub key: String,
    pub file_name: String,
    pub size_bytes: Option<i64>,
    pub content_type: String,
    pub bucket_id: i64,
    pub bucket_name: String,
    pub status: FileStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Terminal update applied to a pending record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTransition {
    Complete {
        size_bytes: Option<i64>,
        completed_at: DateTime<Utc>,
    },
    Fail,
}

impl FileTransition {
    pub fn target(&self) -> FileStatus {
        match self {
            FileTransition::Complete { .. } => FileStatus::Completed,
            FileTransition::Fail => FileStatus::Failed,
        }
    }
}

impl FileRecord {
    /// Apply a transition in memory, enforcing monotonic status.
    pub fn apply(&mut self, transition: FileTransition) -> Result<(), AppError> {
        if self.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "File {} is already {}",
                self.id, self.status
            )));
        }

        match transition {
            FileTransition::Complete {
                size_bytes,
                completed_at,
            } => {
                self.status = FileStatus::Completed;
                self.completed_at = Some(completed_at);
                if size_bytes.is_some() {
                    self.size_bytes = size_bytes;
                }
            }
            FileTransition::Fail => {
                self.status = FileStatus::Failed;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> FileRecord {
        FileRecord {
            id: SnowflakeId::from_raw(1),
            key: "uploads/1-a.bin".to_string(),
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

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [FileStatus::Pending, FileStatus::Completed, FileStatus::Failed] {
            assert_eq!(status.as_str().parse::<FileStatus>().unwrap(), status);
        }
        assert!("done".parse::<FileStatus>().is_err());
    }

    #[test]
    fn test_pending_can_complete() {
        let mut record = pending();
        let now = Utc::now();
        record
            .apply(FileTransition::Complete {
                size_bytes: Some(10),
                completed_at: now,
            })
            .unwrap();
        assert_eq!(record.status, FileStatus::Completed);
        assert_eq!(record.size_bytes, Some(10));
        assert_eq!(record.completed_at, Some(now));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut record = pending();
        record.apply(FileTransition::Fail).unwrap();
        assert!(matches!(
            record.apply(FileTransition::Complete {
                size_bytes: None,
                completed_at: Utc::now()
            }),
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            record.apply(FileTransition::Fail),
            Err(AppError::InvalidState(_))
        ));
        assert_eq!(record.status, FileStatus::Failed);
    }
}
