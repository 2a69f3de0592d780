//! Job tracking types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle state of a document-translation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Terminal jobs are eligible for retention sweeping.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A single document-translation request tracked from submission to a
/// terminal state. Mutated atomically by the orchestrator only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    /// 0–100, monotone non-decreasing over the job's lifetime.
    pub progress: u8,
    pub source_path: PathBuf,
    pub source_language: String,
    pub target_language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// User-safe failure description (stable code + redacted detail).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Job {
    pub fn new(
        job_id: impl Into<String>,
        source_path: PathBuf,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            status: JobStatus::Queued,
            progress: 0,
            source_path,
            source_language: source_language.into(),
            target_language: target_language.into(),
            output_path: None,
            error: None,
            created_at: now,
            last_updated: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_new_job_starts_queued() {
        let job = Job::new("j1", PathBuf::from("in.pdf"), "en", "de");
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert!(job.output_path.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_status_serializes_screaming() {
        let json = serde_json::to_string(&JobStatus::Queued).unwrap();
        assert_eq!(json, "\"QUEUED\"");
    }
}
