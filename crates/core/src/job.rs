//! Job lifecycle types.
//!
//! A job is created in [`JobStatus::Processing`] and moves exactly once to
//! either [`JobStatus::Completed`] or [`JobStatus::Error`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Wire name of the status (matches the serde representation).
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// Whether the status is final.
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job snapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of a job as stored in the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Location of the output table. Only set once the job completed.
    pub output_path: Option<PathBuf>,
    /// File name the input table was uploaded under.
    pub original_name: String,
    pub submitted_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl Job {
    /// A freshly admitted job with no output yet.
    pub fn processing(id: JobId, original_name: impl Into<String>) -> Self {
        Self {
            id,
            status: JobStatus::Processing,
            output_path: None,
            original_name: original_name.into(),
            submitted_at: chrono::Utc::now(),
            finished_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        assert_eq!(JobStatus::Error.to_string(), "error");
    }

    #[test]
    fn only_processing_is_non_terminal() {
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn new_job_has_no_output() {
        let job = Job::processing(uuid::Uuid::new_v4(), "products.csv");
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.output_path.is_none());
        assert!(job.finished_at.is_none());
    }
}
