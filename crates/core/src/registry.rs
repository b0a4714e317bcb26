//! In-memory job registry.
//!
//! [`JobRegistry`] is the only shared mutable state of the service. It is
//! written twice per job (registration and finalization) and read by status
//! queries. Shared through `Arc` by the batch engine and the HTTP layer.

use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::job::{Job, JobStatus};
use crate::types::JobId;

/// Process-lifetime map from job handle to job snapshot.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a new job in `processing` state.
    ///
    /// Fails with [`CoreError::Conflict`] if the handle is already taken.
    pub async fn register(&self, id: JobId, original_name: &str) -> Result<Job, CoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&id) {
            return Err(CoreError::Conflict(format!("Job {id} is already registered")));
        }
        let job = Job::processing(id, original_name);
        jobs.insert(id, job.clone());
        Ok(job)
    }

    /// Return a snapshot of the job, or [`CoreError::NotFound`].
    pub async fn get(&self, id: JobId) -> Result<Job, CoreError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound { entity: "Job", id })
    }

    /// Move a job to its terminal state.
    ///
    /// Overwrites whatever is stored; the batch engine calls this once per job.
    pub async fn finalize(
        &self,
        id: JobId,
        status: JobStatus,
        output_path: Option<PathBuf>,
    ) -> Result<Job, CoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&id)
            .ok_or(CoreError::NotFound { entity: "Job", id })?;
        job.status = status;
        job.output_path = output_path;
        job.finished_at = Some(chrono::Utc::now());
        tracing::debug!(job_id = %id, status = %status, "Job finalized");
        Ok(job.clone())
    }

    /// Number of jobs seen since process start.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
