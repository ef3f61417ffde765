pub mod aws;
pub mod policy;
pub mod transcript;
pub mod workflow;

pub use policy::PollPolicy;
pub use workflow::{TranscriptionWorkflow, WorkflowOutcome};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("Failed to start job {job_name}: {message}")]
    Start { job_name: String, message: String },
    #[error("Failed to query job {job_name}: {message}")]
    Status { job_name: String, message: String },
    #[error("Job {0} already exists")]
    JobExists(String),
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Parameters of one transcription job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub job_name: String,
    pub media_uri: String,
    pub media_format: String,
    pub language_code: String,
    pub output_bucket: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed { reason: Option<String> },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed { .. })
    }
}

/// Asynchronous speech-to-text service that runs named jobs against stored media.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Submits a job. Returns [`TranscribeError::JobExists`] when a job of the
    /// same name was already submitted.
    async fn start_job(&self, request: &JobRequest) -> Result<(), TranscribeError>;

    async fn job_status(&self, job_name: &str) -> Result<JobStatus, TranscribeError>;
}

/// Job name for an audio asset. Stable across retries of the same asset.
pub fn job_name_for(asset_id: &str) -> String {
    format!("transcription-{}", asset_id)
}
