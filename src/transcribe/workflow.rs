use super::transcript::primary_transcript;
use super::{job_name_for, JobRequest, JobStatus, PollPolicy, TranscribeError, TranscriptionService};
use crate::document::render_transcript;
use crate::storage::{ObjectStore, DOCX_CONTENT_TYPE};
use crate::{BotError, Result};
use bytes::Bytes;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::time::Instant;

#[derive(Debug)]
enum Stage {
    Submitted,
    Polling,
    Completed { polls: u32 },
    Failed { reason: Option<String> },
    Delivered { document_key: String, polls: u32 },
}

enum Terminal {
    Completed,
    Failed(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOutcome {
    pub job_name: String,
    pub document_key: String,
    pub polls: u32,
}

/// Drives one transcription job from submission to a stored transcript document.
pub struct TranscriptionWorkflow {
    service: Arc<dyn TranscriptionService>,
    store: Arc<dyn ObjectStore>,
    policy: PollPolicy,
    language_code: String,
    result_suffix: String,
}

impl TranscriptionWorkflow {
    pub fn new(
        service: Arc<dyn TranscriptionService>,
        store: Arc<dyn ObjectStore>,
        policy: PollPolicy,
        language_code: impl Into<String>,
        result_suffix: impl Into<String>,
    ) -> Self {
        Self {
            service,
            store,
            policy,
            language_code: language_code.into(),
            result_suffix: result_suffix.into(),
        }
    }

    /// Transcribes the WAV object at `audio_key` and stores the transcript as
    /// `{destination}/{job_name}.docx`.
    pub async fn run(
        &self,
        destination: &str,
        asset_id: &str,
        audio_key: &str,
    ) -> Result<WorkflowOutcome> {
        let job_name = job_name_for(asset_id);
        self.submit(&job_name, audio_key).await?;

        let mut stage = Stage::Submitted;
        loop {
            info!("Transcription job {}: {:?}", job_name, stage);
            stage = match stage {
                Stage::Submitted => Stage::Polling,
                Stage::Polling => match self.poll_until_terminal(&job_name).await? {
                    (Terminal::Completed, polls) => Stage::Completed { polls },
                    (Terminal::Failed(reason), _) => Stage::Failed { reason },
                },
                Stage::Completed { polls } => Stage::Delivered {
                    document_key: self.deliver(destination, &job_name).await?,
                    polls,
                },
                Stage::Failed { reason } => {
                    return Err(BotError::TranscriptionJobFailed { job_name, reason });
                }
                Stage::Delivered {
                    document_key,
                    polls,
                } => {
                    return Ok(WorkflowOutcome {
                        job_name,
                        document_key,
                        polls,
                    });
                }
            };
        }
    }

    async fn submit(&self, job_name: &str, audio_key: &str) -> Result<()> {
        let request = JobRequest {
            job_name: job_name.to_string(),
            media_uri: self.store.object_uri(audio_key),
            media_format: "wav".to_string(),
            language_code: self.language_code.clone(),
            output_bucket: self.store.bucket().to_string(),
        };

        match self.service.start_job(&request).await {
            Ok(()) => Ok(()),
            Err(TranscribeError::JobExists(name)) => {
                warn!("Job {} was already submitted, resuming it", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Checks status until a terminal one is seen. No check is issued after that.
    async fn poll_until_terminal(&self, job_name: &str) -> Result<(Terminal, u32)> {
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.service.job_status(job_name).await? {
                JobStatus::Completed => return Ok((Terminal::Completed, attempt)),
                JobStatus::Failed { reason } => return Ok((Terminal::Failed(reason), attempt)),
                status => debug!("Job {} is {:?} after {} checks", job_name, status, attempt),
            }

            let delay = self.policy.delay_after(attempt);
            if attempt >= self.policy.max_attempts || started.elapsed() + delay > self.policy.timeout {
                return Err(BotError::TranscriptionTimeout {
                    job_name: job_name.to_string(),
                    attempts: attempt,
                });
            }
            tokio::time::sleep(delay).await;
        }
    }

    async fn deliver(&self, destination: &str, job_name: &str) -> Result<String> {
        let result_key = format!("{}{}", job_name, self.result_suffix);
        let result = self
            .store
            .get_object(&result_key)
            .await
            .map_err(BotError::DownloadFailed)?;

        let text = primary_transcript(&result)?;
        info!("Job {} produced {} characters of transcript", job_name, text.len());

        let document = render_transcript(&text)?;
        let document_key = format!("{}/{}.docx", destination, job_name);
        self.store
            .put_object(&document_key, Bytes::from(document), DOCX_CONTENT_TYPE)
            .await
            .map_err(BotError::UploadFailed)?;

        Ok(document_key)
    }
}
