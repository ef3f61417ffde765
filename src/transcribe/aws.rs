use super::{JobRequest, JobStatus, TranscribeError, TranscriptionService};
use async_trait::async_trait;
use aws_sdk_transcribe::types::{LanguageCode, Media, MediaFormat, TranscriptionJobStatus};
use aws_sdk_transcribe::Client;
use log::{debug, info};

/// Amazon Transcribe batch jobs.
pub struct AwsTranscribe {
    client: Client,
}

impl AwsTranscribe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TranscriptionService for AwsTranscribe {
    async fn start_job(&self, request: &JobRequest) -> Result<(), TranscribeError> {
        info!(
            "Starting transcription job {} for {}",
            request.job_name, request.media_uri
        );

        let media = Media::builder().media_file_uri(&request.media_uri).build();

        let result = self
            .client
            .start_transcription_job()
            .transcription_job_name(&request.job_name)
            .media(media)
            .media_format(MediaFormat::from(request.media_format.as_str()))
            .language_code(LanguageCode::from(request.language_code.as_str()))
            .output_bucket_name(&request.output_bucket)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|err| err.is_conflict_exception()) =>
            {
                Err(TranscribeError::JobExists(request.job_name.clone()))
            }
            Err(e) => Err(TranscribeError::Start {
                job_name: request.job_name.clone(),
                message: e.to_string(),
            }),
        }
    }

    async fn job_status(&self, job_name: &str) -> Result<JobStatus, TranscribeError> {
        let output = self
            .client
            .get_transcription_job()
            .transcription_job_name(job_name)
            .send()
            .await
            .map_err(|e| TranscribeError::Status {
                job_name: job_name.to_string(),
                message: e.to_string(),
            })?;

        let job = output.transcription_job().ok_or_else(|| {
            TranscribeError::InvalidResponse(format!("no job in status response for {}", job_name))
        })?;

        let status = match job.transcription_job_status() {
            Some(TranscriptionJobStatus::Completed) => JobStatus::Completed,
            Some(TranscriptionJobStatus::Failed) => JobStatus::Failed {
                reason: job.failure_reason().map(str::to_string),
            },
            Some(TranscriptionJobStatus::InProgress) => JobStatus::InProgress,
            Some(TranscriptionJobStatus::Queued) => JobStatus::Queued,
            other => {
                return Err(TranscribeError::InvalidResponse(format!(
                    "unexpected status {:?} for job {}",
                    other, job_name
                )));
            }
        };

        debug!("Job {} status: {:?}", job_name, status);
        Ok(status)
    }
}
