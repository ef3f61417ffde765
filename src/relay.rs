use crate::audio::AudioConverter;
use crate::destinations::DestinationStore;
use crate::staging::Staging;
use crate::storage::{ObjectStore, JPEG_CONTENT_TYPE, WAV_CONTENT_TYPE};
use crate::transcribe::{TranscriptionWorkflow, WorkflowOutcome};
use crate::{BotError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use teloxide::types::ChatId;

/// A single inbound photo or audio clip, valid for one handler invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    /// Stable identifier used in storage keys and job names.
    pub id: String,
    /// Platform reference used to download the payload.
    pub file_ref: String,
    /// Container format as a file extension, e.g. `jpg` or `ogg`.
    pub format: String,
}

/// Where inbound media payloads are fetched from.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Writes the file behind `file_ref` to `dest` and returns its size in bytes.
    async fn download(&self, file_ref: &str, dest: &Path) -> Result<u64>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioOutcome {
    pub audio_key: String,
    pub transcript: WorkflowOutcome,
}

pub fn photo_key(destination: &str, asset_id: &str) -> String {
    format!("{}/{}.jpg", destination, asset_id)
}

pub fn audio_key(destination: &str, asset_id: &str) -> String {
    format!("{}/{}.wav", destination, asset_id)
}

/// Moves user media into object storage under the user's destination and
/// turns audio into stored transcripts.
pub struct MediaRelay {
    destinations: Arc<dyn DestinationStore>,
    store: Arc<dyn ObjectStore>,
    files: Arc<dyn FileSource>,
    converter: Arc<dyn AudioConverter>,
    workflow: TranscriptionWorkflow,
    staging_dir: PathBuf,
}

impl MediaRelay {
    pub fn new(
        destinations: Arc<dyn DestinationStore>,
        store: Arc<dyn ObjectStore>,
        files: Arc<dyn FileSource>,
        converter: Arc<dyn AudioConverter>,
        workflow: TranscriptionWorkflow,
        staging_dir: PathBuf,
    ) -> Self {
        Self {
            destinations,
            store,
            files,
            converter,
            workflow,
            staging_dir,
        }
    }

    pub async fn set_destination(&self, chat_id: ChatId, name: String) {
        self.destinations.set_destination(chat_id, name).await;
    }

    pub async fn destination(&self, chat_id: ChatId) -> Option<String> {
        self.destinations.get_destination(chat_id).await
    }

    async fn require_destination(&self, chat_id: ChatId) -> Result<String> {
        self.destinations
            .get_destination(chat_id)
            .await
            .ok_or(BotError::DestinationNotSet)
    }

    /// Uploads a photo to `{destination}/{asset_id}.jpg` and returns that key.
    pub async fn handle_photo(&self, chat_id: ChatId, asset: &MediaAsset) -> Result<String> {
        let destination = self.require_destination(chat_id).await?;
        let staging = Staging::new(&self.staging_dir)?;

        let local = staging.file(&format!("{}.jpg", asset.id));
        let size = self.files.download(&asset.file_ref, &local).await?;
        info!("Chat {}: staged photo {} ({} bytes)", chat_id, asset.id, size);

        let key = photo_key(&destination, &asset.id);
        let data = tokio::fs::read(&local).await?;
        self.store
            .put_object(&key, Bytes::from(data), JPEG_CONTENT_TYPE)
            .await
            .map_err(BotError::UploadFailed)?;

        Ok(key)
    }

    /// Converts an audio clip to mono WAV, uploads it to
    /// `{destination}/{asset_id}.wav` and runs the transcription workflow on it.
    pub async fn handle_audio(&self, chat_id: ChatId, asset: &MediaAsset) -> Result<AudioOutcome> {
        let destination = self.require_destination(chat_id).await?;
        let audio_key = audio_key(&destination, &asset.id);

        {
            let staging = Staging::new(&self.staging_dir)?;
            let original = staging.file(&format!("{}.{}", asset.id, asset.format));
            let converted = staging.file(&format!("{}.wav", asset.id));

            let size = self.files.download(&asset.file_ref, &original).await?;
            info!("Chat {}: staged audio {} ({} bytes)", chat_id, asset.id, size);

            let audio = self.converter.to_wav(&original, &converted).await?;
            info!(
                "Chat {}: converted {} to {}-channel {} ({} bytes)",
                chat_id, asset.id, audio.channels, audio.format, audio.size
            );

            let data = tokio::fs::read(&converted).await?;
            self.store
                .put_object(&audio_key, Bytes::from(data), WAV_CONTENT_TYPE)
                .await
                .map_err(BotError::UploadFailed)?;
        }

        let transcript = self.workflow.run(&destination, &asset.id, &audio_key).await?;
        Ok(AudioOutcome {
            audio_key,
            transcript,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioError;
    use crate::testing::{docx_text, FakeConverter, FakeFiles, FakeStore, FakeTranscriber};
    use crate::destinations::InMemoryDestinations;
    use crate::transcribe::{JobStatus, PollPolicy};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        relay: MediaRelay,
        store: Arc<FakeStore>,
        files: Arc<FakeFiles>,
        service: Arc<FakeTranscriber>,
        staging_root: TempDir,
    }

    fn fixture(statuses: Vec<JobStatus>, converter: FakeConverter) -> Fixture {
        let store = Arc::new(FakeStore::new("media-bucket"));
        let files = Arc::new(FakeFiles::new(b"payload"));
        let service = Arc::new(FakeTranscriber::with_statuses(statuses));
        let staging_root = TempDir::new().unwrap();
        let policy = PollPolicy {
            interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            max_attempts: 5,
            ..PollPolicy::default()
        };
        let workflow =
            TranscriptionWorkflow::new(service.clone(), store.clone(), policy, "en-US", ".json");
        let relay = MediaRelay::new(
            Arc::new(InMemoryDestinations::new()),
            store.clone(),
            files.clone(),
            Arc::new(converter),
            workflow,
            staging_root.path().to_path_buf(),
        );
        Fixture {
            relay,
            store,
            files,
            service,
            staging_root,
        }
    }

    fn asset(id: &str, format: &str) -> MediaAsset {
        MediaAsset {
            id: id.to_string(),
            file_ref: format!("file-{}", id),
            format: format.to_string(),
        }
    }

    fn staging_is_empty(fixture: &Fixture) -> bool {
        std::fs::read_dir(fixture.staging_root.path()).unwrap().count() == 0
    }

    #[tokio::test]
    async fn test_photo_without_destination_touches_nothing() {
        let f = fixture(vec![], FakeConverter::ok());

        let result = f.relay.handle_photo(ChatId(1), &asset("abc123", "jpg")).await;

        assert!(matches!(result, Err(BotError::DestinationNotSet)));
        assert_eq!(f.files.downloads(), 0);
        assert!(f.store.put_keys().is_empty());
    }

    #[tokio::test]
    async fn test_photo_key_uses_destination() {
        let f = fixture(vec![], FakeConverter::ok());
        f.relay.set_destination(ChatId(1), "trip".to_string()).await;

        let key = f.relay.handle_photo(ChatId(1), &asset("abc123", "jpg")).await.unwrap();

        assert_eq!(key, "trip/abc123.jpg");
        let (body, content_type) = f.store.object("trip/abc123.jpg").unwrap();
        assert_eq!(&body[..], b"payload");
        assert_eq!(content_type, JPEG_CONTENT_TYPE);
        assert!(staging_is_empty(&f));
    }

    #[tokio::test]
    async fn test_photo_upload_failure_cleans_staging() {
        let f = fixture(vec![], FakeConverter::ok());
        f.store.fail_puts();
        f.relay.set_destination(ChatId(1), "trip".to_string()).await;

        let result = f.relay.handle_photo(ChatId(1), &asset("abc123", "jpg")).await;

        assert!(matches!(result, Err(BotError::UploadFailed(_))));
        assert!(staging_is_empty(&f));
    }

    #[tokio::test]
    async fn test_audio_without_destination_is_rejected() {
        let f = fixture(vec![JobStatus::Completed], FakeConverter::ok());

        let result = f.relay.handle_audio(ChatId(5), &asset("voice42", "ogg")).await;

        assert!(matches!(result, Err(BotError::DestinationNotSet)));
        assert_eq!(f.files.downloads(), 0);
        assert!(f.service.started().is_empty());
    }

    #[tokio::test]
    async fn test_audio_end_to_end() {
        let f = fixture(
            vec![JobStatus::InProgress, JobStatus::Completed],
            FakeConverter::ok(),
        );
        f.store.insert(
            "transcription-voice42.json",
            r#"{"results":{"transcripts":[{"transcript":"hello world"}]}}"#,
        );
        f.relay.set_destination(ChatId(5), "notes".to_string()).await;

        let outcome = f.relay.handle_audio(ChatId(5), &asset("voice42", "ogg")).await.unwrap();

        assert_eq!(outcome.audio_key, "notes/voice42.wav");
        assert_eq!(outcome.transcript.job_name, "transcription-voice42");
        assert_eq!(outcome.transcript.document_key, "notes/transcription-voice42.docx");

        let (wav, content_type) = f.store.object("notes/voice42.wav").unwrap();
        assert_eq!(&wav[..], FakeConverter::OUTPUT);
        assert_eq!(content_type, WAV_CONTENT_TYPE);

        let (docx, _) = f.store.object("notes/transcription-voice42.docx").unwrap();
        assert_eq!(docx_text(&docx), "hello world");
        assert_eq!(
            f.service.started()[0].media_uri,
            "s3://media-bucket/notes/voice42.wav"
        );
        assert!(staging_is_empty(&f));
    }

    #[tokio::test]
    async fn test_conversion_failure_surfaces_distinctly() {
        let f = fixture(vec![JobStatus::Completed], FakeConverter::failing());
        f.relay.set_destination(ChatId(5), "notes".to_string()).await;

        let result = f.relay.handle_audio(ChatId(5), &asset("voice42", "ogg")).await;

        assert!(matches!(
            result,
            Err(BotError::Audio(AudioError::ConversionFailed(_)))
        ));
        assert!(f.store.put_keys().is_empty());
        assert!(f.service.started().is_empty());
        assert!(staging_is_empty(&f));
    }

    #[tokio::test]
    async fn test_failed_transcription_keeps_audio_but_no_document() {
        let f = fixture(vec![JobStatus::Failed { reason: None }], FakeConverter::ok());
        f.relay.set_destination(ChatId(5), "notes".to_string()).await;

        let result = f.relay.handle_audio(ChatId(5), &asset("voice42", "ogg")).await;

        assert!(matches!(result, Err(BotError::TranscriptionJobFailed { .. })));
        assert_eq!(f.store.put_keys(), vec!["notes/voice42.wav".to_string()]);
    }

    #[tokio::test]
    async fn test_destination_read_at_upload_time() {
        let f = fixture(vec![], FakeConverter::ok());
        f.relay.set_destination(ChatId(1), "first".to_string()).await;
        f.relay.set_destination(ChatId(1), "second".to_string()).await;
        f.relay.set_destination(ChatId(2), "other".to_string()).await;

        let key = f.relay.handle_photo(ChatId(1), &asset("p1", "jpg")).await.unwrap();
        assert_eq!(key, "second/p1.jpg");
    }
}
