//! In-memory stand-ins for the external collaborators, shared by unit tests.

use crate::audio::{AudioConverter, AudioError, ConvertedAudio};
use crate::handlers::ReplySink;
use crate::relay::FileSource;
use crate::storage::{ObjectStore, StorageError};
use crate::transcribe::{JobRequest, JobStatus, TranscribeError, TranscriptionService};
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use teloxide::types::ChatId;

pub struct FakeStore {
    bucket: String,
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    puts: Mutex<Vec<String>>,
    gets: AtomicUsize,
    fail_puts: AtomicBool,
}

impl FakeStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: Mutex::new(HashMap::new()),
            puts: Mutex::new(Vec::new()),
            gets: AtomicUsize::new(0),
            fail_puts: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, key: &str, body: &str) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            (Bytes::from(body.to_string()), "application/json".to_string()),
        );
    }

    pub fn object(&self, key: &str) -> Option<(Bytes, String)> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn put_keys(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn fail_puts(&self) {
        self.fail_puts.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> std::result::Result<(), StorageError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Put {
                key: key.to_string(),
                message: "bucket unavailable".to_string(),
            });
        }
        self.puts.lock().unwrap().push(key.to_string());
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    async fn get_object(&self, key: &str) -> std::result::Result<Bytes, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(body, _)| body.clone())
            .ok_or_else(|| StorageError::Get {
                key: key.to_string(),
                message: "NoSuchKey".to_string(),
            })
    }
}

/// Replays a fixed sequence of statuses; reports `InProgress` once exhausted.
pub struct FakeTranscriber {
    statuses: Mutex<VecDeque<JobStatus>>,
    started: Mutex<Vec<JobRequest>>,
    checks: AtomicUsize,
    already_exists: bool,
}

impl FakeTranscriber {
    pub fn with_statuses(statuses: Vec<JobStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            started: Mutex::new(Vec::new()),
            checks: AtomicUsize::new(0),
            already_exists: false,
        }
    }

    pub fn already_exists(mut self) -> Self {
        self.already_exists = true;
        self
    }

    pub fn started(&self) -> Vec<JobRequest> {
        self.started.lock().unwrap().clone()
    }

    pub fn status_checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptionService for FakeTranscriber {
    async fn start_job(&self, request: &JobRequest) -> std::result::Result<(), TranscribeError> {
        self.started.lock().unwrap().push(request.clone());
        if self.already_exists {
            return Err(TranscribeError::JobExists(request.job_name.clone()));
        }
        Ok(())
    }

    async fn job_status(&self, _job_name: &str) -> std::result::Result<JobStatus, TranscribeError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(JobStatus::InProgress))
    }
}

pub struct FakeConverter {
    fail: bool,
}

impl FakeConverter {
    pub const OUTPUT: &'static [u8] = b"RIFF----WAVEfmt ";

    pub fn ok() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl AudioConverter for FakeConverter {
    async fn to_wav(
        &self,
        input: &Path,
        output: &Path,
    ) -> std::result::Result<ConvertedAudio, AudioError> {
        if self.fail {
            return Err(AudioError::ConversionFailed("corrupt input".to_string()));
        }
        assert!(input.exists(), "input must be staged before conversion");
        tokio::fs::write(output, Self::OUTPUT).await?;
        Ok(ConvertedAudio {
            size: Self::OUTPUT.len() as u64,
            format: "wav",
            channels: 1,
        })
    }
}

pub struct FakeFiles {
    payload: Vec<u8>,
    downloads: AtomicUsize,
}

impl FakeFiles {
    pub fn new(payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSource for FakeFiles {
    async fn download(&self, _file_ref: &str, dest: &Path) -> Result<u64> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(dest, &self.payload).await?;
        Ok(self.payload.len() as u64)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub replies: Mutex<Vec<(ChatId, String)>>,
    pub fail: bool,
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send_reply(&self, chat_id: ChatId, text: &str) -> Result<()> {
        if self.fail {
            return Err(crate::BotError::Config("chat unreachable".to_string()));
        }
        self.replies.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

/// Text of the single `<w:t>` run in a rendered transcript document.
pub fn docx_text(docx: &[u8]) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    assert_eq!(xml.matches("<w:p>").count(), 1);
    let start = xml.find("<w:t xml:space=\"preserve\">").unwrap() + "<w:t xml:space=\"preserve\">".len();
    let end = xml.find("</w:t>").unwrap();
    xml[start..end].to_string()
}
