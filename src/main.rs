mod audio;
mod destinations;
mod document;
mod handlers;
mod relay;
mod staging;
mod storage;
mod transcribe;
#[cfg(test)]
mod testing;

use dotenvy::dotenv;
use log::info;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use teloxide::{prelude::*, Bot};
use thiserror::Error;

use crate::audio::FfmpegConverter;
use crate::destinations::InMemoryDestinations;
use crate::relay::MediaRelay;
use crate::storage::{RetryPolicy, S3Storage, StorageError};
use crate::transcribe::aws::AwsTranscribe;
use crate::transcribe::{PollPolicy, TranscriptionWorkflow};

#[derive(Error, Debug)]
pub enum BotError {
    #[error("No destination folder set for this chat")]
    DestinationNotSet,
    #[error("Download failed: {0}")]
    DownloadFailed(#[source] StorageError),
    #[error("Upload failed: {0}")]
    UploadFailed(#[source] StorageError),
    #[error("Audio processing error: {0}")]
    Audio(#[from] audio::AudioError),
    #[error("Transcription job {job_name} failed: {}", .reason.as_deref().unwrap_or("no reason given"))]
    TranscriptionJobFailed {
        job_name: String,
        reason: Option<String>,
    },
    #[error("Transcription job {job_name} not finished after {attempts} status checks")]
    TranscriptionTimeout { job_name: String, attempts: u32 },
    #[error("Transcription service error: {0}")]
    Transcription(#[from] transcribe::TranscribeError),
    #[error("Document rendering error: {0}")]
    Document(#[from] document::DocumentError),
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),
    #[error("Download error: {0}")]
    Download(#[from] teloxide::DownloadError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub telegram_token: String,
    pub bucket: String,
    pub language_code: String,
    pub result_suffix: String,
    pub poll: PollPolicy,
    pub storage_retry: RetryPolicy,
    pub staging_dir: PathBuf,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| BotError::Config(format!("{} not set", name)))
        };

        let telegram_token = required("TELEGRAM_BOT_TOKEN")?;
        let bucket = required("S3_BUCKET")?;

        let defaults = PollPolicy::default();
        let poll = PollPolicy {
            interval: Duration::from_secs(parse_var(
                &lookup,
                "TRANSCRIBE_POLL_INTERVAL_SECS",
                defaults.interval.as_secs(),
            )?),
            max_interval: Duration::from_secs(parse_var(
                &lookup,
                "TRANSCRIBE_POLL_MAX_INTERVAL_SECS",
                defaults.max_interval.as_secs(),
            )?),
            backoff: parse_var(&lookup, "TRANSCRIBE_POLL_BACKOFF", defaults.backoff)?,
            max_attempts: parse_var(&lookup, "TRANSCRIBE_MAX_POLLS", defaults.max_attempts)?,
            timeout: Duration::from_secs(parse_var(
                &lookup,
                "TRANSCRIBE_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
        };

        let retry_defaults = RetryPolicy::default();
        let storage_retry = RetryPolicy {
            max_retries: parse_var(&lookup, "STORAGE_MAX_RETRIES", retry_defaults.max_retries)?,
            base_delay_ms: parse_var(&lookup, "STORAGE_RETRY_BASE_MS", retry_defaults.base_delay_ms)?,
        };

        Ok(BotConfig {
            telegram_token,
            bucket,
            language_code: lookup("TRANSCRIBE_LANGUAGE_CODE").unwrap_or_else(|| "en-US".to_string()),
            result_suffix: lookup("TRANSCRIPT_RESULT_SUFFIX").unwrap_or_else(|| ".json".to_string()),
            poll,
            storage_retry,
            staging_dir: lookup("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| BotError::Config(format!("{} has an invalid value: {}", name, raw))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Telegram S3 relay bot");

    let config = BotConfig::from_env()?;
    info!(
        "Uploading to bucket {}, transcribing in {}",
        config.bucket, config.language_code
    );

    let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let store = Arc::new(S3Storage::new(
        aws_sdk_s3::Client::new(&aws),
        config.bucket.clone(),
        config.storage_retry,
    ));
    let transcriber = Arc::new(AwsTranscribe::new(aws_sdk_transcribe::Client::new(&aws)));

    let bot = Bot::new(&config.telegram_token);

    let workflow = TranscriptionWorkflow::new(
        transcriber,
        store.clone(),
        config.poll.clone(),
        config.language_code.clone(),
        config.result_suffix.clone(),
    );
    let relay = Arc::new(MediaRelay::new(
        Arc::new(InMemoryDestinations::new()),
        store,
        Arc::new(handlers::TelegramFiles::new(bot.clone())),
        Arc::new(FfmpegConverter),
        workflow,
        config.staging_dir.clone(),
    ));

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<handlers::Command>()
                .endpoint(handlers::command_handler),
        )
        .branch(
            Update::filter_message()
                .chain(dptree::filter(|msg: Message| msg.photo().is_some()))
                .endpoint(handlers::photo_handler),
        )
        .branch(
            Update::filter_message()
                .chain(dptree::filter(|msg: Message| {
                    msg.voice().is_some() || msg.audio().is_some()
                }))
                .endpoint(handlers::audio_handler),
        )
        .branch(
            Update::filter_message()
                .chain(dptree::filter(|msg: Message| handlers::is_destination_text(&msg)))
                .endpoint(handlers::text_handler),
        );

    info!("Bot started. Listening for messages...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");
    Ok(())
}
