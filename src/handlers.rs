use crate::relay::{FileSource, MediaAsset, MediaRelay};
use crate::{audio, BotError, Result};
use async_trait::async_trait;
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;
use teloxide::{
    net::Download,
    prelude::*,
    types::ChatId,
    utils::command::BotCommands,
};
use tokio::io::AsyncWriteExt;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "Display this help text")]
    Help,
    #[command(description = "Start the bot")]
    Start,
    #[command(description = "Show the folder uploads go to")]
    Folder,
}

/// Delivers text back to a chat.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_reply(&self, chat_id: ChatId, text: &str) -> Result<()>;
}

#[async_trait]
impl ReplySink for Bot {
    async fn send_reply(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.send_message(chat_id, text).await?;
        Ok(())
    }
}

/// Downloads message attachments through the Bot API.
#[derive(Clone)]
pub struct TelegramFiles {
    bot: Bot,
}

impl TelegramFiles {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl FileSource for TelegramFiles {
    async fn download(&self, file_ref: &str, dest: &Path) -> Result<u64> {
        info!("Downloading file: {}", file_ref);
        let file = self.bot.get_file(file_ref).await?;

        let mut out = tokio::fs::File::create(dest).await?;
        self.bot.download_file(&file.path, &mut out).await?;
        out.flush().await?;

        Ok(tokio::fs::metadata(dest).await?.len())
    }
}

/// Sends a reply, logging instead of propagating delivery failures.
pub async fn reply(sink: &dyn ReplySink, chat_id: ChatId, text: &str) {
    if let Err(e) = sink.send_reply(chat_id, text).await {
        error!("Failed to send reply to chat {}: {}", chat_id, e);
    }
}

/// User-facing text for a failed media operation.
pub fn user_message(err: &BotError) -> &'static str {
    match err {
        BotError::DestinationNotSet => "Please set a folder name first!",
        BotError::Audio(_) => {
            "❌ Failed to convert your audio. The file might be corrupted or in an unsupported format."
        }
        BotError::UploadFailed(_) => "❌ Failed to upload your file. Please try again.",
        BotError::TranscriptionJobFailed { .. } => "❌ Transcription failed.",
        BotError::TranscriptionTimeout { .. } => {
            "⏳ Transcription is taking too long, so I stopped waiting. Please try again later."
        }
        BotError::Transcription(_) | BotError::DownloadFailed(_) => {
            "❌ Speech-to-text service is temporarily unavailable. Please try again later."
        }
        _ => "❌ An error occurred while processing your file. Please try again.",
    }
}

/// Turns a handler result into the reply text, logging failures with the
/// chat and asset they belong to.
pub fn outcome_text<T>(
    chat_id: ChatId,
    asset: &MediaAsset,
    result: &Result<T>,
    success: impl FnOnce(&T) -> String,
) -> String {
    match result {
        Ok(value) => success(value),
        Err(BotError::DestinationNotSet) => {
            warn!("Chat {} sent {} without setting a folder", chat_id, asset.id);
            user_message(&BotError::DestinationNotSet).to_string()
        }
        Err(e) => {
            error!("Chat {}: processing {} failed: {}", chat_id, asset.id, e);
            user_message(e).to_string()
        }
    }
}

pub fn photo_asset(msg: &Message) -> Option<MediaAsset> {
    // Sizes are ordered smallest first.
    let photo = msg.photo()?.last()?;
    Some(MediaAsset {
        id: photo.file.unique_id.clone(),
        file_ref: photo.file.id.clone(),
        format: "jpg".to_string(),
    })
}

pub fn audio_asset(msg: &Message) -> Option<MediaAsset> {
    if let Some(voice) = msg.voice() {
        return Some(MediaAsset {
            id: voice.file.unique_id.clone(),
            file_ref: voice.file.id.clone(),
            format: "ogg".to_string(),
        });
    }

    let clip = msg.audio()?;
    let format = clip
        .file_name
        .as_deref()
        .map(audio::get_file_extension)
        .filter(|ext| !ext.is_empty())
        .unwrap_or("mp3")
        .to_lowercase();
    Some(MediaAsset {
        id: clip.file.unique_id.clone(),
        file_ref: clip.file.id.clone(),
        format,
    })
}

/// Plain text that is not a command.
pub fn is_destination_text(msg: &Message) -> bool {
    msg.text().is_some_and(|text| !text.starts_with('/'))
}

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    relay: Arc<MediaRelay>,
) -> ResponseResult<()> {
    let text = match cmd {
        Command::Help => Command::descriptions().to_string(),
        Command::Start => {
            info!("Chat {} started the bot", msg.chat.id);
            "Send me a folder name to save files in.".to_string()
        }
        Command::Folder => folder_text(relay.destination(msg.chat.id).await),
    };
    reply(&bot, msg.chat.id, &text).await;
    Ok(())
}

fn folder_text(destination: Option<String>) -> String {
    match destination {
        Some(name) => format!("📁 Current folder: {}", name),
        None => "No folder set yet. Send me a folder name to save files in.".to_string(),
    }
}

pub async fn text_handler(bot: Bot, msg: Message, relay: Arc<MediaRelay>) -> ResponseResult<()> {
    let Some(name) = msg.text() else {
        return Ok(());
    };

    relay.set_destination(msg.chat.id, name.to_string()).await;
    let text = format!("Folder set to: {}. Now send me images or audio!", name);
    reply(&bot, msg.chat.id, &text).await;
    Ok(())
}

pub async fn photo_handler(bot: Bot, msg: Message, relay: Arc<MediaRelay>) -> ResponseResult<()> {
    let Some(asset) = photo_asset(&msg) else {
        return Ok(());
    };
    info!("Chat {} sent photo {}", msg.chat.id, asset.id);

    let result = relay.handle_photo(msg.chat.id, &asset).await;
    let text = outcome_text(msg.chat.id, &asset, &result, |key| {
        info!("Image uploaded successfully: {}", key);
        "Image uploaded".to_string()
    });
    reply(&bot, msg.chat.id, &text).await;
    Ok(())
}

pub async fn audio_handler(bot: Bot, msg: Message, relay: Arc<MediaRelay>) -> ResponseResult<()> {
    let Some(asset) = audio_asset(&msg) else {
        return Ok(());
    };
    info!("Chat {} sent audio {} ({})", msg.chat.id, asset.id, asset.format);

    let result = relay.handle_audio(msg.chat.id, &asset).await;
    let text = outcome_text(msg.chat.id, &asset, &result, |outcome| {
        info!(
            "Transcript for {} stored at {} after {} status checks",
            asset.id, outcome.transcript.document_key, outcome.transcript.polls
        );
        format!(
            "Transcription complete! Saved to {}",
            outcome.transcript.document_key
        )
    });
    reply(&bot, msg.chat.id, &text).await;
    Ok(())
}
