use super::AudioError;
use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;
use tokio::process::Command;

pub struct ConvertedAudio {
    pub size: u64,
    pub format: &'static str,
    pub channels: u8,
}

/// Turns a staged audio clip of any container into mono WAV.
#[async_trait]
pub trait AudioConverter: Send + Sync {
    async fn to_wav(&self, input: &Path, output: &Path) -> Result<ConvertedAudio, AudioError>;
}

/// Conversion through the `ffmpeg` binary on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegConverter;

#[async_trait]
impl AudioConverter for FfmpegConverter {
    async fn to_wav(&self, input: &Path, output: &Path) -> Result<ConvertedAudio, AudioError> {
        info!(
            "Converting {} ({} format) to mono WAV",
            input.display(),
            get_file_extension(&input.to_string_lossy())
        );

        if !is_ffmpeg_available().await {
            return Err(AudioError::FfmpegNotFound);
        }

        // Sample rate is left as-is; only the channel count is normalised.
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel").arg("error")
            .arg("-i").arg(input)
            .arg("-acodec").arg("pcm_s16le")
            .arg("-ac").arg("1")
            .arg("-f").arg("wav")
            .arg(output)
            .kill_on_drop(true);

        debug!("Running ffmpeg command: {:?}", cmd);

        let result = cmd
            .output()
            .await
            .map_err(|e| AudioError::ConversionFailed(format!("Failed to execute ffmpeg: {}", e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AudioError::ConversionFailed(format!("FFmpeg failed: {}", stderr.trim())));
        }

        let size = tokio::fs::metadata(output)
            .await
            .map_err(|e| AudioError::ConversionFailed(format!("Failed to read converted file: {}", e)))?
            .len();

        info!("Successfully converted audio to {} ({} bytes)", output.display(), size);

        Ok(ConvertedAudio {
            size,
            format: "wav",
            channels: 1,
        })
    }
}

pub fn get_file_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => "",
    }
}

async fn is_ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
