use super::TranscribeError;
use serde::Deserialize;

#[derive(Deserialize)]
struct TranscriptOutput {
    results: TranscriptResults,
}

#[derive(Deserialize)]
struct TranscriptResults {
    #[serde(default)]
    transcripts: Vec<Transcript>,
}

#[derive(Deserialize)]
struct Transcript {
    transcript: String,
}

/// Extracts the primary transcript text from a job's JSON result.
pub fn primary_transcript(data: &[u8]) -> Result<String, TranscribeError> {
    let output: TranscriptOutput = serde_json::from_slice(data)
        .map_err(|e| TranscribeError::InvalidResponse(format!("Malformed transcript: {}", e)))?;

    output
        .results
        .transcripts
        .into_iter()
        .next()
        .map(|t| t.transcript)
        .ok_or_else(|| TranscribeError::InvalidResponse("Transcript result is empty".to_string()))
}
