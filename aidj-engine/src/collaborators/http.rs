//! HTTP collaborator adapters
//!
//! JSON-over-HTTP clients for the vendor-neutral collaborator contracts.
//! Status 429 maps to the quota variant of each error type so logs can tell
//! rate limiting apart from outages.

use async_trait::async_trait;
use aidj_common::models::{GuestId, Track, VipGuest};
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tracing::debug;

use super::local_speech::{fill_placeholder, split_command_line, ProcessUtterance};
use super::{
    FaceMatch, FaceRecognizer, Frame, FrameProvider, PlaybackSink, SpeechEngine, Utterance,
    VisionAnalysis, VisionAnalyzer, VoiceParams,
};
use crate::error::{
    AnalysisError, FrameError, PlaybackError, RecognitionError, SynthesisError,
};

const USER_AGENT: &str = concat!("aidj/", env!("CARGO_PKG_VERSION"));

/// Energy assumed when the vision response carries no usable score
const DEFAULT_ENERGY: f64 = 50.0;

/// Shared reqwest client for every adapter
pub fn build_client(timeout: Duration) -> Result<Client, crate::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| crate::Error::Internal(format!("HTTP client: {}", e)))
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

async fn error_body(response: Response) -> String {
    response.text().await.unwrap_or_default()
}

/// Frame as sent to vision and face collaborators
fn frame_payload(frame: &Frame) -> Value {
    json!({
        "image": general_purpose::STANDARD.encode(&frame.bytes),
        "mimeType": frame.mime_type,
        "capturedAt": frame.captured_at,
    })
}

// ============================================================================
// Frames
// ============================================================================

/// Fetches the latest camera snapshot with `GET {url}`
pub struct HttpFrameProvider {
    client: Client,
    url: String,
}

impl HttpFrameProvider {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl FrameProvider for HttpFrameProvider {
    async fn current_frame(&self) -> Result<Frame, FrameError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FrameError::Source(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FrameError::Source(format!("HTTP {}", response.status())));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FrameError::Source(e.to_string()))?;

        if bytes.is_empty() {
            return Err(FrameError::Source("empty frame".to_string()));
        }

        Ok(Frame {
            bytes: bytes.to_vec(),
            mime_type,
            captured_at: chrono::Utc::now(),
        })
    }
}

// ============================================================================
// Vision analysis
// ============================================================================

/// Posts the frame to `{url}` and reads `{mood, energyScore, crowdCount, confidence}`
pub struct HttpVisionAnalyzer {
    client: Client,
    url: String,
}

impl HttpVisionAnalyzer {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

/// Interpret a vision response body leniently
///
/// Missing or malformed fields become defaults and an unreadable body
/// becomes an empty mood label, which the sampler maps to neutral.
pub fn parse_vision_body(body: &str) -> VisionAnalysis {
    let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let number = |key: &str| value.get(key).and_then(Value::as_f64);

    VisionAnalysis {
        mood: value
            .get("mood")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        energy_score: number("energyScore").unwrap_or(DEFAULT_ENERGY),
        crowd_count: number("crowdCount").map(|c| c as i64).unwrap_or(0),
        confidence: number("confidence").unwrap_or(0.0),
    }
}

#[async_trait]
impl VisionAnalyzer for HttpVisionAnalyzer {
    async fn analyze(&self, frame: &Frame) -> Result<VisionAnalysis, AnalysisError> {
        let response = self
            .client
            .post(&self.url)
            .json(&frame_payload(frame))
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AnalysisError::Quota(error_body(response).await));
        }
        if !status.is_success() {
            return Err(AnalysisError::Api(status.as_u16(), error_body(response).await));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        let analysis = parse_vision_body(&body);
        debug!(mood = %analysis.mood, energy = analysis.energy_score, "Vision analysis received");
        Ok(analysis)
    }
}

// ============================================================================
// Face recognition
// ============================================================================

/// Posts the frame plus the roster to `{url}` and reads `{matches: [{guestId, confidence}]}`
pub struct HttpFaceRecognizer {
    client: Client,
    url: String,
}

impl HttpFaceRecognizer {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaceResponse {
    #[serde(default)]
    matches: Vec<FaceMatchBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaceMatchBody {
    guest_id: String,
    confidence: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RosterEntry<'a> {
    id: &'a GuestId,
    name: &'a str,
    reference_image: &'a str,
}

#[async_trait]
impl FaceRecognizer for HttpFaceRecognizer {
    async fn recognize(
        &self,
        frame: &Frame,
        guests: &[VipGuest],
    ) -> Result<Vec<FaceMatch>, RecognitionError> {
        let roster: Vec<RosterEntry> = guests
            .iter()
            .map(|g| RosterEntry {
                id: &g.id,
                name: &g.name,
                reference_image: &g.reference_image,
            })
            .collect();
        let mut payload = frame_payload(frame);
        payload["guests"] = json!(roster);

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecognitionError::Api(status.as_u16(), error_body(response).await));
        }

        let body: FaceResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::Parse(e.to_string()))?;

        Ok(body
            .matches
            .into_iter()
            .map(|m| FaceMatch {
                guest_id: GuestId::new(m.guest_id),
                confidence: m.confidence,
            })
            .collect())
    }
}

// ============================================================================
// Speech synthesis
// ============================================================================

/// OpenAI-compatible speech engine (`POST {base}/audio/speech`)
///
/// The returned audio is written to a temp file and played with the
/// configured player command; the file lives until playback ends.
pub struct HttpSpeechEngine {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    player_program: String,
    player_args: Vec<String>,
}

impl HttpSpeechEngine {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: String,
        model: &str,
        player_command: &str,
    ) -> Result<Self, crate::Error> {
        let (player_program, player_args) = split_command_line(player_command).ok_or_else(|| {
            aidj_common::Error::Config("collaborators.audio_player_command is empty".to_string())
        })?;
        Ok(Self {
            client,
            base_url: trim_url(base_url),
            api_key,
            model: model.to_string(),
            player_program,
            player_args,
        })
    }

    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<Vec<u8>, SynthesisError> {
        let url = format!("{}/audio/speech", self.base_url);
        let body = json!({
            "model": self.model,
            "input": text,
            "voice": params.voice,
            "speed": params.rate,
            "response_format": "mp3",
        });

        let mut request = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SynthesisError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SynthesisError::Quota(error_body(response).await));
        }
        if !status.is_success() {
            return Err(SynthesisError::Api(status.as_u16(), error_body(response).await));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Transport(e.to_string()))?;
        if audio.is_empty() {
            return Err(SynthesisError::Api(status.as_u16(), "empty audio".to_string()));
        }
        Ok(audio.to_vec())
    }
}

/// Write synthesized audio to a temp file that lives as long as the path
fn write_temp_audio(audio: &[u8]) -> std::io::Result<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix("aidj-speech-")
        .suffix(".mp3")
        .tempfile()?;
    file.write_all(audio)?;
    file.flush()?;
    Ok(file.into_temp_path())
}

#[async_trait]
impl SpeechEngine for HttpSpeechEngine {
    fn name(&self) -> &str {
        "http"
    }

    async fn speak(
        &self,
        text: &str,
        params: &VoiceParams,
    ) -> Result<Arc<dyn Utterance>, SynthesisError> {
        let audio = self.synthesize(text, params).await?;

        let path = tokio::task::spawn_blocking(move || write_temp_audio(&audio))
            .await
            .map_err(|e| SynthesisError::Output(e.to_string()))?
            .map_err(|e| SynthesisError::Output(e.to_string()))?;

        let path_arg = path.to_string_lossy().to_string();
        let args = fill_placeholder(&self.player_args, "{path}", &path_arg);
        let utterance = ProcessUtterance::spawn(&self.player_program, &args, path)
            .map_err(|e| SynthesisError::Output(format!("{}: {}", self.player_program, e)))?;
        Ok(utterance as Arc<dyn Utterance>)
    }
}

// ============================================================================
// Playback
// ============================================================================

/// Remote player controlled via `POST {base}/play`, `/stop` and `/volume`
pub struct HttpPlaybackSink {
    client: Client,
    base_url: String,
}

impl HttpPlaybackSink {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: trim_url(base_url),
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<(), PlaybackError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlaybackError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlaybackError::Rejected(status.as_u16(), error_body(response).await));
        }
        Ok(())
    }
}

#[async_trait]
impl PlaybackSink for HttpPlaybackSink {
    async fn play(&self, track: &Track) -> Result<(), PlaybackError> {
        self.post("/play", json!({ "track": track })).await
    }

    async fn stop(&self) -> Result<(), PlaybackError> {
        self.post("/stop", json!({})).await
    }

    async fn set_volume(&self, level: f32) -> Result<(), PlaybackError> {
        self.post("/volume", json!({ "level": level.clamp(0.0, 1.0) })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vision_body_full() {
        let a = parse_vision_body(
            r#"{"mood":"joy","energyScore":82.5,"crowdCount":40,"confidence":91}"#,
        );
        assert_eq!(a.mood, "joy");
        assert_eq!(a.energy_score, 82.5);
        assert_eq!(a.crowd_count, 40);
        assert_eq!(a.confidence, 91.0);
    }

    #[test]
    fn test_parse_vision_body_garbage_is_neutral_material() {
        let a = parse_vision_body("I think the crowd looks happy!");
        assert!(a.mood.is_empty());
        assert_eq!(a.energy_score, DEFAULT_ENERGY);
        assert_eq!(a.confidence, 0.0);
    }

    #[test]
    fn test_temp_audio_removed_with_path() {
        let path = write_temp_audio(b"ID3 fake mp3").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"ID3 fake mp3");
        let on_disk = path.to_path_buf();
        drop(path);
        assert!(!on_disk.exists());
    }

    #[test]
    fn test_frame_payload_is_base64() {
        let frame = Frame {
            bytes: vec![0xff, 0xd8, 0xff],
            mime_type: "image/jpeg".to_string(),
            captured_at: chrono::Utc::now(),
        };
        let payload = frame_payload(&frame);
        assert_eq!(payload["image"], "/9j/");
        assert_eq!(payload["mimeType"], "image/jpeg");
    }

    #[test]
    fn test_speech_engine_requires_player() {
        let client = build_client(Duration::from_secs(1)).unwrap();
        assert!(HttpSpeechEngine::new(client, "http://tts", String::new(), "tts-1", " ").is_err());
    }
}
