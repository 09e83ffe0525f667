//! External collaborator contracts
//!
//! The DJ core never talks to a camera, a vision model, a speech vendor or
//! an audio player directly. It calls these traits, and every call is
//! wrapped in a client-side timeout by the caller so a stalled collaborator
//! cannot stall the other loops.
//!
//! Concrete adapters:
//! - [`http`]: JSON-over-HTTP clients for vision, face recognition,
//!   OpenAI-compatible speech, frame snapshots and a remote player
//! - [`local_speech`]: command-line speech engine (espeak-ng) used as fallback
//! - [`file_catalog`]: JSON file track catalog

pub mod file_catalog;
pub mod http;
pub mod local_speech;

use async_trait::async_trait;
use aidj_common::config::CollaboratorConfig;
use aidj_common::models::{GuestId, Mood, Track, VipGuest};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{
    AnalysisError, CatalogError, FrameError, PlaybackError, RecognitionError, SynthesisError,
};

pub use file_catalog::FileCatalogProvider;
pub use local_speech::{CommandSpeechEngine, ProcessUtterance};

/// One encoded camera frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub bytes: Vec<u8>,
    /// MIME type of `bytes` (e.g. `image/jpeg`)
    pub mime_type: String,
    pub captured_at: DateTime<Utc>,
}

/// Raw vision collaborator response
///
/// Values are unvalidated; the mood sampler maps `mood` through the
/// emotion table and clamps the numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionAnalysis {
    pub mood: String,
    pub energy_score: f64,
    pub crowd_count: i64,
    pub confidence: f64,
}

/// One face match reported by the recognizer
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMatch {
    pub guest_id: GuestId,
    /// 0-100
    pub confidence: f64,
}

/// Voice selection handed to every speech engine
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceParams {
    pub voice: String,
    /// 1.0 = normal speed
    pub rate: f32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            voice: "alloy".to_string(),
            rate: 1.0,
        }
    }
}

/// Source of the current video frame
#[async_trait]
pub trait FrameProvider: Send + Sync {
    async fn current_frame(&self) -> Result<Frame, FrameError>;
}

/// Crowd mood analysis
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// Analyze one frame
    ///
    /// Content that cannot be interpreted is not an error: adapters return a
    /// response whose mood label is unknown, which the sampler turns into a
    /// neutral low-confidence sample.
    async fn analyze(&self, frame: &Frame) -> Result<VisionAnalysis, AnalysisError>;
}

/// VIP face recognition
///
/// Returns every match the collaborator reports; the confidence threshold is
/// applied by the caller.
#[async_trait]
pub trait FaceRecognizer: Send + Sync {
    async fn recognize(
        &self,
        frame: &Frame,
        guests: &[VipGuest],
    ) -> Result<Vec<FaceMatch>, RecognitionError>;
}

/// Handle to audio that has started playing
#[async_trait]
pub trait Utterance: Send + Sync {
    /// Resolves once playback has ended (naturally or via `stop`)
    async fn finished(&self);

    /// Stop output immediately; must not block
    fn stop(&self);
}

/// Text-to-speech engine
///
/// Primary and fallback engines share this contract so either can stand in
/// for the other.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Engine identifier used in logs and announcement outcomes
    fn name(&self) -> &str;

    /// Synthesize `text` and start playing it
    async fn speak(
        &self,
        text: &str,
        params: &VoiceParams,
    ) -> Result<Arc<dyn Utterance>, SynthesisError>;
}

/// Source the track catalog is populated from
#[async_trait]
pub trait TrackCatalogProvider: Send + Sync {
    /// All tracks, optionally restricted to one genre
    async fn list(&self, genre: Option<&str>) -> Result<Vec<Track>, CatalogError>;

    async fn search(&self, query: &str) -> Result<Vec<Track>, CatalogError>;

    /// Tracks explicitly curated for a mood
    ///
    /// Providers without curation data fall back to a search on the mood name.
    async fn curated(&self, mood: Mood) -> Result<Vec<Track>, CatalogError> {
        self.search(mood.as_str()).await
    }
}

/// External audio player
///
/// The core only issues commands; it never reads playback position back.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    async fn play(&self, track: &Track) -> Result<(), PlaybackError>;

    async fn stop(&self) -> Result<(), PlaybackError>;

    /// Music volume, 0.0-1.0
    async fn set_volume(&self, level: f32) -> Result<(), PlaybackError>;
}

/// Playback sink for deployments where the surrounding application plays
/// music itself from `TrackChangeRequested` events
#[derive(Debug, Default)]
pub struct EventOnlyPlayback;

#[async_trait]
impl PlaybackSink for EventOnlyPlayback {
    async fn play(&self, track: &Track) -> Result<(), PlaybackError> {
        info!("Track change left to event subscribers: {}", track.label());
        Ok(())
    }

    async fn stop(&self) -> Result<(), PlaybackError> {
        Ok(())
    }

    async fn set_volume(&self, _level: f32) -> Result<(), PlaybackError> {
        Ok(())
    }
}

/// The collaborators one DJ session runs against
///
/// `None` disables the loop that needs the collaborator: no frame source or
/// vision analyzer means no mood sampling, no face recognizer means no VIP
/// recognition.
#[derive(Clone)]
pub struct Collaborators {
    pub frames: Option<Arc<dyn FrameProvider>>,
    pub vision: Option<Arc<dyn VisionAnalyzer>>,
    pub faces: Option<Arc<dyn FaceRecognizer>>,
    pub primary_speech: Arc<dyn SpeechEngine>,
    pub fallback_speech: Option<Arc<dyn SpeechEngine>>,
    pub playback: Arc<dyn PlaybackSink>,
}

impl Collaborators {
    /// Build the adapters named in the `[collaborators]` config section
    ///
    /// Without a speech URL the local command engine becomes primary and
    /// there is no fallback.
    pub fn from_config(config: &CollaboratorConfig) -> Result<Self, crate::Error> {
        let timeout = config.request_timeout();
        let client = http::build_client(timeout)?;

        let frames = config.frame_url.as_ref().map(|url| {
            Arc::new(http::HttpFrameProvider::new(client.clone(), url)) as Arc<dyn FrameProvider>
        });
        let vision = config.vision_url.as_ref().map(|url| {
            Arc::new(http::HttpVisionAnalyzer::new(client.clone(), url)) as Arc<dyn VisionAnalyzer>
        });
        let faces = config.face_url.as_ref().map(|url| {
            Arc::new(http::HttpFaceRecognizer::new(client.clone(), url)) as Arc<dyn FaceRecognizer>
        });

        let local: Arc<dyn SpeechEngine> =
            Arc::new(CommandSpeechEngine::from_command_line(&config.local_tts_command)?);

        let (primary_speech, fallback_speech) = match &config.tts_url {
            Some(url) => {
                let api_key = std::env::var(&config.tts_api_key_env).unwrap_or_else(|_| {
                    warn!(
                        "{} not set, speech requests will be sent without credentials",
                        config.tts_api_key_env
                    );
                    String::new()
                });
                let engine = http::HttpSpeechEngine::new(
                    client.clone(),
                    url,
                    api_key,
                    &config.tts_model,
                    &config.audio_player_command,
                )?;
                (Arc::new(engine) as Arc<dyn SpeechEngine>, Some(local))
            }
            None => {
                info!("No speech URL configured, using {} as the only speech engine", local.name());
                (local, None)
            }
        };

        let playback: Arc<dyn PlaybackSink> = match &config.playback_url {
            Some(url) => Arc::new(http::HttpPlaybackSink::new(client, url)),
            None => {
                info!("No playback URL configured, track changes are published as events only");
                Arc::new(EventOnlyPlayback)
            }
        };

        Ok(Self {
            frames,
            vision,
            faces,
            primary_speech,
            fallback_speech,
            playback,
        })
    }
}
