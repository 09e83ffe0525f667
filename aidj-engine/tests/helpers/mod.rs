//! Test helpers for aidj-engine integration tests
//!
//! Scripted stand-ins for every external collaborator:
//! - ScriptedFrames / ScriptedVision: frames and mood analysis
//! - MockSpeech: speech engine that records what it spoke and overlap
//! - RecordingPlayback: playback sink that records commands
//! - FixedFaces: face recognizer with a fixed match list

#![allow(dead_code)]

use aidj_common::config::DjConfig;
use aidj_common::events::{DjEvent, EventBus};
use aidj_common::models::{GuestId, Mood, Track, TrackId, VipGuest};
use aidj_engine::collaborators::{
    Collaborators, FaceMatch, FaceRecognizer, Frame, FrameProvider, PlaybackSink, SpeechEngine,
    Utterance, VisionAnalysis, VisionAnalyzer, VoiceParams,
};
use aidj_engine::error::{
    AnalysisError, FrameError, PlaybackError, RecognitionError, SynthesisError,
};
use aidj_engine::TrackCatalog;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fixtures
// ============================================================================

pub fn track(id: &str, bpm: u32, genre: &str) -> Track {
    Track {
        id: TrackId::new(id),
        title: format!("Title {}", id),
        artist: "Test Artist".to_string(),
        duration_sec: 200,
        bpm,
        genre: genre.to_string(),
        source_ref: format!("file:///music/{}.mp3", id),
        license: Default::default(),
    }
}

/// Small catalog with curation for excited and chill
pub fn catalog() -> Arc<TrackCatalog> {
    let catalog = TrackCatalog::from_tracks(vec![
        track("ex1", 135, "edm"),
        track("ex2", 140, "edm"),
        track("ex3", 150, "edm"),
        track("ex4", 160, "edm"),
        track("ch1", 80, "lounge"),
        track("ch2", 95, "lounge"),
        track("pop1", 120, "pop"),
    ]);
    let excited: Vec<TrackId> = ["ex1", "ex2", "ex3", "ex4"].iter().map(|&i| TrackId::new(i)).collect();
    let chill: Vec<TrackId> = ["ch1", "ch2"].iter().map(|&i| TrackId::new(i)).collect();
    catalog.curate(Mood::Excited, excited.iter());
    catalog.curate(Mood::Chill, chill.iter());
    Arc::new(catalog)
}

/// Default config with short, test-friendly timings
pub fn test_config() -> DjConfig {
    let mut config = DjConfig::default();
    config.announcer.cooldown_ms = 500;
    config.announcer.duck_ramp_ms = 40;
    config.transition.settle_secs = 2;
    config.session.shutdown_timeout_secs = 2;
    config
}

/// Drain everything currently buffered on a bus subscription
pub fn drain(rx: &mut broadcast::Receiver<DjEvent>) -> Vec<DjEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

pub fn count_type(events: &[DjEvent], event_type: &str) -> usize {
    events.iter().filter(|e| e.event_type() == event_type).count()
}

// ============================================================================
// Frames & vision
// ============================================================================

pub struct ScriptedFrames;

#[async_trait]
impl FrameProvider for ScriptedFrames {
    async fn current_frame(&self) -> Result<Frame, FrameError> {
        Ok(Frame {
            bytes: vec![0xFF, 0xD8, 0xFF],
            mime_type: "image/jpeg".to_string(),
            captured_at: chrono::Utc::now(),
        })
    }
}

/// Vision analyzer that replays scripted results
///
/// Once the script runs out the last entry repeats. Tracks how many calls
/// are outstanding at once.
pub struct ScriptedVision {
    script: Mutex<VecDeque<Result<(&'static str, f64), ()>>>,
    last: Mutex<Result<(&'static str, f64), ()>>,
    latency: Duration,
    calls: AtomicUsize,
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
}

impl ScriptedVision {
    pub fn new(script: Vec<Result<(&'static str, f64), ()>>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(Ok(("neutral", 50.0))),
            latency,
            calls: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
            max_outstanding: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding.load(Ordering::SeqCst)
    }

    pub fn push(&self, entry: Result<(&'static str, f64), ()>) {
        self.script.lock().unwrap().push_back(entry);
    }
}

struct Outstanding<'a>(&'a AtomicUsize);

impl Drop for Outstanding<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VisionAnalyzer for ScriptedVision {
    async fn analyze(&self, _frame: &Frame) -> Result<VisionAnalysis, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_outstanding.fetch_max(now, Ordering::SeqCst);
        let _outstanding = Outstanding(&self.outstanding);

        tokio::time::sleep(self.latency).await;

        let entry = {
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = next {
                *last = next;
            }
            *last
        };
        match entry {
            Ok((mood, energy)) => Ok(VisionAnalysis {
                mood: mood.to_string(),
                energy_score: energy,
                crowd_count: 25,
                confidence: 85.0,
            }),
            Err(()) => Err(AnalysisError::Transport("connection reset".to_string())),
        }
    }
}

// ============================================================================
// Speech
// ============================================================================

/// Audio handle that plays for a fixed duration unless stopped
pub struct MockUtterance {
    duration: Duration,
    stop: CancellationToken,
    stopped: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
}

#[async_trait]
impl Utterance for MockUtterance {
    async fn finished(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.duration) => {}
            _ = self.stop.cancelled() => {}
        }
    }

    fn stop(&self) {
        if !self.stop.is_cancelled() {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
        self.stop.cancel();
    }
}

impl Drop for MockUtterance {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockSpeech {
    name: String,
    pub fail: AtomicBool,
    duration: Duration,
    spoken: Mutex<Vec<String>>,
    stopped: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: AtomicUsize,
}

impl MockSpeech {
    pub fn new(name: &str, duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: AtomicBool::new(false),
            duration,
            spoken: Mutex::new(Vec::new()),
            stopped: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        let engine = Self::new(name, Duration::from_secs(1));
        engine.fail.store(true, Ordering::SeqCst);
        engine
    }

    /// Texts in the order they started
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechEngine for MockSpeech {
    fn name(&self) -> &str {
        &self.name
    }

    async fn speak(
        &self,
        text: &str,
        _params: &VoiceParams,
    ) -> Result<Arc<dyn Utterance>, SynthesisError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SynthesisError::Quota("quota exceeded".to_string()));
        }
        self.spoken.lock().unwrap().push(text.to_string());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        Ok(Arc::new(MockUtterance {
            duration: self.duration,
            stop: CancellationToken::new(),
            stopped: Arc::clone(&self.stopped),
            active: Arc::clone(&self.active),
        }))
    }
}

// ============================================================================
// Playback
// ============================================================================

#[derive(Default)]
pub struct RecordingPlayback {
    played: Mutex<Vec<TrackId>>,
    volumes: Mutex<Vec<f32>>,
    stops: AtomicUsize,
    pub fail: AtomicBool,
}

impl RecordingPlayback {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn played(&self) -> Vec<TrackId> {
        self.played.lock().unwrap().clone()
    }

    pub fn volumes(&self) -> Vec<f32> {
        self.volumes.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaybackSink for RecordingPlayback {
    async fn play(&self, track: &Track) -> Result<(), PlaybackError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PlaybackError::Rejected(503, "player offline".to_string()));
        }
        self.played.lock().unwrap().push(track.id.clone());
        Ok(())
    }

    async fn stop(&self) -> Result<(), PlaybackError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_volume(&self, level: f32) -> Result<(), PlaybackError> {
        self.volumes.lock().unwrap().push(level);
        Ok(())
    }
}

// ============================================================================
// Faces
// ============================================================================

pub struct FixedFaces(pub Vec<(&'static str, f64)>);

#[async_trait]
impl FaceRecognizer for FixedFaces {
    async fn recognize(
        &self,
        _frame: &Frame,
        guests: &[VipGuest],
    ) -> Result<Vec<FaceMatch>, RecognitionError> {
        Ok(self
            .0
            .iter()
            .filter(|(id, _)| guests.iter().any(|g| g.id.0 == *id))
            .map(|(id, confidence)| FaceMatch {
                guest_id: GuestId::new(*id),
                confidence: *confidence,
            })
            .collect())
    }
}

// ============================================================================
// Assembled collaborator sets
// ============================================================================

pub struct Mocks {
    pub vision: Arc<ScriptedVision>,
    pub primary: Arc<MockSpeech>,
    pub fallback: Arc<MockSpeech>,
    pub playback: Arc<RecordingPlayback>,
}

impl Mocks {
    pub fn new(vision: Arc<ScriptedVision>) -> Self {
        Self {
            vision,
            primary: MockSpeech::new("primary", Duration::from_secs(3)),
            fallback: MockSpeech::new("fallback", Duration::from_secs(3)),
            playback: RecordingPlayback::new(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            frames: Some(Arc::new(ScriptedFrames)),
            vision: Some(self.vision.clone()),
            faces: None,
            primary_speech: self.primary.clone(),
            fallback_speech: Some(self.fallback.clone()),
            playback: self.playback.clone(),
        }
    }
}

pub fn bus() -> EventBus {
    EventBus::new(1024)
}
