//! Configuration loading
//!
//! The DJ is configured from a single TOML file. Every key has a built-in
//! default, so a missing file (or a missing section) is not an error: the
//! service logs a warning and starts with defaults.
//!
//! # Config file resolution priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`AIDJ_CONFIG`)
//! 3. User config (`~/.config/aidj/config.toml`), then `/etc/aidj/config.toml`
//! 4. Compiled defaults
//!
//! Numeric thresholds that are product tuning rather than structure (BPM
//! split, energy bands, recognition confidence, suppression window) live
//! here rather than in code.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::models::Mood;
use crate::{DuckCurve, Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "AIDJ_CONFIG";

/// Complete DJ configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DjConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub sampler: SamplerConfig,
    pub selector: SelectorConfig,
    pub transition: TransitionConfig,
    pub announcer: AnnouncerConfig,
    pub timeline: TimelineConfig,
    pub recognition: RecognitionConfig,
    pub session: SessionConfig,
    pub collaborators: CollaboratorConfig,
}

/// HTTP control API
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5790,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides it
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Mood sampler timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Minimum time between analysis starts
    pub min_interval_secs: u64,
    /// Heartbeat tick that checks whether a sample is due
    pub heartbeat_ms: u64,
    /// Client-side timeout for one vision analysis call
    pub analysis_timeout_secs: u64,
    /// Wait after a failed analysis before the next attempt
    pub failure_backoff_secs: u64,
    /// Consecutive failures before the degraded indicator is raised
    pub degraded_after_failures: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 30,
            heartbeat_ms: 1000,
            analysis_timeout_secs: 15,
            failure_backoff_secs: 5,
            degraded_after_failures: 3,
        }
    }
}

impl SamplerConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms.max(1))
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_secs)
    }
}

/// Track selection thresholds
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Energy strictly above this keeps only tracks at or above `bpm_split`
    pub high_energy_threshold: u8,
    /// Energy strictly below this keeps only tracks at or below `bpm_split`
    pub low_energy_threshold: u8,
    pub bpm_split: u32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            high_energy_threshold: 80,
            low_energy_threshold: 50,
            bpm_split: 130,
        }
    }
}

/// Transition cycle timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Dwell after a swap before new mood changes are acted on
    pub settle_secs: u64,
    /// Longest wait for the announcement to start before swapping anyway
    pub announce_start_timeout_secs: u64,
    /// Client-side timeout for playback commands
    pub playback_timeout_secs: u64,
    /// Mood assumed before the first sample arrives
    pub initial_mood: Mood,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            settle_secs: 8,
            announce_start_timeout_secs: 10,
            playback_timeout_secs: 5,
            initial_mood: Mood::Neutral,
        }
    }
}

impl TransitionConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn announce_start_timeout(&self) -> Duration {
        Duration::from_secs(self.announce_start_timeout_secs)
    }

    pub fn playback_timeout(&self) -> Duration {
        Duration::from_secs(self.playback_timeout_secs)
    }
}

/// Announcement queue behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnnouncerConfig {
    /// Gap between consecutive announcements
    pub cooldown_ms: u64,
    /// Client-side timeout for one synthesis call
    pub synthesis_timeout_secs: u64,
    /// Longest an utterance may play before it is stopped
    pub max_utterance_secs: u64,
    /// Pending items beyond this are rejected
    pub max_queue_len: usize,
    /// Music volume while speaking (0.0-1.0)
    pub duck_volume: f32,
    /// Music volume otherwise (0.0-1.0)
    pub normal_volume: f32,
    /// Number of volume steps per duck/restore ramp (0 = jump)
    pub duck_steps: usize,
    /// Total ramp length
    pub duck_ramp_ms: u64,
    pub duck_curve: DuckCurve,
    /// Voice name handed to both speech engines
    pub voice: String,
    pub speaking_rate: f32,
}

impl Default for AnnouncerConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 1500,
            synthesis_timeout_secs: 20,
            max_utterance_secs: 60,
            max_queue_len: 32,
            duck_volume: 0.3,
            normal_volume: 1.0,
            duck_steps: 4,
            duck_ramp_ms: 400,
            duck_curve: DuckCurve::SCurve,
            voice: "alloy".to_string(),
            speaking_rate: 1.0,
        }
    }
}

impl AnnouncerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    pub fn max_utterance(&self) -> Duration {
        Duration::from_secs(self.max_utterance_secs)
    }
}

/// Event timeline polling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Sub-second poller period
    pub poll_ms: u64,
    /// Delay between a moment's announcement and its music cue
    pub moment_cue_delay_secs: u64,
    /// Speak a short line when a new phase begins
    pub announce_phase_changes: bool,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            poll_ms: 500,
            moment_cue_delay_secs: 4,
            announce_phase_changes: true,
        }
    }
}

impl TimelineConfig {
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }

    pub fn moment_cue_delay(&self) -> Duration {
        Duration::from_secs(self.moment_cue_delay_secs)
    }
}

/// VIP face recognition
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    /// Matches below this confidence (0-100) are discarded
    pub confidence_threshold: u8,
    /// Minimum gap between repeat announcements for one guest
    pub suppression_window_secs: u64,
    /// Consecutive failures before the degraded indicator is raised
    pub degraded_after_failures: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
            timeout_secs: 10,
            confidence_threshold: 75,
            suppression_window_secs: 120,
            degraded_after_failures: 3,
        }
    }
}

impl RecognitionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn suppression_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.suppression_window_secs as i64)
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// EventBus capacity
    pub event_capacity: usize,
    /// Longest `stop()` waits for loops to exit
    pub shutdown_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
            shutdown_timeout_secs: 5,
        }
    }
}

impl SessionConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Endpoints of the external collaborators
///
/// Unset URLs disable the matching HTTP adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    /// Camera snapshot endpoint returning one encoded frame
    pub frame_url: Option<String>,
    pub vision_url: Option<String>,
    pub face_url: Option<String>,
    /// OpenAI-compatible speech base URL (`{url}/audio/speech`)
    pub tts_url: Option<String>,
    pub tts_model: String,
    /// Environment variable holding the speech API key
    pub tts_api_key_env: String,
    /// Player service base URL
    pub playback_url: Option<String>,
    /// Local speech command for the fallback engine
    pub local_tts_command: String,
    /// Command that plays a synthesized audio file (path appended)
    pub audio_player_command: String,
    pub request_timeout_secs: u64,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            frame_url: None,
            vision_url: None,
            face_url: None,
            tts_url: None,
            tts_model: "tts-1".to_string(),
            tts_api_key_env: "AIDJ_TTS_API_KEY".to_string(),
            playback_url: None,
            local_tts_command: "espeak-ng".to_string(),
            audio_player_command: "ffplay -nodisp -autoexit -loglevel quiet".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl CollaboratorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl DjConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DjConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values that would make the loops misbehave
    pub fn validate(&self) -> Result<()> {
        let s = &self.selector;
        if s.low_energy_threshold > s.high_energy_threshold {
            return Err(Error::Config(format!(
                "selector.low_energy_threshold ({}) exceeds high_energy_threshold ({})",
                s.low_energy_threshold, s.high_energy_threshold
            )));
        }
        if s.high_energy_threshold > 100 {
            return Err(Error::Config(
                "selector.high_energy_threshold must be 0-100".to_string(),
            ));
        }
        if self.recognition.confidence_threshold > 100 {
            return Err(Error::Config(
                "recognition.confidence_threshold must be 0-100".to_string(),
            ));
        }
        let a = &self.announcer;
        for (name, value) in [("duck_volume", a.duck_volume), ("normal_volume", a.normal_volume)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "announcer.{} must be 0.0-1.0, got {}",
                    name, value
                )));
            }
        }
        if a.max_queue_len == 0 {
            return Err(Error::Config("announcer.max_queue_len must be > 0".to_string()));
        }
        if self.session.event_capacity == 0 {
            return Err(Error::Config("session.event_capacity must be > 0".to_string()));
        }
        Ok(())
    }

    /// Resolve and load configuration per the priority order above
    ///
    /// A missing file at any automatic location falls through to defaults
    /// with a warning. A file named explicitly (CLI or env) must exist.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_path) {
            ConfigSource::Explicit(path) => {
                info!("Loading configuration from {}", path.display());
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(&path)
            }
            ConfigSource::Discovered(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            ConfigSource::Defaults => {
                warn!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named on the command line or via `AIDJ_CONFIG`
    Explicit(PathBuf),
    /// Found at a platform default location
    Discovered(PathBuf),
    Defaults,
}

/// Apply the resolution priority without reading the file
pub fn resolve_config_path(cli_path: Option<&Path>) -> ConfigSource {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return ConfigSource::Explicit(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return ConfigSource::Explicit(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config locations
    for candidate in default_config_locations() {
        if candidate.exists() {
            return ConfigSource::Discovered(candidate);
        }
    }

    // Priority 4: Compiled defaults
    ConfigSource::Defaults
}

/// Platform config file candidates, most specific first
fn default_config_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("aidj").join("config.toml"));
    }
    if cfg!(unix) {
        locations.push(PathBuf::from("/etc/aidj/config.toml"));
    }
    locations
}
