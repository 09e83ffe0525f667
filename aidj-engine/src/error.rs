//! Error types for aidj-engine
//!
//! Collaborator failures each have their own error type. They are caught at
//! the call site inside the DJ loops and turned into "no state change"; only
//! the session API and the HTTP layer surface the top-level [`Error`].

use std::time::Duration;
use thiserror::Error;

/// A camera frame could not be obtained
#[derive(Error, Debug, Clone)]
pub enum FrameError {
    #[error("No frame source configured")]
    Unavailable,

    #[error("Frame source error: {0}")]
    Source(String),
}

/// Vision analysis collaborator failure (recoverable, prior mood retained)
#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    #[error("Vision analysis timed out after {0:?}")]
    Timeout(Duration),

    #[error("Vision analysis quota exceeded: {0}")]
    Quota(String),

    #[error("Vision analysis request failed: {0}")]
    Transport(String),

    #[error("Vision analysis returned an error {0}: {1}")]
    Api(u16, String),

    #[error("Frame unavailable: {0}")]
    Frame(#[from] FrameError),
}

/// Face recognition collaborator failure
#[derive(Error, Debug, Clone)]
pub enum RecognitionError {
    #[error("Face recognition timed out after {0:?}")]
    Timeout(Duration),

    #[error("Face recognition request failed: {0}")]
    Transport(String),

    #[error("Face recognition returned an error {0}: {1}")]
    Api(u16, String),

    #[error("Could not parse face recognition response: {0}")]
    Parse(String),

    #[error("Frame unavailable: {0}")]
    Frame(#[from] FrameError),
}

/// Speech synthesis failure (recoverable via the fallback engine)
#[derive(Error, Debug, Clone)]
pub enum SynthesisError {
    #[error("Speech synthesis timed out after {0:?}")]
    Timeout(Duration),

    #[error("Speech synthesis quota exceeded: {0}")]
    Quota(String),

    #[error("Speech engine unavailable: {0}")]
    Unavailable(String),

    #[error("Speech synthesis request failed: {0}")]
    Transport(String),

    #[error("Speech synthesis returned an error {0}: {1}")]
    Api(u16, String),

    #[error("Could not play synthesized audio: {0}")]
    Output(String),
}

/// Playback sink command failure
#[derive(Error, Debug, Clone)]
pub enum PlaybackError {
    #[error("Playback command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Playback request failed: {0}")]
    Transport(String),

    #[error("Player rejected command {0}: {1}")]
    Rejected(u16, String),
}

/// Track catalog provider failure
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Catalog provider error: {0}")]
    Provider(String),
}

/// Announcement could not be queued
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Announcement queue is closed")]
    Closed,

    #[error("Announcement queue is full ({0} pending)")]
    Full(usize),

    #[error("Announcement text is empty")]
    EmptyText,
}

/// No track satisfies any filter tier (only when the catalog is empty)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("No track available for selection")]
pub struct SelectionExhausted;

/// Main error type for aidj-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Shared library errors (config, JSON, I/O)
    #[error(transparent)]
    Common(#[from] aidj_common::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Selection(#[from] SelectionExhausted),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using aidj-engine Error
pub type Result<T> = std::result::Result<T, Error>;
