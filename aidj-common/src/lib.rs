//! # AI DJ Common Library
//!
//! Shared code for the AI DJ crates including:
//! - Data model (tracks, mood samples, announcements, event plans, VIP guests)
//! - Event types (DjEvent enum) and the EventBus
//! - Configuration loading
//! - Music ducking curves
//! - Timestamp and SSE helpers

pub mod config;
pub mod ducking;
pub mod error;
pub mod events;
pub mod models;
pub mod sse;
pub mod time;

pub use ducking::DuckCurve;
pub use error::{Error, Result};
