//! # AI DJ Engine (aidj-engine)
//!
//! Orchestration core for a live-event DJ: samples crowd mood, picks and
//! swaps tracks, speaks announcements, and follows the event timeline.
//!
//! **Architecture:** independently scheduled tokio loops (mood sampler,
//! transition coordinator, announcement processor, timeline coordinator,
//! recognition sampler) that share only `watch` snapshots and the event
//! bus. External services sit behind the traits in [`collaborators`].

pub mod api;
pub mod catalog;
pub mod collaborators;
pub mod dj;
pub mod error;
pub mod session;
pub mod state;

pub use catalog::TrackCatalog;
pub use collaborators::Collaborators;
pub use error::{Error, Result};
pub use session::DjSession;
pub use state::{DegradedIndicator, SessionStatus, Snapshots};
