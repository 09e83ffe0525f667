//! DJ orchestration core
//!
//! Independently scheduled loops that agree on one current track and one
//! announcement stream:
//!
//! - [`MoodSampler`]: throttled, single-flight crowd analysis
//! - [`TransitionCoordinator`]: announce → swap → settle state machine
//! - [`AnnouncementQueue`]: priority queue with dual-engine speech
//! - [`TimelineCoordinator`]: phases, special moments, VIP suppression
//! - [`RecognitionSampler`]: face matches into the timeline
//!
//! [`TrackSelector`] is a pure function over a catalog snapshot.

pub mod announcer;
pub mod mood_sampler;
pub mod recognition;
pub mod selector;
pub mod templates;
pub mod timeline;
pub mod transition;

pub use aidj_common::events::TransitionState;
pub use announcer::AnnouncementQueue;
pub use mood_sampler::MoodSampler;
pub use recognition::RecognitionSampler;
pub use selector::TrackSelector;
pub use timeline::{RecognitionOutcome, TickReport, TimelineCoordinator, TimelineOutputs};
pub use transition::{TransitionCommand, TransitionCoordinator, TransitionHandle};
