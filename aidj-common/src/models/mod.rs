//! Data model shared by the DJ engine, its HTTP API and its callers

mod announcement;
mod guest;
mod mood;
mod timeline;
mod track;

pub use announcement::{AnnouncementOutcome, AnnouncementRequest, Origin, Priority};
pub use guest::{GuestId, VipGuest, VipRecognitionEvent, VipRole};
pub use mood::{Mood, MoodSample, FALLBACK_CONFIDENCE};
pub use timeline::{EventPhase, EventPlan, MomentKind, PhaseKind, SpecialMoment};
pub use track::{License, Track, TrackId};
