//! Event types for the AI DJ
//!
//! Provides the shared event definitions and the EventBus every DJ
//! component publishes to. The HTTP layer forwards the same events as SSE,
//! and session callbacks are dispatched from a bus subscription.

mod dj_types;

pub use dj_types::{DegradedComponent, TrackChangeReason, TransitionState};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{
    AnnouncementOutcome, AnnouncementRequest, EventPhase, GuestId, MomentKind, MoodSample, Origin,
    Track, TrackId,
};

/// AI DJ event types
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DjEvent {
    /// Session loops were spawned
    SessionStarted {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session loops were torn down
    SessionStopped {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A new crowd mood sample superseded the previous one
    ///
    /// Triggers:
    /// - Transition coordinator: mood change detection
    /// - Session callbacks: `on_mood_sample`
    MoodSampled { sample: MoodSample },

    /// Vision analysis failed; the previous sample stays current
    AnalysisFailed {
        error: String,
        /// Failures in a row since the last successful sample
        consecutive_failures: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Transition cycle moved to a new state
    TransitionStateChanged {
        old_state: TransitionState,
        new_state: TransitionState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The DJ told the playback collaborator to switch tracks
    ///
    /// Triggers:
    /// - Session callbacks: `on_track_change_requested`
    TrackChangeRequested {
        track: Track,
        previous: Option<TrackId>,
        reason: TrackChangeReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Announcement accepted into the queue
    AnnouncementQueued {
        request: AnnouncementRequest,
        /// Pending items after insertion
        queue_length: usize,
    },

    /// Announcement audio began playing
    ///
    /// Triggers:
    /// - Transition coordinator: Announcing → Swapping
    /// - Session callbacks: `on_announcement`
    AnnouncementStarted {
        announcement_id: Uuid,
        text: String,
        origin: Origin,
        engine: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Announcement left the queue for good
    AnnouncementFinished {
        announcement_id: Uuid,
        outcome: AnnouncementOutcome,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Active event phase changed (None = outside every phase window)
    PhaseChanged {
        phase_index: Option<usize>,
        phase: Option<EventPhase>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A special moment fired (once per moment)
    MomentTriggered {
        moment_id: String,
        moment_kind: MomentKind,
        description: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A VIP was recognized; `announced` is false for suppressed sightings
    VipRecognized {
        guest_id: GuestId,
        name: String,
        recognition_count: u32,
        announced: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The single degraded-state indicator flipped
    DegradedStateChanged {
        degraded: bool,
        component: Option<DegradedComponent>,
        reason: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl DjEvent {
    /// Event type name (used as the SSE `event:` field)
    pub fn event_type(&self) -> &'static str {
        match self {
            DjEvent::SessionStarted { .. } => "SessionStarted",
            DjEvent::SessionStopped { .. } => "SessionStopped",
            DjEvent::MoodSampled { .. } => "MoodSampled",
            DjEvent::AnalysisFailed { .. } => "AnalysisFailed",
            DjEvent::TransitionStateChanged { .. } => "TransitionStateChanged",
            DjEvent::TrackChangeRequested { .. } => "TrackChangeRequested",
            DjEvent::AnnouncementQueued { .. } => "AnnouncementQueued",
            DjEvent::AnnouncementStarted { .. } => "AnnouncementStarted",
            DjEvent::AnnouncementFinished { .. } => "AnnouncementFinished",
            DjEvent::PhaseChanged { .. } => "PhaseChanged",
            DjEvent::MomentTriggered { .. } => "MomentTriggered",
            DjEvent::VipRecognized { .. } => "VipRecognized",
            DjEvent::DegradedStateChanged { .. } => "DegradedStateChanged",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for the DJ session
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use aidj_common::events::{DjEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(DjEvent::SessionStarted {
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "SessionStarted");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DjEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers lag
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<DjEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: DjEvent) -> Result<usize, broadcast::error::SendError<DjEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: DjEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Mood, Priority};

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(10);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        let event = DjEvent::SessionStopped {
            timestamp: chrono::Utc::now(),
        };
        assert!(bus.emit(event).is_err());
    }

    #[test]
    fn test_eventbus_emit_lossy_on_full_channel() {
        let bus = EventBus::new(2);
        let _rx = bus.subscribe();

        for _ in 0..10 {
            bus.emit_lossy(DjEvent::AnalysisFailed {
                error: "timeout".to_string(),
                consecutive_failures: 1,
                timestamp: chrono::Utc::now(),
            });
        }
        assert_eq!(bus.capacity(), 2);
    }

    #[test]
    fn test_eventbus_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let sample = MoodSample::new(Mood::Happy, 60.0, 25, 80.0, chrono::Utc::now());
        bus.emit(DjEvent::MoodSampled { sample }).expect("emit should succeed");

        assert_eq!(rx1.try_recv().unwrap().event_type(), "MoodSampled");
        assert_eq!(rx2.try_recv().unwrap().event_type(), "MoodSampled");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let request = AnnouncementRequest::new("hello", Priority::High, Origin::Ai);
        let event = DjEvent::AnnouncementQueued {
            request,
            queue_length: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "AnnouncementQueued");
        assert_eq!(json["request"]["priority"], "high");

        let back: DjEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.event_type(), "AnnouncementQueued");
    }
}
