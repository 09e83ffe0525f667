//! Shared DJ state
//!
//! No component reads another's internals. Each piece of mutable state has a
//! single writer that publishes it through a `watch` channel; everything else
//! holds a receiver and reads snapshots:
//!
//! | Snapshot | Writer |
//! |----------|--------|
//! | latest mood sample | MoodSampler |
//! | now playing, transition state | TransitionCoordinator |
//! | now speaking | AnnouncementQueue |
//! | active phase | TimelineCoordinator |
//!
//! The only state written by several components is the degraded indicator,
//! which collapses every failing collaborator into one surfaced flag.

use aidj_common::events::{DegradedComponent, DjEvent, EventBus, TransitionState};
use aidj_common::models::{AnnouncementRequest, MoodSample, Track};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{info, warn};

/// Read side of every published snapshot
#[derive(Clone)]
pub struct Snapshots {
    pub mood: watch::Receiver<Option<MoodSample>>,
    pub now_playing: watch::Receiver<Option<Arc<Track>>>,
    pub transition: watch::Receiver<TransitionState>,
    pub now_speaking: watch::Receiver<Option<AnnouncementRequest>>,
    pub active_phase: watch::Receiver<Option<usize>>,
}

impl Snapshots {
    pub fn mood(&self) -> Option<MoodSample> {
        self.mood.borrow().clone()
    }

    pub fn now_playing(&self) -> Option<Arc<Track>> {
        self.now_playing.borrow().clone()
    }

    pub fn transition_state(&self) -> TransitionState {
        *self.transition.borrow()
    }

    pub fn now_speaking(&self) -> Option<AnnouncementRequest> {
        self.now_speaking.borrow().clone()
    }

    pub fn active_phase(&self) -> Option<usize> {
        *self.active_phase.borrow()
    }
}

/// Surfaced degraded state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DegradedStatus {
    pub degraded: bool,
    /// Failing components and the most recent reason for each
    pub components: BTreeMap<String, String>,
}

/// Single degraded-state indicator shared by every loop
///
/// Components raise and clear their own entry; a `DegradedStateChanged`
/// event is emitted only when the overall flag flips.
#[derive(Clone)]
pub struct DegradedIndicator {
    failing: Arc<Mutex<BTreeMap<DegradedComponent, String>>>,
    bus: EventBus,
}

impl DegradedIndicator {
    pub fn new(bus: EventBus) -> Self {
        Self {
            failing: Arc::new(Mutex::new(BTreeMap::new())),
            bus,
        }
    }

    /// Mark a component as failing
    pub fn raise(&self, component: DegradedComponent, reason: impl Into<String>) {
        let reason = reason.into();
        let flipped = {
            let mut failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
            let was_degraded = !failing.is_empty();
            let newly_failing = failing.insert(component, reason.clone()).is_none();
            if newly_failing {
                warn!("Degraded: {} ({})", component, reason);
            }
            !was_degraded
        };

        if flipped {
            self.bus.emit_lossy(DjEvent::DegradedStateChanged {
                degraded: true,
                component: Some(component),
                reason: Some(reason),
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// Mark a component as healthy again
    pub fn clear(&self, component: DegradedComponent) {
        let flipped = {
            let mut failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
            if failing.remove(&component).is_none() {
                return;
            }
            info!("{} recovered", component);
            failing.is_empty()
        };

        if flipped {
            self.bus.emit_lossy(DjEvent::DegradedStateChanged {
                degraded: false,
                component: Some(component),
                reason: None,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.failing.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    pub fn status(&self) -> DegradedStatus {
        let failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        DegradedStatus {
            degraded: !failing.is_empty(),
            components: failing
                .iter()
                .map(|(c, r)| (c.to_string(), r.clone()))
                .collect(),
        }
    }
}

/// Full session status served by `GET /status`
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub running: bool,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub transition_state: TransitionState,
    pub mood: Option<MoodSample>,
    pub now_playing: Option<Track>,
    pub now_speaking: Option<AnnouncementRequest>,
    pub pending_announcements: Vec<AnnouncementRequest>,
    pub event_name: Option<String>,
    pub active_phase: Option<usize>,
    pub catalog_size: usize,
    pub degraded: DegradedStatus,
}
