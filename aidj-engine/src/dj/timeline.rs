//! Event timeline and VIP recognition coordinator
//!
//! Owns the mutable parts of the event: which phase is active, the
//! `triggered` flag of every special moment, pending music cues, and the
//! per-guest recognition bookkeeping. Everything else sees it through
//! events, the active-phase snapshot, and the roster snapshot.
//!
//! Ticks are idempotent: a moment fires when its minute matches the
//! wall-clock minute and its flag is still false, so a poller running many
//! times per minute triggers each moment exactly once.

use aidj_common::config::{RecognitionConfig, TimelineConfig};
use aidj_common::events::{DjEvent, EventBus};
use aidj_common::models::{
    AnnouncementRequest, EventPhase, EventPlan, GuestId, Origin, Priority, Track, VipGuest,
    VipRecognitionEvent,
};
use aidj_common::time;
use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::announcer::AnnouncementQueue;
use super::selector::TrackSelector;
use super::templates;
use super::transition::{TransitionCommand, TransitionHandle};
use crate::catalog::TrackCatalog;

const RECOGNITION_CAPACITY: usize = 64;

/// What one recognition event turned into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// Greeting queued
    Announced,
    /// Seen again within the suppression window; bookkeeping only
    Suppressed,
    /// Not on the roster
    Unknown,
}

/// Result of one timeline tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Set when the active phase changed on this tick
    pub phase_change: Option<Option<usize>>,
    /// Ids of moments triggered on this tick
    pub triggered: Vec<String>,
}

#[derive(Debug)]
struct PendingCue {
    due: Instant,
    moment_id: String,
    cue: String,
}

struct TimelineState {
    plan: EventPlan,
    guests: HashMap<GuestId, VipGuest>,
    active_phase: Option<usize>,
    pending_cues: Vec<PendingCue>,
    rng: StdRng,
}

/// Collaborators the coordinator pushes work to
pub struct TimelineOutputs {
    pub selector: TrackSelector,
    pub catalog: Arc<TrackCatalog>,
    pub announcer: AnnouncementQueue,
    pub transitions: TransitionHandle,
    pub now_playing: watch::Receiver<Option<Arc<Track>>>,
    pub bus: EventBus,
}

pub struct TimelineCoordinator {
    config: TimelineConfig,
    suppression_window: chrono::Duration,
    outputs: TimelineOutputs,
    state: Mutex<TimelineState>,
    active_phase: watch::Sender<Option<usize>>,
    roster: watch::Sender<Arc<Vec<VipGuest>>>,
    recognitions_tx: mpsc::Sender<VipRecognitionEvent>,
    recognitions_rx: tokio::sync::Mutex<mpsc::Receiver<VipRecognitionEvent>>,
}

impl TimelineCoordinator {
    pub fn new(
        config: TimelineConfig,
        recognition: &RecognitionConfig,
        outputs: TimelineOutputs,
    ) -> Self {
        let (active_phase, _) = watch::channel(None);
        let (roster, _) = watch::channel(Arc::new(Vec::new()));
        let (recognitions_tx, recognitions_rx) = mpsc::channel(RECOGNITION_CAPACITY);
        Self {
            config,
            suppression_window: recognition.suppression_window(),
            outputs,
            state: Mutex::new(TimelineState {
                plan: EventPlan::default(),
                guests: HashMap::new(),
                active_phase: None,
                pending_cues: Vec::new(),
                rng: StdRng::from_entropy(),
            }),
            active_phase,
            roster,
            recognitions_tx,
            recognitions_rx: tokio::sync::Mutex::new(recognitions_rx),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TimelineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install the event plan and guest roster
    ///
    /// Replaces any previous plan; the active phase is re-resolved on the
    /// next tick.
    pub fn load(&self, plan: EventPlan, guests: Vec<VipGuest>) {
        info!(
            "Loaded event plan '{}': {} phases, {} moments, {} guests",
            plan.name,
            plan.phases.len(),
            plan.moments.len(),
            guests.len()
        );
        {
            let mut state = self.lock();
            state.plan = plan;
            state.guests = guests
                .iter()
                .map(|g| (g.id.clone(), g.clone()))
                .collect();
            state.active_phase = None;
            state.pending_cues.clear();
        }
        self.active_phase.send_replace(None);
        self.roster.send_replace(Arc::new(guests));
    }

    /// Channel the recognition sampler pushes matches into
    pub fn recognition_sender(&self) -> mpsc::Sender<VipRecognitionEvent> {
        self.recognitions_tx.clone()
    }

    pub fn subscribe_active_phase(&self) -> watch::Receiver<Option<usize>> {
        self.active_phase.subscribe()
    }

    pub fn subscribe_roster(&self) -> watch::Receiver<Arc<Vec<VipGuest>>> {
        self.roster.subscribe()
    }

    pub fn plan(&self) -> EventPlan {
        self.lock().plan.clone()
    }

    pub fn event_name(&self) -> Option<String> {
        let state = self.lock();
        (!state.plan.name.is_empty()).then(|| state.plan.name.clone())
    }

    pub fn guest(&self, id: &GuestId) -> Option<VipGuest> {
        self.lock().guests.get(id).cloned()
    }

    pub fn pending_cue_count(&self) -> usize {
        self.lock().pending_cues.len()
    }

    fn current_track_id(&self) -> Option<aidj_common::models::TrackId> {
        self.outputs.now_playing.borrow().as_ref().map(|t| t.id.clone())
    }

    fn announce(&self, text: String, priority: Priority, origin: Origin) {
        if let Err(e) = self
            .outputs
            .announcer
            .enqueue(AnnouncementRequest::new(text, priority, origin))
        {
            warn!("Timeline announcement not queued: {}", e);
        }
    }

    /// Resolve the active phase and trigger due moments for `now`
    pub fn tick(&self, now: NaiveDateTime) -> TickReport {
        let mut report = TickReport::default();
        let mut state = self.lock();
        let clock = now.time();

        let resolved = state.plan.phase_index_at(clock);
        if resolved != state.active_phase {
            state.active_phase = resolved;
            report.phase_change = Some(resolved);
            let phase = resolved.and_then(|i| state.plan.phases.get(i).cloned());
            self.enter_phase(&mut state, resolved, phase);
        }

        let cue_delay = self.config.moment_cue_delay();
        let mut due = Vec::new();
        for moment in state.plan.moments.iter_mut() {
            if moment.triggered || !moment.is_due(clock) {
                continue;
            }
            moment.triggered = true;
            due.push(moment.clone());
        }

        for moment in due {
            info!("Special moment '{}' ({:?}) triggered", moment.id, moment.moment_kind);
            self.outputs.bus.emit_lossy(DjEvent::MomentTriggered {
                moment_id: moment.id.clone(),
                moment_kind: moment.moment_kind,
                description: moment.description.clone(),
                timestamp: chrono::Utc::now(),
            });
            self.announce(templates::moment(&moment), Priority::High, Origin::System);

            if let Some(cue) = moment.music_cue.filter(|c| !c.trim().is_empty()) {
                state.pending_cues.push(PendingCue {
                    due: Instant::now() + cue_delay,
                    moment_id: moment.id.clone(),
                    cue,
                });
            }
            report.triggered.push(moment.id);
        }

        report
    }

    fn enter_phase(
        &self,
        state: &mut TimelineState,
        index: Option<usize>,
        phase: Option<EventPhase>,
    ) {
        self.active_phase.send_replace(index);
        self.outputs.bus.emit_lossy(DjEvent::PhaseChanged {
            phase_index: index,
            phase: phase.clone(),
            timestamp: chrono::Utc::now(),
        });

        let Some(phase) = phase else {
            info!("Outside every event phase");
            return;
        };
        info!(
            "Entering phase {:?} ({}, energy {})",
            phase.phase_kind, phase.music_style, phase.energy_target
        );
        if self.config.announce_phase_changes {
            self.announce(templates::phase_change(&phase), Priority::Medium, Origin::System);
        }

        let current = self.current_track_id();
        let snapshot = self.outputs.catalog.snapshot();
        match self
            .outputs
            .selector
            .select_for_phase(&phase, &snapshot, current.as_ref(), &mut state.rng)
        {
            Some(track) if Some(&track.id) == current.as_ref() => {
                debug!("Phase track {} is already playing", track.id);
            }
            Some(track) => {
                if let Err(e) = self.outputs.transitions.send(TransitionCommand::PhaseTrack(track)) {
                    warn!("Phase track not sent: {}", e);
                }
            }
            None => warn!("No track available for phase {:?}", phase.phase_kind),
        }
    }

    /// Send every music cue whose delay has elapsed
    pub fn fire_due_cues(&self, now: Instant) -> usize {
        let mut state = self.lock();
        let (due, waiting): (Vec<PendingCue>, Vec<PendingCue>) =
            std::mem::take(&mut state.pending_cues)
                .into_iter()
                .partition(|c| c.due <= now);
        state.pending_cues = waiting;

        let snapshot = self.outputs.catalog.snapshot();
        let current = self.current_track_id();
        for cue in &due {
            match self
                .outputs
                .selector
                .resolve_cue(&cue.cue, &snapshot, current.as_ref(), &mut state.rng)
            {
                Some(track) if Some(&track.id) == current.as_ref() => {
                    debug!("Cue '{}' resolves to the playing track", cue.cue);
                }
                Some(track) => {
                    info!("Moment '{}' cue → {}", cue.moment_id, track.label());
                    if let Err(e) = self.outputs.transitions.send(TransitionCommand::Cue(track)) {
                        warn!("Music cue not sent: {}", e);
                    }
                }
                None => warn!("Music cue '{}' for moment '{}' matched nothing", cue.cue, cue.moment_id),
            }
        }
        due.len()
    }

    fn next_cue_deadline(&self) -> Option<Instant> {
        self.lock().pending_cues.iter().map(|c| c.due).min()
    }

    /// Apply the suppression window to one sighting
    ///
    /// The guest's count and last-seen time are updated on every sighting,
    /// announced or not.
    pub fn handle_recognition(&self, event: &VipRecognitionEvent) -> RecognitionOutcome {
        let (guest, announce) = {
            let mut state = self.lock();
            let Some(guest) = state.guests.get_mut(&event.guest_id) else {
                debug!("Ignoring recognition of unknown guest {}", event.guest_id);
                return RecognitionOutcome::Unknown;
            };

            let announce = match guest.last_seen {
                None => true,
                Some(last) => event.seen_at - last > self.suppression_window,
            };
            guest.recognition_count = guest.recognition_count.saturating_add(1);
            guest.last_seen = Some(guest.last_seen.map_or(event.seen_at, |last| last.max(event.seen_at)));
            (guest.clone(), announce)
        };

        self.outputs.bus.emit_lossy(DjEvent::VipRecognized {
            guest_id: guest.id.clone(),
            name: guest.name.clone(),
            recognition_count: guest.recognition_count,
            announced: announce,
            timestamp: chrono::Utc::now(),
        });

        if !announce {
            debug!(
                "{} seen again within the suppression window ({} sightings)",
                guest.name, guest.recognition_count
            );
            return RecognitionOutcome::Suppressed;
        }

        info!("Recognized VIP {} ({:?})", guest.name, guest.role);
        let text = templates::vip_welcome(&guest, &mut self.lock().rng);
        self.announce(text, Priority::High, Origin::Vip);
        RecognitionOutcome::Announced
    }

    /// Poll the clock and drain recognitions until cancelled
    ///
    /// Pending cues and unread recognitions are discarded on exit.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut recognitions = self.recognitions_rx.lock().await;
        let mut poll = tokio::time::interval(self.config.poll());
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Timeline coordinator started (poll {:?})", self.config.poll());

        loop {
            let next_cue = self.next_cue_deadline();
            let cue_timer = tokio::time::sleep_until(
                next_cue.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600)),
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(event) = recognitions.recv() => {
                    self.handle_recognition(&event);
                }
                _ = cue_timer, if next_cue.is_some() => {
                    self.fire_due_cues(Instant::now());
                }
                _ = poll.tick() => {
                    self.tick(time::local_now());
                }
            }
        }

        while recognitions.try_recv().is_ok() {}
        let dropped = std::mem::take(&mut self.lock().pending_cues).len();
        if dropped > 0 {
            debug!("Discarded {} pending music cues", dropped);
        }
        info!("Timeline coordinator stopped");
    }
}
