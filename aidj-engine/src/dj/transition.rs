//! Mood-triggered transition state machine
//!
//! One task drives every cycle `Idle → Announcing → Swapping → Settling →
//! Idle` and is the only writer of the now-playing snapshot. Because the
//! cycle runs inline in that task, at most one cycle is ever in flight:
//! mood samples arriving mid-cycle only bump the watch channel version and
//! are picked up (latest wins) once the machine is back in `Idle`. Commands
//! from the session and the timeline wait in the mpsc channel the same way.

use aidj_common::config::TransitionConfig;
use aidj_common::events::{
    DegradedComponent, DjEvent, EventBus, TrackChangeReason, TransitionState,
};
use aidj_common::models::{AnnouncementRequest, Mood, MoodSample, Origin, Track};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::announcer::{transition_priority, AnnouncementQueue};
use super::selector::TrackSelector;
use super::templates;
use crate::catalog::TrackCatalog;
use crate::collaborators::PlaybackSink;
use crate::error::{Error, PlaybackError, Result};
use crate::state::DegradedIndicator;

const COMMAND_CAPACITY: usize = 16;

/// Requests applied by the coordinator while it is `Idle`
#[derive(Debug, Clone)]
pub enum TransitionCommand {
    /// Operator starts a specific track; playback becomes active
    Play(Arc<Track>),
    /// Operator stops playback; mood transitions pause until the next play
    Stop,
    /// Timeline entered a phase with this track
    PhaseTrack(Arc<Track>),
    /// Special moment music cue
    Cue(Arc<Track>),
}

/// Sending side of the coordinator's command channel
#[derive(Clone)]
pub struct TransitionHandle {
    commands: mpsc::Sender<TransitionCommand>,
}

impl TransitionHandle {
    /// Queue a command without waiting for the current cycle to end
    pub fn send(&self, command: TransitionCommand) -> Result<()> {
        self.commands.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::InvalidState("Transition coordinator is busy".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::InvalidState("Transition coordinator is gone".to_string())
            }
        })
    }
}

/// Per-session cycle bookkeeping
struct CycleState {
    last_mood: Mood,
    first_transition: bool,
    rng: StdRng,
}

pub struct TransitionCoordinator {
    config: TransitionConfig,
    selector: TrackSelector,
    catalog: Arc<TrackCatalog>,
    announcer: AnnouncementQueue,
    playback: Arc<dyn PlaybackSink>,
    bus: EventBus,
    degraded: DegradedIndicator,
    commands_tx: mpsc::Sender<TransitionCommand>,
    commands_rx: Mutex<mpsc::Receiver<TransitionCommand>>,
    now_playing: watch::Sender<Option<Arc<Track>>>,
    state: watch::Sender<TransitionState>,
}

impl TransitionCoordinator {
    pub fn new(
        config: TransitionConfig,
        selector: TrackSelector,
        catalog: Arc<TrackCatalog>,
        announcer: AnnouncementQueue,
        playback: Arc<dyn PlaybackSink>,
        bus: EventBus,
        degraded: DegradedIndicator,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (now_playing, _) = watch::channel(None);
        let (state, _) = watch::channel(TransitionState::Idle);
        Self {
            config,
            selector,
            catalog,
            announcer,
            playback,
            bus,
            degraded,
            commands_tx,
            commands_rx: Mutex::new(commands_rx),
            now_playing,
            state,
        }
    }

    pub fn handle(&self) -> TransitionHandle {
        TransitionHandle {
            commands: self.commands_tx.clone(),
        }
    }

    pub fn subscribe_now_playing(&self) -> watch::Receiver<Option<Arc<Track>>> {
        self.now_playing.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<TransitionState> {
        self.state.subscribe()
    }

    pub fn now_playing(&self) -> Option<Arc<Track>> {
        self.now_playing.borrow().clone()
    }

    pub fn state(&self) -> TransitionState {
        *self.state.borrow()
    }

    /// Coordinator loop for one session
    pub async fn run(
        &self,
        mut mood_rx: watch::Receiver<Option<MoodSample>>,
        cancel: CancellationToken,
    ) {
        let mut commands = self.commands_rx.lock().await;
        // Only samples published after start count as newly observed
        mood_rx.borrow_and_update();

        let mut cycle = CycleState {
            last_mood: self.config.initial_mood,
            first_transition: true,
            rng: StdRng::from_entropy(),
        };
        let mut mood_open = true;
        info!("Transition coordinator started (baseline mood {})", cycle.last_mood);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(command) = commands.recv() => {
                    self.apply_command(command).await;
                }
                changed = mood_rx.changed(), if mood_open => {
                    if changed.is_err() {
                        debug!("Mood channel closed, mood transitions disabled");
                        mood_open = false;
                        continue;
                    }
                    let sample = mood_rx.borrow_and_update().clone();
                    if let Some(sample) = sample {
                        self.on_mood(sample, &mut cycle, &cancel).await;
                    }
                }
            }
        }
        // Commands sent after the stop must not leak into the next session
        while let Ok(stale) = commands.try_recv() {
            debug!("Discarding unapplied command: {:?}", stale);
        }
        info!("Transition coordinator stopped");
    }

    async fn on_mood(&self, sample: MoodSample, cycle: &mut CycleState, cancel: &CancellationToken) {
        if sample.mood == cycle.last_mood {
            return;
        }
        if self.now_playing().is_none() {
            debug!("Mood is now {} but playback is inactive", sample.mood);
            return;
        }
        if self.state() != TransitionState::Idle {
            return;
        }
        self.run_cycle(sample, cycle, cancel).await;
    }

    /// One full announce → swap → settle cycle
    async fn run_cycle(&self, sample: MoodSample, cycle: &mut CycleState, cancel: &CancellationToken) {
        let current = self.now_playing();
        let snapshot = self.catalog.snapshot();
        let Some(track) = self.selector.select_next(
            sample.mood,
            sample.energy,
            &snapshot,
            current.as_ref().map(|t| &t.id),
            &mut cycle.rng,
        ) else {
            warn!("Mood changed to {} but the catalog is empty, staying put", sample.mood);
            return;
        };

        let old_mood = cycle.last_mood;
        cycle.last_mood = sample.mood;
        info!(
            "Mood {} → {} (energy {}), transitioning to {}",
            old_mood,
            sample.mood,
            sample.energy,
            track.label()
        );

        self.advance(TransitionState::Announcing);
        let text = templates::mood_transition(old_mood, sample.mood, &track, &mut cycle.rng);
        let priority = transition_priority(cycle.first_transition);
        cycle.first_transition = false;

        let mut events = self.bus.subscribe();
        match self
            .announcer
            .enqueue(AnnouncementRequest::new(text, priority, Origin::Ai))
        {
            Ok(id) => self.await_announcement(id, &mut events, cancel).await,
            Err(e) => warn!("Transition announcement not queued ({}), swapping anyway", e),
        }
        drop(events);
        if cancel.is_cancelled() {
            return self.abandon_cycle();
        }

        self.advance(TransitionState::Swapping);
        self.swap(track, TrackChangeReason::MoodTransition).await;

        self.advance(TransitionState::Settling);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.abandon_cycle(),
            _ = tokio::time::sleep(self.config.settle()) => {}
        }
        self.advance(TransitionState::Idle);
    }

    /// Wait until the announcement starts (or ends without starting)
    async fn await_announcement(
        &self,
        id: Uuid,
        events: &mut broadcast::Receiver<DjEvent>,
        cancel: &CancellationToken,
    ) {
        let deadline = tokio::time::sleep(self.config.announce_start_timeout());
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = &mut deadline => {
                    debug!("Announcement {} did not start in time, swapping", id);
                    return;
                }
                event = events.recv() => match event {
                    Ok(DjEvent::AnnouncementStarted { announcement_id, .. }
                        | DjEvent::AnnouncementFinished { announcement_id, .. })
                        if announcement_id == id => return,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Transition coordinator lagged {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }
    }

    /// Move to `next`, which must be the current state's successor
    fn advance(&self, next: TransitionState) {
        let old_state = self.state();
        if !old_state.can_advance_to(next) {
            warn!("Ignoring illegal transition {} → {}", old_state, next);
            return;
        }
        self.state.send_replace(next);
        debug!("Transition state {} → {}", old_state, next);
        self.bus.emit_lossy(DjEvent::TransitionStateChanged {
            old_state,
            new_state: next,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Walk the remaining edges back to Idle without side effects
    fn abandon_cycle(&self) {
        while self.state() != TransitionState::Idle {
            self.advance(self.state().successor());
        }
    }

    /// Tell the player to switch; now playing only changes on success
    async fn swap(&self, track: Arc<Track>, reason: TrackChangeReason) -> bool {
        let previous = self.now_playing().map(|t| t.id.clone());
        self.bus.emit_lossy(DjEvent::TrackChangeRequested {
            track: Track::clone(&track),
            previous,
            reason,
            timestamp: chrono::Utc::now(),
        });

        let timeout = self.config.playback_timeout();
        let result = match tokio::time::timeout(timeout, self.playback.play(&track)).await {
            Ok(result) => result,
            Err(_) => Err(PlaybackError::Timeout(timeout)),
        };

        match result {
            Ok(()) => {
                self.degraded.clear(DegradedComponent::Playback);
                info!("Now playing {} ({:?})", track.label(), reason);
                self.now_playing.send_replace(Some(track));
                true
            }
            Err(e) => {
                warn!("Could not switch to {}: {}", track.label(), e);
                self.degraded.raise(DegradedComponent::Playback, e.to_string());
                false
            }
        }
    }

    async fn apply_command(&self, command: TransitionCommand) {
        let (track, reason) = match command {
            TransitionCommand::Stop => return self.stop_playback().await,
            TransitionCommand::Play(track) => (track, TrackChangeReason::Manual),
            TransitionCommand::PhaseTrack(track) => (track, TrackChangeReason::PhaseChange),
            TransitionCommand::Cue(track) => (track, TrackChangeReason::MomentCue),
        };

        if self.now_playing().is_some_and(|current| current.id == track.id) {
            debug!("{} is already playing, skipping {:?}", track.label(), reason);
            return;
        }
        self.swap(track, reason).await;
    }

    async fn stop_playback(&self) {
        if self.now_playing().is_none() {
            return;
        }
        let timeout = self.config.playback_timeout();
        match tokio::time::timeout(timeout, self.playback.stop()).await {
            Ok(Ok(())) => self.degraded.clear(DegradedComponent::Playback),
            Ok(Err(e)) => {
                warn!("Playback stop failed: {}", e);
                self.degraded.raise(DegradedComponent::Playback, e.to_string());
            }
            Err(_) => {
                warn!("Playback stop timed out after {:?}", timeout);
                self.degraded
                    .raise(DegradedComponent::Playback, PlaybackError::Timeout(timeout).to_string());
            }
        }
        info!("Playback stopped");
        self.now_playing.send_replace(None);
    }
}
