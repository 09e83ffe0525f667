//! DJ session lifecycle
//!
//! Builds every component once, then spawns their loops on `start()` as
//! children of a single `CancellationToken`. `stop()` tears everything down
//! as one step: the token is cancelled (outstanding analysis calls and
//! timeline timers are dropped), the queue is closed, the speaking
//! announcement is stopped, pending announcements are cleared, and every
//! task is joined.

use aidj_common::config::DjConfig;
use aidj_common::events::{DjEvent, EventBus, TrackChangeReason};
use aidj_common::models::{
    AnnouncementRequest, EventPlan, MoodSample, Origin, Priority, Track, TrackId, VipGuest,
};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::TrackCatalog;
use crate::collaborators::Collaborators;
use crate::dj::{
    AnnouncementQueue, MoodSampler, RecognitionSampler, TimelineCoordinator, TimelineOutputs,
    TrackSelector, TransitionCommand, TransitionCoordinator,
};
use crate::error::{Error, Result};
use crate::state::{DegradedIndicator, SessionStatus, Snapshots};

/// An announcement that started playing
#[derive(Debug, Clone)]
pub struct AnnouncementNotice {
    pub id: Uuid,
    pub text: String,
    pub origin: Origin,
    pub engine: String,
}

type MoodCallback = Box<dyn Fn(&MoodSample) + Send + Sync>;
type TrackChangeCallback = Box<dyn Fn(&Track, TrackChangeReason) + Send + Sync>;
type AnnouncementCallback = Box<dyn Fn(&AnnouncementNotice) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    mood: RwLock<Vec<MoodCallback>>,
    track_change: RwLock<Vec<TrackChangeCallback>>,
    announcement: RwLock<Vec<AnnouncementCallback>>,
}

impl Callbacks {
    fn dispatch(&self, event: &DjEvent) {
        match event {
            DjEvent::MoodSampled { sample } => {
                for cb in self.mood.read().unwrap_or_else(|e| e.into_inner()).iter() {
                    cb(sample);
                }
            }
            DjEvent::TrackChangeRequested { track, reason, .. } => {
                for cb in self.track_change.read().unwrap_or_else(|e| e.into_inner()).iter() {
                    cb(track, *reason);
                }
            }
            DjEvent::AnnouncementStarted {
                announcement_id,
                text,
                origin,
                engine,
                ..
            } => {
                let notice = AnnouncementNotice {
                    id: *announcement_id,
                    text: text.clone(),
                    origin: *origin,
                    engine: engine.clone(),
                };
                for cb in self.announcement.read().unwrap_or_else(|e| e.into_inner()).iter() {
                    cb(&notice);
                }
            }
            _ => {}
        }
    }
}

/// Forward bus events to registered callbacks until cancelled
async fn dispatch_callbacks(
    mut events: broadcast::Receiver<DjEvent>,
    callbacks: Arc<Callbacks>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => callbacks.dispatch(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Callback dispatcher lagged, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

struct RunningTasks {
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

pub struct DjSession {
    config: DjConfig,
    collaborators: Collaborators,
    catalog: Arc<TrackCatalog>,
    bus: EventBus,
    degraded: DegradedIndicator,
    announcer: AnnouncementQueue,
    sampler: Option<Arc<MoodSampler>>,
    /// Mood channel used when no sampler is configured
    idle_mood: watch::Sender<Option<MoodSample>>,
    transitions: Arc<TransitionCoordinator>,
    timeline: Arc<TimelineCoordinator>,
    recognition: Option<Arc<RecognitionSampler>>,
    callbacks: Arc<Callbacks>,
    running: tokio::sync::Mutex<Option<RunningTasks>>,
    started_at: Mutex<Option<DateTime<Utc>>>,
}

impl DjSession {
    pub fn new(config: DjConfig, collaborators: Collaborators, catalog: Arc<TrackCatalog>) -> Self {
        let bus = EventBus::new(config.session.event_capacity);
        let degraded = DegradedIndicator::new(bus.clone());
        let selector = TrackSelector::new(config.selector);

        let announcer = AnnouncementQueue::new(
            config.announcer.clone(),
            Arc::clone(&collaborators.primary_speech),
            collaborators.fallback_speech.clone(),
            Arc::clone(&collaborators.playback),
            bus.clone(),
            degraded.clone(),
        );
        // Closed until the first start
        announcer.close();

        let sampler = match (&collaborators.frames, &collaborators.vision) {
            (Some(_), Some(vision)) => Some(Arc::new(MoodSampler::new(
                config.sampler.clone(),
                Arc::clone(vision),
                bus.clone(),
                degraded.clone(),
            ))),
            _ => {
                warn!("No frame source or vision analyzer configured, mood sampling disabled");
                None
            }
        };
        let (idle_mood, _) = watch::channel(None);

        let transitions = Arc::new(TransitionCoordinator::new(
            config.transition.clone(),
            selector,
            Arc::clone(&catalog),
            announcer.clone(),
            Arc::clone(&collaborators.playback),
            bus.clone(),
            degraded.clone(),
        ));

        let timeline = Arc::new(TimelineCoordinator::new(
            config.timeline.clone(),
            &config.recognition,
            TimelineOutputs {
                selector,
                catalog: Arc::clone(&catalog),
                announcer: announcer.clone(),
                transitions: transitions.handle(),
                now_playing: transitions.subscribe_now_playing(),
                bus: bus.clone(),
            },
        ));

        let recognition = match (&collaborators.frames, &collaborators.faces) {
            (Some(frames), Some(faces)) if config.recognition.enabled => {
                Some(Arc::new(RecognitionSampler::new(
                    config.recognition.clone(),
                    Arc::clone(frames),
                    Arc::clone(faces),
                    timeline.subscribe_roster(),
                    timeline.recognition_sender(),
                    degraded.clone(),
                )))
            }
            _ => {
                debug!("Face recognition disabled");
                None
            }
        };

        Self {
            config,
            collaborators,
            catalog,
            bus,
            degraded,
            announcer,
            sampler,
            idle_mood,
            transitions,
            timeline,
            recognition,
            callbacks: Arc::new(Callbacks::default()),
            running: tokio::sync::Mutex::new(None),
            started_at: Mutex::new(None),
        }
    }

    /// Install the event plan and the VIP roster
    pub fn initialize(&self, plan: EventPlan, guests: Vec<VipGuest>) -> Result<()> {
        plan.validate()?;
        self.timeline.load(plan, guests);
        Ok(())
    }

    pub fn on_mood_sample(&self, callback: impl Fn(&MoodSample) + Send + Sync + 'static) {
        self.callbacks
            .mood
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(callback));
    }

    pub fn on_track_change_requested(
        &self,
        callback: impl Fn(&Track, TrackChangeReason) + Send + Sync + 'static,
    ) {
        self.callbacks
            .track_change
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(callback));
    }

    pub fn on_announcement(&self, callback: impl Fn(&AnnouncementNotice) + Send + Sync + 'static) {
        self.callbacks
            .announcement
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(callback));
    }

    fn mood_receiver(&self) -> watch::Receiver<Option<MoodSample>> {
        match &self.sampler {
            Some(sampler) => sampler.subscribe(),
            None => self.idle_mood.subscribe(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Spawn every loop
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(Error::InvalidState("Session is already running".to_string()));
        }

        let cancel = CancellationToken::new();
        let mut tasks: Vec<(&'static str, JoinHandle<()>)> = Vec::new();
        self.announcer.reopen();

        tasks.push((
            "callbacks",
            tokio::spawn(dispatch_callbacks(
                self.bus.subscribe(),
                Arc::clone(&self.callbacks),
                cancel.child_token(),
            )),
        ));

        let announcer = self.announcer.clone();
        let token = cancel.child_token();
        tasks.push((
            "announcer",
            tokio::spawn(async move { announcer.run(token).await }),
        ));

        let transitions = Arc::clone(&self.transitions);
        let mood_rx = self.mood_receiver();
        let token = cancel.child_token();
        tasks.push((
            "transitions",
            tokio::spawn(async move { transitions.run(mood_rx, token).await }),
        ));

        if let (Some(sampler), Some(frames)) = (&self.sampler, &self.collaborators.frames) {
            let sampler = Arc::clone(sampler);
            let frames = Arc::clone(frames);
            let token = cancel.child_token();
            tasks.push((
                "mood sampler",
                tokio::spawn(async move { sampler.run(frames, token).await }),
            ));
        }

        let timeline = Arc::clone(&self.timeline);
        let token = cancel.child_token();
        tasks.push((
            "timeline",
            tokio::spawn(async move { timeline.run(token).await }),
        ));

        if let Some(recognition) = &self.recognition {
            let recognition = Arc::clone(recognition);
            let token = cancel.child_token();
            tasks.push((
                "recognition",
                tokio::spawn(async move { recognition.run(token).await }),
            ));
        }

        info!("DJ session started ({} tasks)", tasks.len());
        *running = Some(RunningTasks { cancel, tasks });
        *self.started_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
        self.bus.emit_lossy(DjEvent::SessionStarted {
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Tear the session down; a no-op when already stopped
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            debug!("Session already stopped");
            return;
        };

        running.cancel.cancel();
        self.announcer.close();
        self.announcer.cancel_current();
        let cleared = self.announcer.clear();
        *self.started_at.lock().unwrap_or_else(|e| e.into_inner()) = None;

        let deadline = tokio::time::Instant::now() + self.config.session.shutdown_timeout();
        for (name, mut handle) in running.tasks {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => debug!("{} task finished", name),
                Ok(Err(e)) => error!("{} task failed: {}", name, e),
                Err(_) => {
                    warn!("{} task did not stop in time, aborting", name);
                    handle.abort();
                }
            }
        }

        info!("DJ session stopped ({} pending announcements dropped)", cleared);
        self.bus.emit_lossy(DjEvent::SessionStopped {
            timestamp: Utc::now(),
        });
    }

    /// Start a catalog track now
    pub fn play(&self, track_id: &TrackId) -> Result<Arc<Track>> {
        if !self.is_running() {
            return Err(Error::InvalidState("Session is not running".to_string()));
        }
        let track = self
            .catalog
            .get(track_id)
            .ok_or_else(|| Error::NotFound(format!("Track {}", track_id)))?;
        self.transitions
            .handle()
            .send(TransitionCommand::Play(Arc::clone(&track)))?;
        Ok(track)
    }

    /// Stop the music; mood transitions pause until the next play
    pub fn stop_playback(&self) -> Result<()> {
        if !self.is_running() {
            return Err(Error::InvalidState("Session is not running".to_string()));
        }
        self.transitions.handle().send(TransitionCommand::Stop)
    }

    pub fn mood_sampling_enabled(&self) -> bool {
        self.sampler.is_some()
    }

    /// Returns false when mood sampling is not configured
    pub fn force_mood_sample(&self) -> bool {
        match &self.sampler {
            Some(sampler) => {
                sampler.force();
                true
            }
            None => false,
        }
    }

    /// Queue an operator announcement
    pub fn announce(&self, text: impl Into<String>, priority: Priority) -> Result<Uuid> {
        let request = AnnouncementRequest::new(text, priority, Origin::Manual);
        Ok(self.announcer.enqueue(request)?)
    }

    pub fn cancel_announcement(&self) -> bool {
        self.announcer.cancel_current()
    }

    pub fn clear_announcements(&self) -> usize {
        self.announcer.clear()
    }

    pub fn status(&self) -> SessionStatus {
        let snapshots = self.snapshots();
        SessionStatus {
            running: self.is_running(),
            started_at: *self.started_at.lock().unwrap_or_else(|e| e.into_inner()),
            transition_state: snapshots.transition_state(),
            mood: snapshots.mood(),
            now_playing: snapshots.now_playing().map(|t| Track::clone(&t)),
            now_speaking: snapshots.now_speaking(),
            pending_announcements: self.announcer.pending(),
            event_name: self.timeline.event_name(),
            active_phase: snapshots.active_phase(),
            catalog_size: self.catalog.len(),
            degraded: self.degraded.status(),
        }
    }

    pub fn snapshots(&self) -> Snapshots {
        Snapshots {
            mood: self.mood_receiver(),
            now_playing: self.transitions.subscribe_now_playing(),
            transition: self.transitions.subscribe_state(),
            now_speaking: self.announcer.subscribe_speaking(),
            active_phase: self.timeline.subscribe_active_phase(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn catalog(&self) -> &Arc<TrackCatalog> {
        &self.catalog
    }

    pub fn timeline(&self) -> &Arc<TimelineCoordinator> {
        &self.timeline
    }

    pub fn config(&self) -> &DjConfig {
        &self.config
    }
}
