//! Transition coordinator integration tests
//!
//! Drives the coordinator with a hand-fed mood channel and a running
//! announcement processor, then checks the emitted state sequence.

mod helpers;

use aidj_common::config::{AnnouncerConfig, SelectorConfig, TransitionConfig};
use aidj_common::events::{DjEvent, EventBus, TrackChangeReason, TransitionState};
use aidj_common::models::{Mood, MoodSample, Priority};
use aidj_engine::dj::{
    AnnouncementQueue, TrackSelector, TransitionCommand, TransitionCoordinator,
};
use aidj_engine::DegradedIndicator;
use helpers::{bus, catalog, drain, MockSpeech, RecordingPlayback};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

struct Rig {
    coordinator: Arc<TransitionCoordinator>,
    playback: Arc<RecordingPlayback>,
    speech: Arc<MockSpeech>,
    degraded: DegradedIndicator,
    mood_tx: watch::Sender<Option<MoodSample>>,
    events: broadcast::Receiver<DjEvent>,
    cancel: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Rig {
    fn start() -> Self {
        let bus: EventBus = bus();
        let events = bus.subscribe();
        let degraded = DegradedIndicator::new(bus.clone());
        let playback = RecordingPlayback::new();
        let speech = MockSpeech::new("primary", Duration::from_secs(1));
        let announcer = AnnouncementQueue::new(
            AnnouncerConfig {
                cooldown_ms: 200,
                duck_ramp_ms: 40,
                ..Default::default()
            },
            speech.clone(),
            None,
            playback.clone(),
            bus.clone(),
            degraded.clone(),
        );
        let coordinator = Arc::new(TransitionCoordinator::new(
            TransitionConfig {
                settle_secs: 2,
                ..Default::default()
            },
            TrackSelector::new(SelectorConfig::default()),
            catalog(),
            announcer.clone(),
            playback.clone(),
            bus,
            degraded.clone(),
        ));

        let (mood_tx, mood_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();
        let token = cancel.clone();
        tasks.push(tokio::spawn(async move { announcer.run(token).await }));
        let runner = Arc::clone(&coordinator);
        let token = cancel.clone();
        tasks.push(tokio::spawn(async move { runner.run(mood_rx, token).await }));

        Self {
            coordinator,
            playback,
            speech,
            degraded,
            mood_tx,
            events,
            cancel,
            tasks,
        }
    }

    fn mood(&self, mood: Mood, energy: f64) {
        self.mood_tx
            .send_replace(Some(MoodSample::new(mood, energy, 40, 90.0, chrono::Utc::now())));
    }

    async fn play(&self, id: &str) {
        let track = catalog().get(&aidj_common::models::TrackId::new(id)).unwrap();
        self.coordinator
            .handle()
            .send(TransitionCommand::Play(track))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    async fn shutdown(self) -> Vec<DjEvent> {
        let mut events = self.events;
        self.cancel.cancel();
        for task in self.tasks {
            task.await.unwrap();
        }
        drain(&mut events)
    }
}

fn state_changes(events: &[DjEvent]) -> Vec<(TransitionState, TransitionState)> {
    events
        .iter()
        .filter_map(|e| match e {
            DjEvent::TransitionStateChanged {
                old_state,
                new_state,
                ..
            } => Some((*old_state, *new_state)),
            _ => None,
        })
        .collect()
}

fn mood_swaps(events: &[DjEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            DjEvent::TrackChangeRequested {
                track,
                reason: TrackChangeReason::MoodTransition,
                ..
            } => Some(track.id.0.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_rapid_mood_changes_follow_legal_edges_and_coalesce() {
    let rig = Rig::start();
    rig.play("pop1").await;

    rig.mood(Mood::Excited, 90.0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_ne!(rig.coordinator.state(), TransitionState::Idle);

    // Both arrive mid-cycle; only the latest is acted on afterwards
    rig.mood(Mood::Chill, 20.0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    rig.mood(Mood::Happy, 95.0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(rig.coordinator.state(), TransitionState::Idle);
    let events = rig.shutdown().await;

    let changes = state_changes(&events);
    assert_eq!(changes.len(), 8);
    let mut current = TransitionState::Idle;
    for (old, new) in &changes {
        assert_eq!(*old, current);
        assert!(old.can_advance_to(*new), "illegal edge {} → {}", old, new);
        current = *new;
    }
    assert_eq!(current, TransitionState::Idle);

    let swaps = mood_swaps(&events);
    assert_eq!(swaps.len(), 2);
    assert!(swaps[0].starts_with("ex"));
    assert!(!swaps.iter().any(|id| id.starts_with("ch")));
}

#[tokio::test(start_paused = true)]
async fn test_announcement_precedes_swap() {
    let rig = Rig::start();
    rig.play("pop1").await;
    rig.mood(Mood::Chill, 20.0);
    tokio::time::sleep(Duration::from_secs(5)).await;

    let now_playing = rig.coordinator.now_playing().unwrap();
    assert!(now_playing.id.0.starts_with("ch"));
    assert_eq!(rig.speech.spoken().len(), 1);
    let events = rig.shutdown().await;

    let started = events
        .iter()
        .position(|e| matches!(e, DjEvent::AnnouncementStarted { .. }))
        .unwrap();
    let swapped = events
        .iter()
        .position(|e| {
            matches!(
                e,
                DjEvent::TrackChangeRequested {
                    reason: TrackChangeReason::MoodTransition,
                    ..
                }
            )
        })
        .unwrap();
    assert!(started < swapped);
}

#[tokio::test(start_paused = true)]
async fn test_first_transition_is_immediate_then_high() {
    let rig = Rig::start();
    rig.play("pop1").await;

    rig.mood(Mood::Excited, 90.0);
    tokio::time::sleep(Duration::from_secs(5)).await;
    rig.mood(Mood::Chill, 20.0);
    tokio::time::sleep(Duration::from_secs(5)).await;
    let events = rig.shutdown().await;

    let priorities: Vec<Priority> = events
        .iter()
        .filter_map(|e| match e {
            DjEvent::AnnouncementQueued { request, .. } => Some(request.priority),
            _ => None,
        })
        .collect();
    assert_eq!(priorities, vec![Priority::Immediate, Priority::High]);
}

#[tokio::test(start_paused = true)]
async fn test_playback_failure_keeps_track_and_degrades() {
    let rig = Rig::start();
    rig.play("pop1").await;
    rig.playback.fail.store(true, Ordering::SeqCst);

    rig.mood(Mood::Excited, 90.0);
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(rig.coordinator.now_playing().unwrap().id.0, "pop1");
    assert_eq!(rig.coordinator.state(), TransitionState::Idle);
    assert!(rig.degraded.is_degraded());

    rig.playback.fail.store(false, Ordering::SeqCst);
    rig.play("ch1").await;
    assert!(!rig.degraded.is_degraded());
    rig.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_no_transition_after_stop_command() {
    let rig = Rig::start();
    rig.play("pop1").await;
    rig.coordinator
        .handle()
        .send(TransitionCommand::Stop)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(rig.coordinator.now_playing().is_none());
    assert_eq!(rig.playback.stops(), 1);

    rig.mood(Mood::Excited, 90.0);
    tokio::time::sleep(Duration::from_secs(5)).await;
    let events = rig.shutdown().await;
    assert!(state_changes(&events).is_empty());
}
