//! Mood sampler integration tests
//!
//! Covers the single-flight guarantee under slow analysis and the degraded
//! path when the vision service keeps failing inside a running session.

mod helpers;

use aidj_common::config::SamplerConfig;
use aidj_common::events::DjEvent;
use aidj_common::models::{Mood, TrackId};
use aidj_engine::collaborators::FrameProvider;
use aidj_engine::dj::MoodSampler;
use aidj_engine::{DegradedIndicator, DjSession};
use helpers::{bus, count_type, drain, test_config, Mocks, ScriptedFrames, ScriptedVision};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn slow_config() -> SamplerConfig {
    SamplerConfig {
        min_interval_secs: 30,
        heartbeat_ms: 1000,
        analysis_timeout_secs: 120,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_analysis_slower_than_interval_never_overlaps() {
    let vision = ScriptedVision::new(vec![Ok(("happy", 70.0))], Duration::from_secs(45));
    let bus = bus();
    let sampler = Arc::new(MoodSampler::new(
        slow_config(),
        vision.clone(),
        bus.clone(),
        DegradedIndicator::new(bus),
    ));
    let frames: Arc<dyn FrameProvider> = Arc::new(ScriptedFrames);

    let cancel = CancellationToken::new();
    let runner = {
        let sampler = Arc::clone(&sampler);
        let frames = Arc::clone(&frames);
        let token = cancel.clone();
        tokio::spawn(async move { sampler.run(frames, token).await })
    };

    // Hammer the sampler from outside the loop while forcing repeatedly
    let mut extra = Vec::new();
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(7)).await;
        sampler.force();
        let sampler = Arc::clone(&sampler);
        let frames = Arc::clone(&frames);
        extra.push(tokio::spawn(async move {
            sampler.sample(frames.as_ref()).await;
        }));
    }
    tokio::time::sleep(Duration::from_secs(120)).await;

    cancel.cancel();
    runner.await.unwrap();
    for handle in extra {
        handle.await.unwrap();
    }

    assert!(vision.calls() >= 2);
    assert_eq!(vision.max_outstanding(), 1);
    assert!(!sampler.is_in_flight());
    assert_eq!(sampler.latest().map(|s| s.mood), Some(Mood::Happy));
}

#[tokio::test(start_paused = true)]
async fn test_interval_respected_while_running() {
    let vision = ScriptedVision::new(vec![Ok(("calm", 30.0))], Duration::from_millis(200));
    let bus = bus();
    let sampler = Arc::new(MoodSampler::new(
        slow_config(),
        vision.clone(),
        bus.clone(),
        DegradedIndicator::new(bus),
    ));

    let cancel = CancellationToken::new();
    let runner = {
        let sampler = Arc::clone(&sampler);
        let token = cancel.clone();
        tokio::spawn(async move { sampler.run(Arc::new(ScriptedFrames), token).await })
    };

    // Samples at ~0s, ~30s, ~60s, ~90s
    tokio::time::sleep(Duration::from_secs(95)).await;
    cancel.cancel();
    runner.await.unwrap();

    assert_eq!(vision.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_counts_as_failure() {
    let vision = ScriptedVision::new(vec![Ok(("happy", 70.0))], Duration::from_secs(20));
    let bus = bus();
    let mut events = bus.subscribe();
    let sampler = MoodSampler::new(
        SamplerConfig::default(),
        vision,
        bus.clone(),
        DegradedIndicator::new(bus),
    );

    assert!(sampler.sample(&ScriptedFrames).await.is_none());
    assert_eq!(sampler.consecutive_failures(), 1);
    assert!(sampler.latest().is_none());
    assert!(!sampler.is_in_flight());
    assert_eq!(count_type(&drain(&mut events), "AnalysisFailed"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_failures_keep_mood_and_degrade_without_transition() {
    let vision = ScriptedVision::new(
        vec![Ok(("neutral", 50.0)), Err(()), Err(()), Err(())],
        Duration::from_millis(100),
    );
    let mocks = Mocks::new(vision.clone());
    let session = DjSession::new(test_config(), mocks.collaborators(), helpers::catalog());
    let mut events = session.bus().subscribe();

    session.start().await.unwrap();
    session.play(&TrackId::new("pop1")).unwrap();

    // First sample at start, then failures from ~30s with a 5s backoff
    tokio::time::sleep(Duration::from_secs(50)).await;

    let status = session.status();
    let mood = status.mood.expect("first sample retained");
    assert_eq!(mood.mood, Mood::Neutral);
    assert!(status.degraded.degraded);
    assert!(status.degraded.components.contains_key("mood analysis"));
    assert!(vision.calls() >= 4);

    session.stop().await;

    let events = drain(&mut events);
    assert_eq!(count_type(&events, "TransitionStateChanged"), 0);
    assert_eq!(count_type(&events, "MoodSampled"), 1);
    assert!(events.iter().any(|e| matches!(
        e,
        DjEvent::DegradedStateChanged { degraded: true, .. }
    )));
    assert!(mocks.primary.spoken().is_empty());
}
