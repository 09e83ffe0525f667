//! Throttled crowd-mood sampling
//!
//! A cheap heartbeat asks "is it time yet"; the expensive vision call only
//! happens when the minimum interval since the start of the last successful
//! sample has elapsed (or a sample was forced), and never while another
//! call is still outstanding.

use aidj_common::config::SamplerConfig;
use aidj_common::events::{DegradedComponent, DjEvent, EventBus};
use aidj_common::models::MoodSample;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Notify};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collaborators::{FrameProvider, VisionAnalyzer};
use crate::error::AnalysisError;
use crate::state::DegradedIndicator;

/// Clears the in-flight flag when the sampling future completes or is dropped
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct Schedule {
    /// Start of the last successful analysis
    last_success_start: Option<Instant>,
    /// No attempt before this instant (set after a failure)
    retry_after: Option<Instant>,
}

/// Sole writer of the latest-mood snapshot
pub struct MoodSampler {
    config: SamplerConfig,
    vision: Arc<dyn VisionAnalyzer>,
    bus: EventBus,
    degraded: DegradedIndicator,
    in_flight: AtomicBool,
    schedule: Mutex<Schedule>,
    forced: Notify,
    consecutive_failures: AtomicU32,
    latest: watch::Sender<Option<MoodSample>>,
}

impl MoodSampler {
    pub fn new(
        config: SamplerConfig,
        vision: Arc<dyn VisionAnalyzer>,
        bus: EventBus,
        degraded: DegradedIndicator,
    ) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            config,
            vision,
            bus,
            degraded,
            in_flight: AtomicBool::new(false),
            schedule: Mutex::new(Schedule::default()),
            forced: Notify::new(),
            consecutive_failures: AtomicU32::new(0),
            latest,
        }
    }

    fn schedule(&self) -> std::sync::MutexGuard<'_, Schedule> {
        self.schedule.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<MoodSample>> {
        self.latest.subscribe()
    }

    /// Last successful sample (survives failures)
    pub fn latest(&self) -> Option<MoodSample> {
        self.latest.borrow().clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Whether the interval (and any failure backoff) has elapsed
    pub fn is_due(&self) -> bool {
        let now = Instant::now();
        let schedule = self.schedule();
        let interval_elapsed = schedule
            .last_success_start
            .map_or(true, |start| now >= start + self.config.min_interval());
        let backoff_elapsed = schedule.retry_after.map_or(true, |at| now >= at);
        interval_elapsed && backoff_elapsed
    }

    /// Reset the interval clock so the next heartbeat samples immediately
    pub fn force(&self) {
        {
            let mut schedule = self.schedule();
            schedule.last_success_start = None;
            schedule.retry_after = None;
        }
        debug!("Mood sample forced");
        self.forced.notify_one();
    }

    /// Run one analysis if due and nothing is outstanding
    ///
    /// Returns the new sample, or `None` when skipped or failed. Failures
    /// are recorded, never returned.
    pub async fn sample(&self, frames: &dyn FrameProvider) -> Option<MoodSample> {
        if !self.is_due() {
            return None;
        }
        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            debug!("Mood analysis already in flight, skipping");
            return None;
        };

        let started = Instant::now();
        let timeout = self.config.analysis_timeout();
        let result = match tokio::time::timeout(timeout, self.analyze(frames)).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::Timeout(timeout)),
        };

        match result {
            Ok(sample) => {
                self.record_success(started, &sample);
                Some(sample)
            }
            Err(e) => {
                self.record_failure(e);
                None
            }
        }
    }

    async fn analyze(&self, frames: &dyn FrameProvider) -> Result<MoodSample, AnalysisError> {
        let frame = frames.current_frame().await?;
        let analysis = self.vision.analyze(&frame).await?;
        Ok(MoodSample::from_analysis(
            &analysis.mood,
            analysis.energy_score,
            analysis.crowd_count,
            analysis.confidence,
            chrono::Utc::now(),
        ))
    }

    fn record_success(&self, started: Instant, sample: &MoodSample) {
        {
            let mut schedule = self.schedule();
            schedule.last_success_start = Some(started);
            schedule.retry_after = None;
        }
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.degraded.clear(DegradedComponent::MoodAnalysis);

        debug!(
            "Mood sampled: {} (energy {}, crowd {}, confidence {})",
            sample.mood, sample.energy, sample.crowd_size, sample.confidence
        );
        self.latest.send_replace(Some(sample.clone()));
        self.bus.emit_lossy(DjEvent::MoodSampled {
            sample: sample.clone(),
        });
    }

    fn record_failure(&self, error: AnalysisError) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        self.schedule().retry_after = Some(Instant::now() + self.config.failure_backoff());
        warn!("Mood analysis failed ({} in a row): {}", failures, error);

        if failures >= self.config.degraded_after_failures {
            self.degraded.raise(DegradedComponent::MoodAnalysis, error.to_string());
        }
        self.bus.emit_lossy(DjEvent::AnalysisFailed {
            error: error.to_string(),
            consecutive_failures: failures,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Heartbeat loop; an outstanding analysis is dropped on cancel
    pub async fn run(&self, frames: Arc<dyn FrameProvider>, cancel: CancellationToken) {
        info!(
            "Mood sampler started (interval {:?}, heartbeat {:?})",
            self.config.min_interval(),
            self.config.heartbeat()
        );
        let mut heartbeat = tokio::time::interval(self.config.heartbeat());
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.forced.notified() => {}
                _ = heartbeat.tick() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.sample(frames.as_ref()) => {}
            }
        }
        info!("Mood sampler stopped");
    }
}
