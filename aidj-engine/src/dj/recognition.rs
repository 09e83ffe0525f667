//! Face-recognition sampling
//!
//! Periodically hands the current frame and the VIP roster to the
//! face-recognition collaborator and forwards confident matches to the
//! timeline coordinator, which owns suppression.

use aidj_common::config::RecognitionConfig;
use aidj_common::events::DegradedComponent;
use aidj_common::models::{VipGuest, VipRecognitionEvent};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collaborators::{FaceMatch, FaceRecognizer, FrameProvider};
use crate::error::RecognitionError;
use crate::state::DegradedIndicator;

pub struct RecognitionSampler {
    config: RecognitionConfig,
    frames: Arc<dyn FrameProvider>,
    recognizer: Arc<dyn FaceRecognizer>,
    roster: watch::Receiver<Arc<Vec<VipGuest>>>,
    events: mpsc::Sender<VipRecognitionEvent>,
    degraded: DegradedIndicator,
    in_flight: AtomicBool,
    consecutive_failures: AtomicU32,
}

impl RecognitionSampler {
    pub fn new(
        config: RecognitionConfig,
        frames: Arc<dyn FrameProvider>,
        recognizer: Arc<dyn FaceRecognizer>,
        roster: watch::Receiver<Arc<Vec<VipGuest>>>,
        events: mpsc::Sender<VipRecognitionEvent>,
        degraded: DegradedIndicator,
    ) -> Self {
        Self {
            config,
            frames,
            recognizer,
            roster,
            events,
            degraded,
            in_flight: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Matches at or above the confidence threshold, as recognition events
    pub fn confident_matches(&self, matches: Vec<FaceMatch>) -> Vec<VipRecognitionEvent> {
        let threshold = f64::from(self.config.confidence_threshold);
        let seen_at = chrono::Utc::now();
        matches
            .into_iter()
            .filter(|m| {
                let keep = m.confidence >= threshold;
                if !keep {
                    debug!(
                        "Discarding match for {} at {:.0}% (threshold {:.0}%)",
                        m.guest_id, m.confidence, threshold
                    );
                }
                keep
            })
            .map(|m| VipRecognitionEvent {
                guest_id: m.guest_id,
                confidence: m.confidence.round().clamp(0.0, 100.0) as u8,
                seen_at,
            })
            .collect()
    }

    /// One recognition pass; returns how many events were forwarded
    pub async fn scan(&self) -> usize {
        let roster = Arc::clone(&self.roster.borrow());
        if roster.is_empty() {
            return 0;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Face recognition already in flight, skipping");
            return 0;
        }

        let timeout = self.config.timeout();
        let result = match tokio::time::timeout(timeout, self.recognize(&roster)).await {
            Ok(result) => result,
            Err(_) => Err(RecognitionError::Timeout(timeout)),
        };
        self.in_flight.store(false, Ordering::Release);

        let matches = match result {
            Ok(matches) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                self.degraded.clear(DegradedComponent::FaceRecognition);
                matches
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("Face recognition failed ({} in a row): {}", failures, e);
                if failures >= self.config.degraded_after_failures {
                    self.degraded
                        .raise(DegradedComponent::FaceRecognition, e.to_string());
                }
                return 0;
            }
        };

        let mut forwarded = 0;
        for event in self.confident_matches(matches) {
            match self.events.try_send(event) {
                Ok(()) => forwarded += 1,
                Err(e) => warn!("Recognition event dropped: {}", e),
            }
        }
        forwarded
    }

    async fn recognize(&self, roster: &[VipGuest]) -> Result<Vec<FaceMatch>, RecognitionError> {
        let frame = self.frames.current_frame().await?;
        self.recognizer.recognize(&frame, roster).await
    }

    pub async fn run(&self, cancel: CancellationToken) {
        info!("Recognition sampler started (every {:?})", self.config.interval());
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.scan() => {}
            }
        }
        // A scan dropped mid-flight never reached the reset above
        self.in_flight.store(false, Ordering::Release);
        info!("Recognition sampler stopped");
    }
}
