//! Priority announcement queue
//!
//! Every producer (mood transitions, timeline moments, VIP greetings,
//! operators) pushes [`AnnouncementRequest`]s into one queue. A single
//! processor task turns them into speech, so at most one announcement is
//! ever speaking.
//!
//! **Ordering:** pending items are kept sorted by priority rank, then enqueue
//! time, then insertion sequence. Dequeued items never re-enter.
//!
//! **Processing:** pop → duck music → primary engine → fallback engine →
//! drop. `AnnouncementStarted` is emitted as soon as audio begins so the
//! transition coordinator can overlap the track swap with speech. After
//! each item the music is restored and a short cooldown separates it from
//! the next one. `cancel_current()` skips the cooldown and hands the still
//! ducked music straight to the next pending item.

use aidj_common::config::AnnouncerConfig;
use aidj_common::events::{DegradedComponent, DjEvent, EventBus};
use aidj_common::models::{AnnouncementOutcome, AnnouncementRequest, Priority};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collaborators::{PlaybackSink, SpeechEngine, Utterance, VoiceParams};
use crate::error::QueueError;
use crate::state::DegradedIndicator;

/// Sort key: `(rank, enqueued_at, sequence)`
type QueueKey = (u8, DateTime<Utc>, u64);

struct QueuedItem {
    key: QueueKey,
    request: AnnouncementRequest,
}

#[derive(Default)]
struct PendingQueue {
    items: Vec<QueuedItem>,
    next_seq: u64,
    closed: bool,
}

/// The item currently owned by the processor
struct Speaking {
    id: Uuid,
    cancel: CancellationToken,
    utterance: Option<Arc<dyn Utterance>>,
}

struct Inner {
    config: AnnouncerConfig,
    voice: VoiceParams,
    pending: Mutex<PendingQueue>,
    wake: Notify,
    speaking: Mutex<Option<Speaking>>,
    now_speaking: watch::Sender<Option<AnnouncementRequest>>,
    primary: Arc<dyn SpeechEngine>,
    fallback: Option<Arc<dyn SpeechEngine>>,
    playback: Arc<dyn PlaybackSink>,
    bus: EventBus,
    degraded: DegradedIndicator,
}

/// Clonable handle to the announcement queue
#[derive(Clone)]
pub struct AnnouncementQueue {
    inner: Arc<Inner>,
}

impl AnnouncementQueue {
    pub fn new(
        config: AnnouncerConfig,
        primary: Arc<dyn SpeechEngine>,
        fallback: Option<Arc<dyn SpeechEngine>>,
        playback: Arc<dyn PlaybackSink>,
        bus: EventBus,
        degraded: DegradedIndicator,
    ) -> Self {
        let voice = VoiceParams {
            voice: config.voice.clone(),
            rate: config.speaking_rate,
        };
        let (now_speaking, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                config,
                voice,
                pending: Mutex::new(PendingQueue::default()),
                wake: Notify::new(),
                speaking: Mutex::new(None),
                now_speaking,
                primary,
                fallback,
                playback,
                bus,
                degraded,
            }),
        }
    }

    fn pending_lock(&self) -> std::sync::MutexGuard<'_, PendingQueue> {
        self.inner.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn speaking_lock(&self) -> std::sync::MutexGuard<'_, Option<Speaking>> {
        self.inner.speaking.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a request in priority/FIFO order
    pub fn enqueue(&self, request: AnnouncementRequest) -> Result<Uuid, QueueError> {
        if request.text.trim().is_empty() {
            return Err(QueueError::EmptyText);
        }

        let id = request.id;
        let queue_length = {
            let mut pending = self.pending_lock();
            if pending.closed {
                return Err(QueueError::Closed);
            }
            if pending.items.len() >= self.inner.config.max_queue_len {
                return Err(QueueError::Full(pending.items.len()));
            }

            let key = (request.priority.rank(), request.enqueued_at, pending.next_seq);
            pending.next_seq += 1;
            let position = pending.items.partition_point(|item| item.key <= key);
            pending.items.insert(
                position,
                QueuedItem {
                    key,
                    request: request.clone(),
                },
            );
            pending.items.len()
        };

        debug!(
            "Queued announcement {} ({:?}, {:?}), {} pending",
            id, request.priority, request.origin, queue_length
        );
        self.inner.wake.notify_one();
        self.inner.bus.emit_lossy(DjEvent::AnnouncementQueued {
            request,
            queue_length,
        });
        Ok(id)
    }

    /// Stop the speaking announcement now
    ///
    /// Audio output is stopped before this returns. The processor moves on
    /// to the next item without the cooldown. Returns false when nothing was
    /// speaking.
    pub fn cancel_current(&self) -> bool {
        let speaking = self.speaking_lock();
        match speaking.as_ref() {
            Some(current) => {
                current.cancel.cancel();
                if let Some(utterance) = &current.utterance {
                    utterance.stop();
                }
                info!("Cancelled announcement {}", current.id);
                true
            }
            None => false,
        }
    }

    /// Drop every pending item; returns how many were dropped
    pub fn clear(&self) -> usize {
        let dropped: Vec<QueuedItem> = std::mem::take(&mut self.pending_lock().items);
        for item in &dropped {
            self.finish_event(item.request.id, AnnouncementOutcome::Dropped {
                reason: "queue cleared".to_string(),
            });
        }
        if !dropped.is_empty() {
            info!("Cleared {} pending announcements", dropped.len());
        }
        dropped.len()
    }

    /// Reject further enqueues
    pub fn close(&self) {
        self.pending_lock().closed = true;
    }

    /// Accept enqueues again (session restart)
    pub fn reopen(&self) {
        self.pending_lock().closed = false;
    }

    pub fn is_closed(&self) -> bool {
        self.pending_lock().closed
    }

    /// Pending items in the order they will be spoken
    pub fn pending(&self) -> Vec<AnnouncementRequest> {
        self.pending_lock()
            .items
            .iter()
            .map(|item| item.request.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending_lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn now_speaking(&self) -> Option<AnnouncementRequest> {
        self.inner.now_speaking.borrow().clone()
    }

    pub fn subscribe_speaking(&self) -> watch::Receiver<Option<AnnouncementRequest>> {
        self.inner.now_speaking.subscribe()
    }

    /// Highest-priority, oldest item (removed from the queue)
    fn pop(&self) -> Option<AnnouncementRequest> {
        let mut pending = self.pending_lock();
        if pending.items.is_empty() {
            None
        } else {
            Some(pending.items.remove(0).request)
        }
    }

    async fn next_item(&self) -> AnnouncementRequest {
        loop {
            if let Some(request) = self.pop() {
                return request;
            }
            self.inner.wake.notified().await;
        }
    }

    fn finish_event(&self, announcement_id: Uuid, outcome: AnnouncementOutcome) {
        self.inner.bus.emit_lossy(DjEvent::AnnouncementFinished {
            announcement_id,
            outcome,
            timestamp: Utc::now(),
        });
    }

    /// Processor loop; runs until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Announcement processor started");
        let config = &self.inner.config;
        let mut handed_over: Option<AnnouncementRequest> = None;
        let mut ducked = false;
        loop {
            let request = match handed_over.take() {
                Some(request) => request,
                None => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    request = self.next_item() => request,
                },
            };

            let outcome = self.process(request, ducked, &cancel).await;
            let was_cancelled = outcome == AnnouncementOutcome::Cancelled;

            if was_cancelled && !cancel.is_cancelled() {
                // Music stays ducked for the next item
                if let Some(next) = self.pop() {
                    handed_over = Some(next);
                    ducked = true;
                    continue;
                }
            }

            if was_cancelled || cancel.is_cancelled() {
                self.set_volume(config.normal_volume).await;
            } else {
                self.ramp_volume(config.duck_volume, config.normal_volume, &cancel)
                    .await;
            }
            ducked = false;

            if cancel.is_cancelled() {
                break;
            }
            if was_cancelled {
                continue;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(config.cooldown()) => {}
            }
        }
        info!("Announcement processor stopped");
    }

    /// Speak one item start to finish
    ///
    /// Ducks the music unless `ducked` says it already is; restoring the
    /// volume is left to the caller.
    async fn process(
        &self,
        request: AnnouncementRequest,
        ducked: bool,
        session: &CancellationToken,
    ) -> AnnouncementOutcome {
        let token = session.child_token();
        *self.speaking_lock() = Some(Speaking {
            id: request.id,
            cancel: token.clone(),
            utterance: None,
        });
        self.inner.now_speaking.send_replace(Some(request.clone()));
        debug!("Speaking announcement {}: {}", request.id, request.text);

        if !ducked {
            let config = &self.inner.config;
            self.ramp_volume(config.normal_volume, config.duck_volume, &token)
                .await;
        }

        let outcome = match self.synthesize(&request, &token).await {
            Some((engine, utterance)) => self.play(&request, engine, utterance, &token).await,
            None if token.is_cancelled() => AnnouncementOutcome::Cancelled,
            None => AnnouncementOutcome::Dropped {
                reason: "all speech engines failed".to_string(),
            },
        };

        *self.speaking_lock() = None;
        self.inner.now_speaking.send_replace(None);

        match &outcome {
            AnnouncementOutcome::Spoken { engine } => {
                debug!("Announcement {} spoken by {}", request.id, engine)
            }
            AnnouncementOutcome::Cancelled => info!("Announcement {} cancelled", request.id),
            AnnouncementOutcome::Dropped { reason } => {
                warn!("Announcement {} dropped: {}", request.id, reason)
            }
        }
        self.finish_event(request.id, outcome.clone());
        outcome
    }

    /// Primary engine, then fallback; `None` when both fail or on cancel
    async fn synthesize(
        &self,
        request: &AnnouncementRequest,
        token: &CancellationToken,
    ) -> Option<(String, Arc<dyn Utterance>)> {
        let engines = std::iter::once(&self.inner.primary).chain(self.inner.fallback.iter());
        let timeout = self.inner.config.synthesis_timeout();

        for engine in engines {
            let attempt = tokio::select! {
                biased;
                _ = token.cancelled() => return None,
                result = tokio::time::timeout(timeout, engine.speak(&request.text, &self.inner.voice)) => result,
            };

            match attempt {
                Ok(Ok(utterance)) => {
                    self.inner.degraded.clear(DegradedComponent::Speech);
                    return Some((engine.name().to_string(), utterance));
                }
                Ok(Err(e)) => warn!("Speech engine {} failed: {}", engine.name(), e),
                Err(_) => warn!("Speech engine {} timed out after {:?}", engine.name(), timeout),
            }
        }

        self.inner
            .degraded
            .raise(DegradedComponent::Speech, "all speech engines failed");
        None
    }

    async fn play(
        &self,
        request: &AnnouncementRequest,
        engine: String,
        utterance: Arc<dyn Utterance>,
        token: &CancellationToken,
    ) -> AnnouncementOutcome {
        // Publish the handle so cancel_current can stop it directly
        {
            let mut speaking = self.speaking_lock();
            match speaking.as_mut() {
                Some(current) if current.id == request.id && !current.cancel.is_cancelled() => {
                    current.utterance = Some(Arc::clone(&utterance));
                }
                _ => {
                    utterance.stop();
                    return AnnouncementOutcome::Cancelled;
                }
            }
        }

        self.inner.bus.emit_lossy(DjEvent::AnnouncementStarted {
            announcement_id: request.id,
            text: request.text.clone(),
            origin: request.origin,
            engine: engine.clone(),
            timestamp: Utc::now(),
        });

        tokio::select! {
            _ = utterance.finished() => {
                if token.is_cancelled() {
                    AnnouncementOutcome::Cancelled
                } else {
                    AnnouncementOutcome::Spoken { engine }
                }
            }
            _ = token.cancelled() => {
                utterance.stop();
                AnnouncementOutcome::Cancelled
            }
            _ = tokio::time::sleep(self.inner.config.max_utterance()) => {
                utterance.stop();
                AnnouncementOutcome::Dropped {
                    reason: "utterance exceeded maximum length".to_string(),
                }
            }
        }
    }

    /// Step the music volume between two levels
    ///
    /// Jumps straight to `to` once `cancel` has fired. Playback errors end
    /// the ramp early; speech goes ahead regardless.
    async fn ramp_volume(&self, from: f32, to: f32, cancel: &CancellationToken) {
        if (from - to).abs() < f32::EPSILON {
            return;
        }
        let config = &self.inner.config;
        let levels = if cancel.is_cancelled() {
            vec![to]
        } else {
            config.duck_curve.ramp(from, to, config.duck_steps)
        };
        let step_delay = Duration::from_millis(config.duck_ramp_ms / levels.len().max(1) as u64);

        for (i, level) in levels.iter().enumerate() {
            if !self.set_volume(*level).await {
                return;
            }
            if i + 1 < levels.len() && !cancel.is_cancelled() {
                tokio::time::sleep(step_delay).await;
            }
        }
    }

    /// One bounded volume command; false when the sink failed
    async fn set_volume(&self, level: f32) -> bool {
        let command_timeout = Duration::from_millis(self.inner.config.duck_ramp_ms.max(1000));
        match tokio::time::timeout(command_timeout, self.inner.playback.set_volume(level)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Volume change to {:.2} failed: {}", level, e);
                false
            }
            Err(_) => {
                warn!("Volume change to {:.2} timed out", level);
                false
            }
        }
    }
}

/// Priority for a mood-transition announcement
pub fn transition_priority(first_of_session: bool) -> Priority {
    if first_of_session {
        Priority::Immediate
    } else {
        Priority::High
    }
}
