//! Frame scheduler: drives a scroll session on a tokio runtime.
//!
//! Recognition callbacks call `ingest` from any thread; it locks only the pace
//! tracker for the O(k) recompute and re-arms the silence timer. The frame loop
//! snapshots the tracker, releases it, then locks the scroll controller for
//! prediction, integration and emission. Emission happens under the lock of
//! the side that produced it, which is what lets `stop()` guarantee silence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cancellation::{CancelCoordinator, GenerationGuard};
use crate::engine::{PaceTracker, ScrollController};
use crate::error::{EngineError, Result};
use crate::metrics::{metric_names, MetricSummary, MetricsRegistry};
use crate::observer::ScrollObserver;
use crate::pace::SpeechPaceMetrics;
use crate::physics::ScrollState;
use crate::predictor::ScriptAnalysis;
use crate::settings::AdaptiveScrollSettings;

/// Session clock: milliseconds since the first `start()`.
#[derive(Clone)]
struct Clock {
    handle: Handle,
    baseline: Instant,
}

impl Clock {
    fn now_ms(&self) -> u64 {
        self.baseline.elapsed().as_millis() as u64
    }
}

/// State shared between the caller, the frame loop and silence timers.
struct SessionShared {
    tracker: Mutex<PaceTracker>,
    controller: Mutex<ScrollController>,
    observer: Arc<dyn ScrollObserver>,
    metrics_tx: watch::Sender<SpeechPaceMetrics>,
}

impl SessionShared {
    fn publish_pace(&self, metrics: &SpeechPaceMetrics) {
        self.observer.on_pace_change(metrics);
        self.metrics_tx.send_replace(metrics.clone());
    }
}

pub struct FrameScheduler {
    session_id: Uuid,
    settings: AdaptiveScrollSettings,
    shared: Arc<SessionShared>,
    cancel: CancelCoordinator,
    metrics: Arc<MetricsRegistry>,
    clock: Mutex<Option<Clock>>,
    /// Serialises start, stop and reset.
    lifecycle: Mutex<()>,
}

impl FrameScheduler {
    pub fn new(
        settings: AdaptiveScrollSettings,
        observer: Arc<dyn ScrollObserver>,
    ) -> std::result::Result<Self, crate::error::SettingsError> {
        settings.validate()?;
        let (metrics_tx, _) = watch::channel(SpeechPaceMetrics::default());
        Ok(Self {
            session_id: Uuid::new_v4(),
            shared: Arc::new(SessionShared {
                tracker: Mutex::new(PaceTracker::new(&settings)),
                controller: Mutex::new(ScrollController::new(&settings)),
                observer,
                metrics_tx,
            }),
            settings,
            cancel: CancelCoordinator::new(),
            metrics: Arc::new(MetricsRegistry::new()),
            clock: Mutex::new(None),
            lifecycle: Mutex::new(()),
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Supply the script layout; read-only to the engine afterwards.
    pub fn initialize(&self, script: ScriptAnalysis) {
        info!(session_id = %self.session_id, total_words = script.total_words, "script_initialized");
        self.shared.controller.lock().set_script(script);
    }

    /// Begin the frame loop and arm the silence timer. Must be called from
    /// within a tokio runtime. Starting a running session is a no-op, and a
    /// disabled session starts without spawning either task.
    pub fn start(&self) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let _lifecycle = self.lifecycle.lock();

        let clock = {
            let mut slot = self.clock.lock();
            let clock = slot.get_or_insert_with(|| Clock {
                handle,
                baseline: Instant::now(),
            });
            clock.clone()
        };

        let now_ms = clock.now_ms();
        {
            let mut tracker = self.shared.tracker.lock();
            if tracker.is_active() {
                return Ok(());
            }
            tracker.start(now_ms);
            if self.settings.enabled {
                self.arm_pause_timer(&clock);
            }
        }
        self.shared.controller.lock().start(now_ms);

        if self.settings.enabled {
            let guard = self.cancel.ticks.cancel_and_advance();
            clock.handle.spawn(run_tick_loop(
                Arc::clone(&self.shared),
                guard,
                clock.clone(),
                self.settings.frame_interval(),
                Arc::clone(&self.metrics),
            ));
        }

        info!(
            session_id = %self.session_id,
            now_ms,
            enabled = self.settings.enabled,
            "scroll_session_started"
        );
        Ok(())
    }

    /// Cancel the frame loop and silence timer. Idempotent; once this
    /// returns, no further emissions happen until the next `start()`.
    pub fn stop(&self) {
        let _lifecycle = self.lifecycle.lock();
        self.stop_locked();
    }

    /// Callers hold the lifecycle lock. Each side is deactivated and its task
    /// cancelled under that side's lock, so a timer or frame already past its
    /// cancellation check finds the side inactive.
    fn stop_locked(&self) {
        let was_active = {
            let mut tracker = self.shared.tracker.lock();
            let was_active = tracker.is_active();
            tracker.stop();
            self.cancel.pause_timer.cancel_all();
            was_active
        };
        {
            let mut controller = self.shared.controller.lock();
            controller.stop();
            self.cancel.ticks.cancel_all();
        }
        if was_active {
            info!(session_id = %self.session_id, "scroll_session_stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.tracker.lock().is_active()
    }

    /// Record a recognized word stamped with a session-clock timestamp.
    /// Ignored while the session is not running; ignored words still count
    /// toward the ingest histogram.
    pub fn ingest(&self, word_index: usize, word: &str, timestamp_ms: u64, confidence: f64) {
        let span = self.metrics.span(metric_names::INGEST_RECOMPUTE);
        let clock = self.clock.lock().clone();
        {
            let mut tracker = self.shared.tracker.lock();
            if let Some(metrics) = tracker.ingest(word_index, word, timestamp_ms, confidence) {
                self.shared.publish_pace(&metrics);
                // Re-armed under the tracker lock so a timer that already woke
                // up sees itself as stale.
                if let Some(clock) = &clock {
                    self.arm_pause_timer(clock);
                }
            }
        }
        span.finish();
    }

    /// Record a recognized word stamped with the current session time.
    pub fn ingest_now(&self, word_index: usize, word: &str, confidence: f64) {
        let now_ms = self.clock_ms();
        self.ingest(word_index, word, now_ms, confidence);
    }

    /// Manual scroll: pins the position until the quiescence window passes.
    pub fn set_user_scroll_position(&self, position: f64) {
        let now_ms = self.clock_ms();
        let mut controller = self.shared.controller.lock();
        if controller.set_user_scroll_position(position, now_ms) && controller.is_active() {
            self.shared.observer.on_scroll_state_change(controller.state());
        }
    }

    /// Stop, then clear history, metrics, scroll state and the session clock.
    /// The script stays loaded until `initialize` replaces it.
    pub fn reset(&self) {
        let _lifecycle = self.lifecycle.lock();
        self.stop_locked();
        self.shared.tracker.lock().reset();
        self.shared.controller.lock().reset();
        self.shared.metrics_tx.send_replace(SpeechPaceMetrics::default());
        self.metrics.clear();
        *self.clock.lock() = None;
        info!(session_id = %self.session_id, "scroll_session_reset");
    }

    /// Milliseconds on the session clock; 0 before the first start.
    pub fn clock_ms(&self) -> u64 {
        self.clock.lock().as_ref().map_or(0, Clock::now_ms)
    }

    pub fn current_metrics(&self) -> SpeechPaceMetrics {
        self.shared.tracker.lock().metrics().clone()
    }

    pub fn scroll_state(&self) -> ScrollState {
        self.shared.controller.lock().state().clone()
    }

    /// Latest metrics, updated on every ingest and pause transition.
    pub fn subscribe_metrics(&self) -> watch::Receiver<SpeechPaceMetrics> {
        self.shared.metrics_tx.subscribe()
    }

    pub fn metrics_summary(&self) -> HashMap<String, MetricSummary> {
        self.metrics.summary()
    }

    /// Cancel any pending silence timer and start a new one. Callers hold the
    /// tracker lock.
    fn arm_pause_timer(&self, clock: &Clock) {
        let guard = self.cancel.pause_timer.cancel_and_advance();
        let threshold = self.settings.pause_threshold_duration();
        let shared = Arc::clone(&self.shared);
        let timer_clock = clock.clone();
        clock
            .handle
            .spawn(run_pause_timer(shared, guard, timer_clock, threshold));
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.cancel.cancel_all();
    }
}

async fn run_pause_timer(
    shared: Arc<SessionShared>,
    guard: GenerationGuard,
    clock: Clock,
    threshold: Duration,
) {
    tokio::select! {
        biased;
        _ = guard.token().cancelled() => return,
        _ = tokio::time::sleep(threshold) => {}
    }

    let mut tracker = shared.tracker.lock();
    if !guard.should_continue() {
        return;
    }
    let now_ms = clock.now_ms();
    if let Some(metrics) = tracker.pause_timer_fired(now_ms) {
        debug!(now_ms, generation = guard.my_generation(), "silence_timer_fired");
        shared.publish_pace(&metrics);
    }
}

async fn run_tick_loop(
    shared: Arc<SessionShared>,
    guard: GenerationGuard,
    clock: Clock,
    frame_interval: Duration,
    metrics: Arc<MetricsRegistry>,
) {
    let mut interval = tokio::time::interval(frame_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick: Option<Instant> = None;

    debug!(generation = guard.my_generation(), "frame_loop_started");

    loop {
        tokio::select! {
            biased;
            _ = guard.token().cancelled() => break,
            _ = interval.tick() => {}
        }
        if !guard.should_continue() {
            break;
        }

        let tick_at = Instant::now();
        if let Some(previous) = last_tick.replace(tick_at) {
            let spacing = tick_at.duration_since(previous).as_micros() as f64;
            let expected = frame_interval.as_micros() as f64;
            metrics.record(metric_names::TICK_JITTER, (spacing - expected).abs());
        }

        let span = metrics.span(metric_names::TICK_COMPUTE);
        let now_ms = clock.now_ms();
        let snapshot = shared.tracker.lock().snapshot(now_ms);
        {
            let mut controller = shared.controller.lock();
            if controller.advance(&snapshot, now_ms) {
                let state = controller.state();
                shared
                    .observer
                    .on_scroll_update(state.current_position, state.velocity, &snapshot.metrics);
                shared.observer.on_scroll_state_change(state);
            }
        }
        span.finish();
    }

    debug!(generation = guard.my_generation(), "frame_loop_exiting");
}
