//! Engine composition.
//!
//! `PaceTracker` owns the pace side (history, metrics, pause state) and is
//! what recognition callbacks touch. `ScrollController` owns the scroll side
//! (state, predictor, physics) and is what the frame driver touches. The two
//! only meet through a `PaceSnapshot` taken at the start of each tick, so a
//! threaded driver can guard them with separate locks.
//!
//! `PaceEngine` glues both together for a single-threaded event loop where
//! the caller supplies every timestamp, which also makes runs reproducible.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::SettingsError;
use crate::observer::ScrollObserver;
use crate::pace::{PaceCalculator, SpeechPaceMetrics};
use crate::pause::{PauseDetector, PauseState};
use crate::physics::{PhysicsEngine, PhysicsInput, ScrollState};
use crate::predictor::{ScriptAnalysis, ScrollTargetPredictor};
use crate::settings::AdaptiveScrollSettings;

/// Consistent read of the pace side for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PaceSnapshot {
    pub metrics: SpeechPaceMetrics,
    pub input: PhysicsInput,
    pub word_index: Option<usize>,
}

/// History, metrics and pause state.
#[derive(Debug, Clone)]
pub struct PaceTracker {
    enabled: bool,
    active: bool,
    calculator: PaceCalculator,
    pause: PauseDetector,
    latest_word_index: Option<usize>,
}

impl PaceTracker {
    pub fn new(settings: &AdaptiveScrollSettings) -> Self {
        Self {
            enabled: settings.enabled,
            active: false,
            calculator: PaceCalculator::new(settings),
            pause: PauseDetector::new(settings.pause_threshold_ms()),
            latest_word_index: None,
        }
    }

    /// Begin a session. A disabled tracker starts without arming the
    /// silence deadline, so it never reports a pause.
    pub fn start(&mut self, now_ms: u64) {
        self.active = true;
        if self.enabled {
            self.pause.arm(now_ms);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.pause.disarm();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Record a recognized word. Returns the rebuilt metrics, or None when
    /// the session is inactive or disabled.
    ///
    /// Out-of-order indices are accepted as-is. A timestamp earlier than the
    /// previous word is clamped to it; confidence is clamped into [0, 1].
    pub fn ingest(
        &mut self,
        word_index: usize,
        word: &str,
        timestamp: u64,
        confidence: f64,
    ) -> Option<SpeechPaceMetrics> {
        if !self.active || !self.enabled {
            return None;
        }

        let timestamp = match self.calculator.last_timestamp() {
            Some(last) if timestamp < last => {
                debug!(timestamp, last, "word timestamp went backwards, clamping");
                last
            }
            _ => timestamp,
        };
        let confidence = if confidence.is_nan() {
            debug!(word_index, "NaN confidence treated as 0");
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        if let Some(previous) = self.latest_word_index {
            if word_index < previous {
                debug!(word_index, previous, "recognizer rewound word index");
            }
        }

        self.pause.on_word(timestamp);
        let metrics = self
            .calculator
            .record(word_index, word.to_owned(), timestamp, confidence)
            .clone();
        self.latest_word_index = Some(word_index);

        debug!(
            word_index,
            current_wpm = metrics.current_wpm,
            trend = %metrics.pace_trend,
            "word_ingested"
        );
        Some(metrics)
    }

    /// Check the silence deadline against `now_ms`. Returns metrics on the
    /// Active → Paused edge only.
    pub fn poll_pause(&mut self, now_ms: u64) -> Option<SpeechPaceMetrics> {
        if !self.active || !self.enabled {
            return None;
        }
        match self.pause.elapse(now_ms) {
            Some(PauseState::Paused) => Some(self.calculator.set_paused(true, now_ms).clone()),
            _ => None,
        }
    }

    /// An external silence timer ran out at `now_ms`.
    pub fn pause_timer_fired(&mut self, now_ms: u64) -> Option<SpeechPaceMetrics> {
        if !self.active || !self.enabled {
            return None;
        }
        match self.pause.timer_fired() {
            Some(PauseState::Paused) => Some(self.calculator.set_paused(true, now_ms).clone()),
            _ => None,
        }
    }

    pub fn snapshot(&self, now_ms: u64) -> PaceSnapshot {
        let metrics = self.calculator.metrics().at(now_ms);
        let input = PhysicsInput {
            smoothed_wpm: self.calculator.smoothed_wpm(),
            trend: metrics.pace_trend,
            is_paused: self.pause.is_paused(),
            confidence: metrics.confidence_level,
        };
        PaceSnapshot {
            metrics,
            input,
            word_index: self.latest_word_index,
        }
    }

    pub fn metrics(&self) -> &SpeechPaceMetrics {
        self.calculator.metrics()
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    pub fn history_len(&self) -> usize {
        self.calculator.history().len()
    }

    pub fn reset(&mut self) {
        self.active = false;
        self.calculator.reset();
        self.pause.reset();
        self.latest_word_index = None;
    }
}

/// Scroll state, target prediction and physics.
#[derive(Debug, Clone)]
pub struct ScrollController {
    enabled: bool,
    active: bool,
    physics: PhysicsEngine,
    predictor: ScrollTargetPredictor,
    state: ScrollState,
    quiescence_ms: u64,
    manual_scroll_at: Option<u64>,
}

impl ScrollController {
    pub fn new(settings: &AdaptiveScrollSettings) -> Self {
        let physics = PhysicsEngine::new(settings);
        let state = physics.initial_state();
        Self {
            enabled: settings.enabled,
            active: false,
            physics,
            predictor: ScrollTargetPredictor::new(settings.look_ahead_words, settings.buffer_zone),
            state,
            quiescence_ms: settings.quiescence_window_ms(),
            manual_scroll_at: None,
        }
    }

    pub fn set_script(&mut self, script: ScriptAnalysis) {
        self.predictor.set_script(script);
    }

    pub fn start(&mut self, now_ms: u64) {
        self.active = true;
        self.state.last_update_time = now_ms;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Run one tick at `now_ms`. Returns false when nothing moved because the
    /// controller is stopped or disabled.
    pub fn advance(&mut self, snapshot: &PaceSnapshot, now_ms: u64) -> bool {
        if !self.active || !self.enabled {
            return false;
        }

        let delta_ms = now_ms.saturating_sub(self.state.last_update_time);
        self.state.last_update_time = now_ms;

        if let Some(at) = self.manual_scroll_at {
            if now_ms.saturating_sub(at) >= self.quiescence_ms {
                self.manual_scroll_at = None;
                self.state.is_user_controlled = false;
                info!(position = self.state.current_position, "manual_scroll_released");
            }
        }

        if let Some(word_index) = snapshot.word_index {
            self.state.target_position = self.predictor.predict(
                word_index,
                self.state.current_position,
                self.state.target_position,
            );
        }

        self.physics
            .step(&mut self.state, &snapshot.input, delta_ms as f64 / 1000.0);
        true
    }

    /// Hand the position to the user until the quiescence window passes.
    /// Non-finite positions, and any position on a disabled controller, are
    /// ignored. Returns false when ignored.
    pub fn set_user_scroll_position(&mut self, position: f64, now_ms: u64) -> bool {
        if !self.enabled {
            return false;
        }
        if !position.is_finite() {
            debug!(position, "ignoring non-finite manual scroll position");
            return false;
        }
        if !self.state.is_user_controlled {
            info!(position, "manual_scroll_engaged");
        }
        self.state.current_position = position;
        self.state.is_user_controlled = true;
        self.manual_scroll_at = Some(now_ms);
        self.physics.note_position(&mut self.state);
        true
    }

    pub fn state(&self) -> &ScrollState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.active = false;
        self.physics.reset();
        self.predictor.reset();
        self.state = self.physics.initial_state();
        self.manual_scroll_at = None;
    }
}

/// Single-threaded engine: one owner drives ingest and ticks in order and
/// supplies monotonic millisecond timestamps on one clock.
pub struct PaceEngine {
    settings: AdaptiveScrollSettings,
    tracker: PaceTracker,
    controller: ScrollController,
    observer: Arc<dyn ScrollObserver>,
}

impl PaceEngine {
    pub fn new(
        settings: AdaptiveScrollSettings,
        observer: Arc<dyn ScrollObserver>,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            tracker: PaceTracker::new(&settings),
            controller: ScrollController::new(&settings),
            settings,
            observer,
        })
    }

    /// Supply the script layout. Call before `start`, and again after
    /// `reset` to reuse the engine for a different script.
    pub fn initialize(&mut self, script: ScriptAnalysis) {
        self.controller.set_script(script);
    }

    pub fn start(&mut self, now_ms: u64) {
        if self.is_active() {
            return;
        }
        self.tracker.start(now_ms);
        self.controller.start(now_ms);
        info!(now_ms, "pace_engine_started");
    }

    /// Idempotent. A stopped engine emits nothing further.
    pub fn stop(&mut self) {
        if !self.is_active() {
            return;
        }
        self.tracker.stop();
        self.controller.stop();
        info!("pace_engine_stopped");
    }

    pub fn is_active(&self) -> bool {
        self.tracker.is_active()
    }

    pub fn ingest(&mut self, word_index: usize, word: &str, timestamp: u64, confidence: f64) {
        if let Some(metrics) = self.tracker.ingest(word_index, word, timestamp, confidence) {
            self.observer.on_pace_change(&metrics);
        }
    }

    /// One animation frame at `now_ms`.
    pub fn tick(&mut self, now_ms: u64) {
        if let Some(metrics) = self.tracker.poll_pause(now_ms) {
            self.observer.on_pace_change(&metrics);
        }
        let snapshot = self.tracker.snapshot(now_ms);
        if self.controller.advance(&snapshot, now_ms) {
            let state = self.controller.state();
            self.observer
                .on_scroll_update(state.current_position, state.velocity, &snapshot.metrics);
            self.observer.on_scroll_state_change(state);
        }
    }

    pub fn set_user_scroll_position(&mut self, position: f64, now_ms: u64) {
        if self.controller.set_user_scroll_position(position, now_ms) && self.is_active() {
            self.observer.on_scroll_state_change(self.controller.state());
        }
    }

    /// Clear history, metrics and scroll state and stop. The script stays
    /// loaded until `initialize` replaces it.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.controller.reset();
        info!("pace_engine_reset");
    }

    pub fn metrics(&self) -> &SpeechPaceMetrics {
        self.tracker.metrics()
    }

    pub fn scroll_state(&self) -> &ScrollState {
        self.controller.state()
    }

    pub fn history_len(&self) -> usize {
        self.tracker.history_len()
    }

    pub fn settings(&self) -> &AdaptiveScrollSettings {
        &self.settings
    }
}
