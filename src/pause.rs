//! Pause detection: Active ⇄ Paused.
//! Entering Paused is time-triggered (silence past the threshold);
//! leaving it is event-triggered (the next recognized word).

use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PauseState {
    #[default]
    Active,
    Paused,
}

impl std::fmt::Display for PauseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PauseState::Active => write!(f, "Active"),
            PauseState::Paused => write!(f, "Paused"),
        }
    }
}

/// What caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseTrigger {
    /// The silence timer elapsed.
    TimerElapsed,
    /// A word arrived.
    WordArrived,
}

impl PauseState {
    /// Returns whether `trigger` may move `self` to `next`.
    pub fn can_transition_to(self, next: PauseState, trigger: PauseTrigger) -> bool {
        matches!(
            (self, next, trigger),
            (PauseState::Active, PauseState::Paused, PauseTrigger::TimerElapsed)
                | (PauseState::Paused, PauseState::Active, PauseTrigger::WordArrived)
        )
    }
}

/// Silence watchdog. Holds only the deadline arithmetic; the timer that
/// calls [`PauseDetector::elapse`] lives with whoever drives the clock.
#[derive(Debug, Clone)]
pub struct PauseDetector {
    state: PauseState,
    threshold_ms: u64,
    /// Deadline armed by the last word (or by `arm`); None when disarmed.
    deadline: Option<u64>,
}

impl PauseDetector {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            state: PauseState::Active,
            threshold_ms,
            deadline: None,
        }
    }

    pub fn state(&self) -> PauseState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == PauseState::Paused
    }

    pub fn threshold_ms(&self) -> u64 {
        self.threshold_ms
    }

    /// Arm the timer from `now_ms` without a word (session start).
    pub fn arm(&mut self, now_ms: u64) {
        self.deadline = Some(now_ms.saturating_add(self.threshold_ms));
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// A word arrived: restart the timer. Returns the new state if this
    /// ended a pause.
    pub fn on_word(&mut self, timestamp: u64) -> Option<PauseState> {
        self.deadline = Some(timestamp.saturating_add(self.threshold_ms));
        self.transition(PauseState::Active, PauseTrigger::WordArrived)
    }

    /// Time moved to `now_ms`. Returns the new state on the single
    /// Active → Paused edge of a silence episode.
    pub fn elapse(&mut self, now_ms: u64) -> Option<PauseState> {
        match self.deadline {
            Some(deadline) if now_ms >= deadline => {
                self.transition(PauseState::Paused, PauseTrigger::TimerElapsed)
            }
            _ => None,
        }
    }

    /// Force the Paused edge regardless of the deadline. Used by an external
    /// timer that has already waited the threshold out.
    pub fn timer_fired(&mut self) -> Option<PauseState> {
        self.transition(PauseState::Paused, PauseTrigger::TimerElapsed)
    }

    fn transition(&mut self, next: PauseState, trigger: PauseTrigger) -> Option<PauseState> {
        let current = self.state;
        if !current.can_transition_to(next, trigger) {
            return None;
        }
        self.state = next;
        info!(from = %current, to = %next, "pause_transition");
        Some(next)
    }

    pub fn reset(&mut self) {
        self.state = PauseState::Active;
        self.deadline = None;
    }
}
