//! Scroll physics: pace → target velocity → EMA smoothing → confidence-scaled
//! response → clamp → integrate. Runs once per animation tick.

use serde::Serialize;

use crate::pace::PaceTrend;
use crate::ring::FloatRing;
use crate::settings::AdaptiveScrollSettings;

/// Physical scroll model. Owned by the frame driver during a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollState {
    pub current_position: f64,
    pub target_position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    /// True while a manual scroll owns the position.
    pub is_user_controlled: bool,
    /// Recent positions, oldest first.
    pub smoothing_buffer: Vec<f64>,
    pub last_update_time: u64,
}

/// Everything a tick needs from the pace side, read as one snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsInput {
    pub smoothed_wpm: f64,
    pub trend: PaceTrend,
    pub is_paused: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct PhysicsEngine {
    base_speed: f64,
    min_velocity: f64,
    max_velocity: f64,
    responsiveness: f64,
    smoothing_factor: f64,
    reference_wpm: f64,
    paused_speed_ratio: f64,
    overshoot_damping: f64,
    accelerating_multiplier: f64,
    decelerating_multiplier: f64,
    buffer_zone: f64,
    max_delta_time: f64,

    /// Previous output of the EMA stage.
    smoothed_velocity: f64,
    positions: FloatRing,
}

impl PhysicsEngine {
    pub fn new(settings: &AdaptiveScrollSettings) -> Self {
        Self {
            base_speed: settings.base_scroll_speed,
            min_velocity: settings.min_velocity(),
            max_velocity: settings.max_velocity(),
            responsiveness: settings.responsiveness,
            smoothing_factor: settings.smoothing_factor,
            reference_wpm: settings.reference_wpm,
            paused_speed_ratio: settings.paused_speed_ratio,
            overshoot_damping: settings.overshoot_damping,
            accelerating_multiplier: settings.accelerating_multiplier,
            decelerating_multiplier: settings.decelerating_multiplier,
            buffer_zone: settings.buffer_zone,
            max_delta_time: settings.max_delta_time,
            smoothed_velocity: settings.min_velocity(),
            positions: FloatRing::new(settings.smoothing_buffer_capacity),
        }
    }

    /// Scroll state at rest: position 0, velocity at its lower bound.
    pub fn initial_state(&self) -> ScrollState {
        ScrollState {
            current_position: 0.0,
            target_position: 0.0,
            velocity: self.min_velocity,
            acceleration: 0.0,
            is_user_controlled: false,
            smoothing_buffer: Vec::new(),
            last_update_time: 0,
        }
    }

    /// Velocity the pace asks for, before smoothing.
    pub fn target_velocity(&self, input: &PhysicsInput) -> f64 {
        if input.is_paused {
            return self.base_speed * self.paused_speed_ratio;
        }
        let normalized = if self.reference_wpm > 0.0 && input.smoothed_wpm.is_finite() {
            input.smoothed_wpm.max(0.0) / self.reference_wpm
        } else {
            0.0
        };
        let trend = match input.trend {
            PaceTrend::Accelerating => self.accelerating_multiplier,
            PaceTrend::Decelerating => self.decelerating_multiplier,
            PaceTrend::Stable => 1.0,
        };
        normalized * self.base_speed * trend
    }

    #[inline]
    pub fn clamp_velocity(&self, velocity: f64) -> f64 {
        if !velocity.is_finite() {
            return self.min_velocity;
        }
        velocity.clamp(self.min_velocity, self.max_velocity)
    }

    /// Advance `state` by `delta_secs`. Position is left alone while the
    /// state is user controlled; velocity keeps tracking the pace either way.
    pub fn step(&mut self, state: &mut ScrollState, input: &PhysicsInput, delta_secs: f64) {
        let dt = if delta_secs.is_finite() {
            delta_secs.clamp(0.0, self.max_delta_time)
        } else {
            0.0
        };
        if dt <= 0.0 {
            return;
        }

        let target = self.target_velocity(input);
        self.smoothed_velocity =
            self.smoothing_factor * target + (1.0 - self.smoothing_factor) * self.smoothed_velocity;

        let confidence = if input.confidence.is_finite() {
            input.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let gain = (self.responsiveness * confidence * dt).clamp(0.0, 1.0);

        let previous = state.velocity;
        let mut velocity = self.clamp_velocity(previous + (self.smoothed_velocity - previous) * gain);

        if !state.is_user_controlled {
            state.current_position += velocity * dt;
            let gap = state.target_position - state.current_position;
            if velocity > 0.0 && gap < self.buffer_zone {
                velocity = self.clamp_velocity(velocity * self.overshoot_damping);
            }
            self.positions.push(state.current_position);
            state.smoothing_buffer = self.positions.to_vec();
        }

        state.acceleration = (velocity - previous) / dt;
        state.velocity = velocity;
    }

    /// Record a position set from outside the physics (manual scroll).
    pub fn note_position(&mut self, state: &mut ScrollState) {
        self.positions.push(state.current_position);
        state.smoothing_buffer = self.positions.to_vec();
    }

    pub fn reset(&mut self) {
        self.smoothed_velocity = self.min_velocity;
        self.positions.clear();
    }
}
