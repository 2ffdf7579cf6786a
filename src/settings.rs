//! Adaptive scroll configuration, fixed for the lifetime of a session.
//! Serialized camelCase so settings written by the UI layer load unchanged.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, SettingsError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdaptiveScrollSettings {
    /// When false the engine ignores words and never moves the scroll.
    pub enabled: bool,
    /// Scroll speed (units/s) at the reference reading rate.
    pub base_scroll_speed: f64,
    pub responsiveness: f64,
    /// EMA weight given to the new target velocity.
    pub smoothing_factor: f64,
    /// Seconds of silence before the speaker counts as paused.
    pub pause_threshold: f64,
    /// Upper velocity bound as a multiple of `base_scroll_speed`.
    pub acceleration_limit: f64,
    /// Lower velocity bound as a multiple of `base_scroll_speed`.
    pub deceleration_limit: f64,
    pub look_ahead_words: usize,
    /// Gap (document units) kept between the target word and the viewport edge.
    pub buffer_zone: f64,

    /// Trend threshold as a fraction of the speaker's average WPM.
    pub trend_threshold: f64,
    pub reference_wpm: f64,
    /// Target velocity while paused, as a fraction of `base_scroll_speed`.
    pub paused_speed_ratio: f64,
    /// Velocity factor applied per tick when closing in on the target.
    pub overshoot_damping: f64,
    pub accelerating_multiplier: f64,
    pub decelerating_multiplier: f64,
    /// Seconds after the last manual scroll before physics resumes control.
    pub quiescence_window: f64,
    /// Largest delta time (seconds) integrated in a single tick.
    pub max_delta_time: f64,
    pub frame_interval_ms: u64,
    /// Maximum number of word timings retained.
    pub history_retention: usize,
    pub instant_window: usize,
    pub current_window: usize,
    pub smoothing_window: usize,
    pub confidence_window: usize,
    pub trend_window: usize,
    pub trend_sample_interval_ms: u64,
    pub smoothing_buffer_capacity: usize,
}

impl Default for AdaptiveScrollSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_scroll_speed: 50.0,
            responsiveness: 0.7,
            smoothing_factor: 0.8,
            pause_threshold: 2.0,
            acceleration_limit: 3.0,
            deceleration_limit: 0.1,
            look_ahead_words: 5,
            buffer_zone: 100.0,

            trend_threshold: 0.1,
            reference_wpm: 150.0,
            paused_speed_ratio: 0.1,
            overshoot_damping: 0.8,
            accelerating_multiplier: 1.2,
            decelerating_multiplier: 0.8,
            quiescence_window: 2.0,
            max_delta_time: 0.1,
            frame_interval_ms: 16,
            history_retention: 500,
            instant_window: 3,
            current_window: 10,
            smoothing_window: 10,
            confidence_window: 5,
            trend_window: 10,
            trend_sample_interval_ms: 500,
            smoothing_buffer_capacity: 30,
        }
    }
}

impl AdaptiveScrollSettings {
    /// Load settings from a JSON file. Missing keys take their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, EngineError> {
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: shown.clone(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&raw).map_err(|source| EngineError::Parse {
            path: shown.clone(),
            source,
        })?;
        settings.validate()?;
        info!(path = %shown, "scroll settings loaded");
        Ok(settings)
    }

    /// Check every value the engine divides by, clamps with, or sizes buffers from.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let finite = [
            ("baseScrollSpeed", self.base_scroll_speed),
            ("responsiveness", self.responsiveness),
            ("smoothingFactor", self.smoothing_factor),
            ("pauseThreshold", self.pause_threshold),
            ("accelerationLimit", self.acceleration_limit),
            ("decelerationLimit", self.deceleration_limit),
            ("bufferZone", self.buffer_zone),
            ("trendThreshold", self.trend_threshold),
            ("referenceWpm", self.reference_wpm),
            ("pausedSpeedRatio", self.paused_speed_ratio),
            ("overshootDamping", self.overshoot_damping),
            ("acceleratingMultiplier", self.accelerating_multiplier),
            ("deceleratingMultiplier", self.decelerating_multiplier),
            ("quiescenceWindow", self.quiescence_window),
            ("maxDeltaTime", self.max_delta_time),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(SettingsError::NotFinite { field, value });
            }
        }

        let positive = [
            ("baseScrollSpeed", self.base_scroll_speed),
            ("pauseThreshold", self.pause_threshold),
            ("accelerationLimit", self.acceleration_limit),
            ("referenceWpm", self.reference_wpm),
            ("maxDeltaTime", self.max_delta_time),
            ("frameIntervalMs", self.frame_interval_ms as f64),
        ];
        for (field, value) in positive {
            if value <= 0.0 {
                return Err(SettingsError::NotPositive { field, value });
            }
        }

        let unit = [
            ("smoothingFactor", self.smoothing_factor),
            ("overshootDamping", self.overshoot_damping),
            ("pausedSpeedRatio", self.paused_speed_ratio),
        ];
        for (field, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(SettingsError::OutOfUnitRange { field, value });
            }
        }

        let non_negative = [
            ("responsiveness", self.responsiveness),
            ("decelerationLimit", self.deceleration_limit),
            ("bufferZone", self.buffer_zone),
            ("trendThreshold", self.trend_threshold),
            ("acceleratingMultiplier", self.accelerating_multiplier),
            ("deceleratingMultiplier", self.decelerating_multiplier),
            ("quiescenceWindow", self.quiescence_window),
        ];
        for (field, value) in non_negative {
            if value < 0.0 {
                return Err(SettingsError::Negative { field, value });
            }
        }

        if self.deceleration_limit > self.acceleration_limit {
            return Err(SettingsError::InvertedSpeedLimits {
                deceleration: self.deceleration_limit,
                acceleration: self.acceleration_limit,
            });
        }

        let windows = [
            ("instantWindow", self.instant_window, 2),
            ("currentWindow", self.current_window, 2),
            ("historyRetention", self.history_retention, 2),
            ("smoothingWindow", self.smoothing_window, 1),
            ("confidenceWindow", self.confidence_window, 1),
            ("trendWindow", self.trend_window, 2),
            ("smoothingBufferCapacity", self.smoothing_buffer_capacity, 1),
        ];
        for (field, value, min) in windows {
            if value < min {
                return Err(SettingsError::WindowTooSmall { field, min, value });
            }
        }

        Ok(())
    }

    /// Lowest velocity the physics engine may produce.
    #[inline]
    pub fn min_velocity(&self) -> f64 {
        self.base_scroll_speed * self.deceleration_limit
    }

    /// Highest velocity the physics engine may produce.
    #[inline]
    pub fn max_velocity(&self) -> f64 {
        self.base_scroll_speed * self.acceleration_limit
    }

    pub fn pause_threshold_ms(&self) -> u64 {
        secs_to_ms(self.pause_threshold)
    }

    pub fn quiescence_window_ms(&self) -> u64 {
        secs_to_ms(self.quiescence_window)
    }

    pub fn pause_threshold_duration(&self) -> Duration {
        Duration::from_millis(self.pause_threshold_ms())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

fn secs_to_ms(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let settings = AdaptiveScrollSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.min_velocity(), 5.0);
        assert_eq!(settings.max_velocity(), 150.0);
        assert_eq!(settings.pause_threshold_ms(), 2000);
        assert_eq!(settings.quiescence_window_ms(), 2000);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: AdaptiveScrollSettings =
            serde_json::from_str(r#"{"baseScrollSpeed": 80, "lookAheadWords": 8}"#).unwrap();
        assert_eq!(settings.base_scroll_speed, 80.0);
        assert_eq!(settings.look_ahead_words, 8);
        assert_eq!(settings.smoothing_factor, 0.8);
        assert!(settings.enabled);
    }

    #[test]
    fn rejects_inverted_limits() {
        let settings = AdaptiveScrollSettings {
            deceleration_limit: 4.0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvertedSpeedLimits { .. })
        ));
    }

    #[test]
    fn rejects_smoothing_outside_unit_range() {
        let settings = AdaptiveScrollSettings {
            smoothing_factor: 1.5,
            ..Default::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::OutOfUnitRange {
                field: "smoothingFactor",
                value: 1.5
            })
        );
    }

    #[test]
    fn rejects_nan_speed() {
        let settings = AdaptiveScrollSettings {
            base_scroll_speed: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::NotFinite { field: "baseScrollSpeed", .. })
        ));
    }

    #[test]
    fn rejects_single_word_windows() {
        let settings = AdaptiveScrollSettings {
            instant_window: 1,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::WindowTooSmall { field: "instantWindow", .. })
        ));
    }

    #[test]
    fn load_from_file_reports_missing_path() {
        let err = AdaptiveScrollSettings::load_from_file(Path::new("/nonexistent/settings.json"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }

    #[test]
    fn load_from_file_reads_partial_json() {
        let path = std::env::temp_dir().join(format!(
            "paceprompt-settings-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"pauseThreshold": 3.5, "bufferZone": 40}"#).unwrap();
        let loaded = AdaptiveScrollSettings::load_from_file(&path);
        std::fs::remove_file(&path).unwrap();

        let settings = loaded.unwrap();
        assert_eq!(settings.pause_threshold_ms(), 3_500);
        assert_eq!(settings.buffer_zone, 40.0);
        assert_eq!(settings.look_ahead_words, 5);
    }
}
