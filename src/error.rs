//! Error types. The numeric core itself never fails; these cover
//! configuration and the async driver.

use thiserror::Error;

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} must be > 0, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be >= 0, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be within [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },

    #[error("{field} window must hold at least {min} samples, got {value}")]
    WindowTooSmall {
        field: &'static str,
        min: usize,
        value: usize,
    },

    #[error("decelerationLimit ({deceleration}) exceeds accelerationLimit ({acceleration})")]
    InvertedSpeedLimits { deceleration: f64, acceleration: f64 },
}

/// Errors surfaced by the engine's outer layers.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// `FrameScheduler::start` was called outside a tokio runtime.
    #[error("no tokio runtime available to drive the frame loop")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, EngineError>;
