//! Paceprompt: teleprompter scrolling that follows the speaker.
//!
//! Recognized words flow into a pace tracker (WPM, trend, confidence, pause
//! state). A frame loop turns the current pace into a velocity, predicts how
//! far down the script the speaker will be shortly, and integrates a smoothed,
//! bounded scroll position toward it. Manual scrolling takes over until the
//! user lets go.
//!
//! `PaceEngine` is the deterministic, caller-clocked core. `FrameScheduler`
//! runs the same core on a tokio runtime with real timers.

pub mod cancellation;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod observer;
pub mod pace;
pub mod pause;
pub mod physics;
pub mod predictor;
pub mod ring;
pub mod scheduler;
pub mod settings;
pub mod timing;

pub use engine::{PaceEngine, PaceSnapshot, PaceTracker, ScrollController};
pub use error::{EngineError, Result, SettingsError};
pub use observer::{ChannelObserver, EngineEvent, NoopObserver, ScrollObserver};
pub use pace::{PaceTrend, SpeechPaceMetrics};
pub use physics::ScrollState;
pub use predictor::{HeightEstimator, LinearHeights, ScriptAnalysis};
pub use scheduler::FrameScheduler;
pub use settings::AdaptiveScrollSettings;
pub use timing::WordTiming;

/// Install the global fmt subscriber on stderr. `RUST_LOG` overrides the
/// default `paceprompt=info` filter; `json` switches to one JSON object per
/// event. Safe to call more than once.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("paceprompt=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
