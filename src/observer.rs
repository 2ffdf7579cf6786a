//! Outbound notifications to the rendering layer.

use crossbeam_channel as cb;
use serde::Serialize;

use crate::pace::SpeechPaceMetrics;
use crate::physics::ScrollState;

/// Receives engine output. All methods default to no-ops.
///
/// Ordering: the pace change produced by an ingest is delivered before any
/// scroll update computed from it; within one tick `on_scroll_update`
/// precedes `on_scroll_state_change`.
pub trait ScrollObserver: Send + Sync {
    fn on_scroll_update(&self, _position: f64, _velocity: f64, _metrics: &SpeechPaceMetrics) {}

    fn on_pace_change(&self, _metrics: &SpeechPaceMetrics) {}

    fn on_scroll_state_change(&self, _state: &ScrollState) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ScrollObserver for NoopObserver {}

/// One notification, as carried by [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EngineEvent {
    ScrollUpdate {
        position: f64,
        velocity: f64,
        metrics: SpeechPaceMetrics,
    },
    PaceChange {
        metrics: SpeechPaceMetrics,
    },
    ScrollStateChange {
        state: ScrollState,
    },
}

/// Forwards notifications over an unbounded crossbeam channel, so the
/// consumer can sit on any thread. Sends never block.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: cb::Sender<EngineEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, cb::Receiver<EngineEvent>) {
        let (tx, rx) = cb::unbounded();
        (Self { tx }, rx)
    }

    fn send(&self, event: EngineEvent) {
        // A dropped receiver only means nobody is rendering any more.
        let _ = self.tx.send(event);
    }
}

impl ScrollObserver for ChannelObserver {
    fn on_scroll_update(&self, position: f64, velocity: f64, metrics: &SpeechPaceMetrics) {
        self.send(EngineEvent::ScrollUpdate {
            position,
            velocity,
            metrics: metrics.clone(),
        });
    }

    fn on_pace_change(&self, metrics: &SpeechPaceMetrics) {
        self.send(EngineEvent::PaceChange {
            metrics: metrics.clone(),
        });
    }

    fn on_scroll_state_change(&self, state: &ScrollState) {
        self.send(EngineEvent::ScrollStateChange {
            state: state.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_observer_preserves_order() {
        let (observer, rx) = ChannelObserver::new();
        let metrics = SpeechPaceMetrics::default();
        observer.on_pace_change(&metrics);
        observer.on_scroll_update(1.0, 2.0, &metrics);
        let events: Vec<EngineEvent> = rx.try_iter().collect();
        assert!(matches!(events[0], EngineEvent::PaceChange { .. }));
        assert!(matches!(
            events[1],
            EngineEvent::ScrollUpdate { position, velocity, .. } if position == 1.0 && velocity == 2.0
        ));
    }

    #[test]
    fn dropped_receiver_is_ignored() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_pace_change(&SpeechPaceMetrics::default());
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = EngineEvent::PaceChange {
            metrics: SpeechPaceMetrics::default(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "paceChange");
        assert_eq!(json["metrics"]["currentWPM"], 0.0);
        assert_eq!(json["metrics"]["paceTrend"], "stable");
    }
}
