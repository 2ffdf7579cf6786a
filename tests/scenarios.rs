//! End-to-end behaviour of the caller-clocked engine.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use paceprompt::{
    AdaptiveScrollSettings, ChannelObserver, EngineEvent, PaceEngine, PaceTrend, ScriptAnalysis,
    ScrollState,
};

const FRAME_MS: u64 = 16;
const WORD_GAP_MS: u64 = 400;

fn engine(total_words: usize, height: f64) -> (PaceEngine, Receiver<EngineEvent>) {
    let (observer, rx) = ChannelObserver::new();
    let mut engine = PaceEngine::new(AdaptiveScrollSettings::default(), Arc::new(observer)).unwrap();
    engine.initialize(ScriptAnalysis::uniform(total_words, height));
    engine.start(0);
    (engine, rx)
}

/// Tick every frame over `[from, to]`, ingesting a word whenever `gap_ms`
/// divides the frame time. Returns the next word index.
fn speak(engine: &mut PaceEngine, from: u64, to: u64, gap_ms: u64, mut word_index: usize) -> usize {
    let mut now = from;
    while now <= to {
        if now % gap_ms == 0 {
            engine.ingest(word_index, "word", now, 0.95);
            word_index += 1;
        }
        engine.tick(now);
        now += FRAME_MS;
    }
    word_index
}

fn states(rx: &Receiver<EngineEvent>) -> Vec<ScrollState> {
    rx.try_iter()
        .filter_map(|event| match event {
            EngineEvent::ScrollStateChange { state } => Some(state),
            _ => None,
        })
        .collect()
}

/// Small deterministic generator for adversarial input.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

#[test]
fn steady_reader_stays_within_buffer_of_spoken_word() {
    // 51 words laid out over 1000 units: word 25 sits at 500, spoken at t=10s.
    let (mut engine, _rx) = engine(51, 1000.0);
    let next = speak(&mut engine, 0, 10_000, WORD_GAP_MS, 0);
    assert_eq!(next, 26);

    let metrics = engine.metrics();
    assert!((metrics.current_wpm - 150.0).abs() < 1e-6);
    assert_eq!(metrics.pace_trend, PaceTrend::Stable);
    assert!(!metrics.is_paused);

    let state = engine.scroll_state();
    assert!(
        (state.current_position - 500.0).abs() <= 100.0,
        "position {} too far from word 25",
        state.current_position
    );
}

#[test]
fn silence_pauses_once_and_velocity_decays() {
    let (mut engine, rx) = engine(51, 1000.0);
    speak(&mut engine, 0, 10_000, WORD_GAP_MS, 0);
    let speaking_velocity = engine.scroll_state().velocity;
    let _: Vec<EngineEvent> = rx.try_iter().collect();

    let mut now = 10_000 + FRAME_MS;
    while now <= 20_000 {
        engine.tick(now);
        now += FRAME_MS;
    }

    let events: Vec<EngineEvent> = rx.try_iter().collect();
    let pauses = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::PaceChange { metrics } if metrics.is_paused))
        .count();
    assert_eq!(pauses, 1);
    assert!(engine.metrics().is_paused);

    let velocity = engine.scroll_state().velocity;
    assert!(velocity < 6.0, "velocity {velocity} did not decay");
    assert!(velocity < speaking_velocity);
    assert!(velocity >= 5.0);
}

#[test]
fn word_after_pause_resumes() {
    let (mut engine, _rx) = engine(51, 1000.0);
    speak(&mut engine, 0, 4_000, WORD_GAP_MS, 0);
    engine.tick(7_000);
    assert!(engine.metrics().is_paused);
    engine.ingest(11, "back", 7_100, 0.9);
    assert!(!engine.metrics().is_paused);
}

#[test]
fn burst_reads_as_accelerating() {
    let (mut engine, _rx) = engine(400, 8000.0);
    let next = speak(&mut engine, 0, 10_000, WORD_GAP_MS, 0);
    assert_eq!(engine.metrics().pace_trend, PaceTrend::Stable);
    let cruising = engine.scroll_state().velocity;

    speak(&mut engine, 10_000 + FRAME_MS, 12_800, 208, next);
    assert_eq!(engine.metrics().pace_trend, PaceTrend::Accelerating);
    assert!(engine.scroll_state().velocity > cruising);
}

#[test]
fn twenty_words_in_one_second_reads_as_accelerating() {
    let (mut engine, _rx) = engine(400, 8000.0);
    let next = speak(&mut engine, 0, 10_000, WORD_GAP_MS, 0);
    for k in 0..20 {
        engine.ingest(next + k, "quick", 10_048 + k as u64 * 48, 0.9);
    }
    let metrics = engine.metrics();
    assert!(metrics.current_wpm > 240.0);
    assert_eq!(metrics.pace_trend, PaceTrend::Accelerating);
}

#[test]
fn slowdown_reads_as_decelerating() {
    let (mut engine, _rx) = engine(400, 8000.0);
    let next = speak(&mut engine, 0, 10_000, WORD_GAP_MS, 0);
    let cruising = engine.scroll_state().velocity;

    speak(&mut engine, 10_000 + FRAME_MS, 16_000, 800, next);
    assert_eq!(engine.metrics().pace_trend, PaceTrend::Decelerating);
    assert!(engine.scroll_state().velocity < cruising);
}

#[test]
fn manual_scroll_holds_for_quiescence_window() {
    let (mut engine, rx) = engine(51, 1000.0);
    let next = speak(&mut engine, 0, 4_992, WORD_GAP_MS, 0);
    engine.set_user_scroll_position(300.0, 5_000);
    let _: Vec<EngineEvent> = rx.try_iter().collect();

    let next = speak(&mut engine, 5_008, 6_992, WORD_GAP_MS, next);
    let held = states(&rx);
    assert!(!held.is_empty());
    assert!(held
        .iter()
        .all(|s| s.current_position == 300.0 && s.is_user_controlled));

    speak(&mut engine, 7_008, 8_000, WORD_GAP_MS, next);
    let resumed = engine.scroll_state();
    assert!(!resumed.is_user_controlled);
    assert!(resumed.current_position > 300.0);
}

#[test]
fn target_never_moves_backwards() {
    let (mut engine, rx) = engine(100, 2000.0);
    let mut now = 0;
    for word_index in [0, 5, 10, 20, 15, 3, 25, 22, 30, 1, 40] {
        engine.ingest(word_index, "word", now, 0.9);
        for _ in 0..25 {
            engine.tick(now);
            now += FRAME_MS;
        }
    }

    let targets: Vec<f64> = states(&rx).iter().map(|s| s.target_position).collect();
    assert!(targets.len() > 200);
    assert!(targets.windows(2).all(|w| w[1] >= w[0]));
}

#[test]
fn adversarial_input_keeps_everything_bounded() {
    let settings = AdaptiveScrollSettings::default();
    let (lower, upper) = (settings.min_velocity(), settings.max_velocity());
    let (mut engine, rx) = engine(300, 6000.0);
    let mut rng = Lcg(7);
    let mut now: u64 = 0;

    for _ in 0..2_000 {
        match rng.below(10) {
            0..=5 => {
                let word_index = rng.below(300) as usize;
                let confidence = rng.below(300) as f64 / 100.0 - 0.5;
                // Same-millisecond bursts, small skew back in time, long gaps.
                let timestamp = now.saturating_sub(rng.below(3) * 50);
                engine.ingest(word_index, "w", timestamp, confidence);
            }
            6 => engine.ingest(rng.below(300) as usize, "w", now, f64::NAN),
            7 => engine.set_user_scroll_position(rng.below(6000) as f64, now),
            _ => {}
        }
        engine.tick(now);
        now += [0, 1, FRAME_MS, 250, 3_500][rng.below(5) as usize];

        let metrics = engine.metrics();
        for value in [
            metrics.current_wpm,
            metrics.average_wpm,
            metrics.instantaneous_wpm,
            metrics.confidence_level,
        ] {
            assert!(value.is_finite() && value >= 0.0, "bad metric {value}");
        }
        assert!((0.0..=1.0).contains(&metrics.confidence_level));
    }

    for state in states(&rx) {
        assert!(state.velocity >= lower && state.velocity <= upper);
        assert!(state.current_position.is_finite());
        assert!(state.target_position.is_finite());
    }
}

#[test]
fn reset_then_replay_is_deterministic() {
    let (mut engine, rx) = engine(120, 2400.0);
    let run = |engine: &mut PaceEngine| {
        let next = speak(engine, 0, 6_000, WORD_GAP_MS, 0);
        engine.set_user_scroll_position(180.0, 6_100);
        speak(engine, 6_112, 9_000, 320, next);
    };

    run(&mut engine);
    let first: Vec<EngineEvent> = rx.try_iter().collect();

    engine.reset();
    assert_eq!(engine.history_len(), 0);
    engine.start(0);
    run(&mut engine);
    let second: Vec<EngineEvent> = rx.try_iter().collect();

    assert!(!first.is_empty());
    assert_eq!(first, second);
}
