//! Pace metrics: instant / current / cumulative WPM, trend, and confidence,
//! recomputed from the timing history on every recognized word.

use serde::Serialize;

use crate::ring::FloatRing;
use crate::settings::AdaptiveScrollSettings;
use crate::timing::{TimingHistory, WordTiming};

/// Short-term direction of the speaker's pace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PaceTrend {
    Accelerating,
    Decelerating,
    #[default]
    Stable,
}

impl std::fmt::Display for PaceTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaceTrend::Accelerating => write!(f, "accelerating"),
            PaceTrend::Decelerating => write!(f, "decelerating"),
            PaceTrend::Stable => write!(f, "stable"),
        }
    }
}

/// Derived pace snapshot, rebuilt on every ingest and pause transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechPaceMetrics {
    #[serde(rename = "currentWPM")]
    pub current_wpm: f64,
    #[serde(rename = "averageWPM")]
    pub average_wpm: f64,
    #[serde(rename = "instantaneousWPM")]
    pub instantaneous_wpm: f64,
    /// Seconds since the most recent word.
    pub time_since_last_word: f64,
    /// Seconds from the first word of the session to the most recent one.
    pub speech_duration: f64,
    pub total_words_spoken: u64,
    pub is_paused: bool,
    pub pace_trend: PaceTrend,
    pub confidence_level: f64,
    /// Timestamp of the most recent word, when any.
    #[serde(skip)]
    pub last_word_at: Option<u64>,
}

impl SpeechPaceMetrics {
    /// Copy with `time_since_last_word` brought up to `now_ms`.
    pub fn at(&self, now_ms: u64) -> Self {
        let mut metrics = self.clone();
        if let Some(last) = self.last_word_at {
            metrics.time_since_last_word = now_ms.saturating_sub(last) as f64 / 1000.0;
        }
        metrics
    }
}

/// Classify a trend from the oldest and newest sampled WPM.
///
/// The threshold is a fraction of the speaker's own average, so naturally
/// fast or slow speakers are judged against their baseline.
pub fn classify_trend(samples: &FloatRing, average_wpm: f64, threshold: f64) -> PaceTrend {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return PaceTrend::Stable;
    };
    if samples.len() < 2 || average_wpm <= 0.0 {
        return PaceTrend::Stable;
    }
    let margin = average_wpm * threshold;
    let delta = last - first;
    if delta > margin {
        PaceTrend::Accelerating
    } else if delta < -margin {
        PaceTrend::Decelerating
    } else {
        PaceTrend::Stable
    }
}

/// Owns the word-timing history and derives metrics from it.
#[derive(Debug, Clone)]
pub struct PaceCalculator {
    history: TimingHistory,
    /// Current WPM per ingest; feeds velocity smoothing.
    wpm_samples: FloatRing,
    /// Current WPM sampled at most once per `trend_sample_interval_ms`.
    trend_samples: FloatRing,
    last_trend_sample_at: Option<u64>,
    metrics: SpeechPaceMetrics,

    instant_window: usize,
    current_window: usize,
    confidence_window: usize,
    smoothing_window: usize,
    trend_threshold: f64,
    trend_sample_interval_ms: u64,
}

impl PaceCalculator {
    pub fn new(settings: &AdaptiveScrollSettings) -> Self {
        Self {
            history: TimingHistory::new(settings.history_retention),
            wpm_samples: FloatRing::new(settings.smoothing_window),
            trend_samples: FloatRing::new(settings.trend_window),
            last_trend_sample_at: None,
            metrics: SpeechPaceMetrics::default(),
            instant_window: settings.instant_window,
            current_window: settings.current_window,
            confidence_window: settings.confidence_window,
            smoothing_window: settings.smoothing_window,
            trend_threshold: settings.trend_threshold,
            trend_sample_interval_ms: settings.trend_sample_interval_ms,
        }
    }

    /// Append a word and rebuild the metrics snapshot.
    ///
    /// `timestamp` must already be monotonic; `confidence` already in [0, 1].
    pub fn record(
        &mut self,
        word_index: usize,
        word: String,
        timestamp: u64,
        confidence: f64,
    ) -> &SpeechPaceMetrics {
        let timing = WordTiming {
            word_index,
            word,
            timestamp,
            confidence,
            instant_wpm: self.history.wpm_including(self.instant_window, timestamp),
            cumulative_wpm: self
                .history
                .wpm_including(self.history.retention(), timestamp),
        };
        self.history.push(timing);

        let instantaneous_wpm = self.history.wpm_over_last(self.instant_window);
        let current_wpm = self.history.wpm_over_last(self.current_window);
        let average_wpm = self.history.cumulative_wpm();

        if current_wpm > 0.0 {
            self.wpm_samples.push(current_wpm);
            let due = self
                .last_trend_sample_at
                .map_or(true, |at| timestamp.saturating_sub(at) >= self.trend_sample_interval_ms);
            if due {
                self.trend_samples.push(current_wpm);
                self.last_trend_sample_at = Some(timestamp);
            }
        }

        let speech_duration = self
            .history
            .first_timestamp()
            .map_or(0.0, |first| timestamp.saturating_sub(first) as f64 / 1000.0);

        self.metrics = SpeechPaceMetrics {
            current_wpm,
            average_wpm,
            instantaneous_wpm,
            time_since_last_word: 0.0,
            speech_duration,
            total_words_spoken: self.history.total_words(),
            is_paused: false,
            pace_trend: classify_trend(&self.trend_samples, average_wpm, self.trend_threshold),
            confidence_level: self.history.mean_confidence(self.confidence_window),
            last_word_at: Some(timestamp),
        };
        &self.metrics
    }

    /// Flip the pause flag on the current snapshot.
    pub fn set_paused(&mut self, paused: bool, now_ms: u64) -> &SpeechPaceMetrics {
        self.metrics = self.metrics.at(now_ms);
        self.metrics.is_paused = paused;
        &self.metrics
    }

    pub fn metrics(&self) -> &SpeechPaceMetrics {
        &self.metrics
    }

    /// Mean of the recent current-WPM samples; 0 before any pace is known.
    pub fn smoothed_wpm(&self) -> f64 {
        self.wpm_samples.mean_last(self.smoothing_window)
    }

    pub fn history(&self) -> &TimingHistory {
        &self.history
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.history.last_timestamp()
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.wpm_samples.clear();
        self.trend_samples.clear();
        self.last_trend_sample_at = None;
        self.metrics = SpeechPaceMetrics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn calculator() -> PaceCalculator {
        PaceCalculator::new(&AdaptiveScrollSettings::default())
    }

    fn feed(calc: &mut PaceCalculator, start_index: usize, start_ms: u64, count: usize, gap_ms: u64) {
        for i in 0..count {
            calc.record(start_index + i, "word".into(), start_ms + i as u64 * gap_ms, 0.9);
        }
    }

    #[test]
    fn empty_history_reports_zero() {
        let mut calc = calculator();
        let metrics = calc.record(0, "hello".into(), 1_000, 0.8).clone();
        assert_eq!(metrics.current_wpm, 0.0);
        assert_eq!(metrics.average_wpm, 0.0);
        assert_eq!(metrics.instantaneous_wpm, 0.0);
        assert_eq!(metrics.total_words_spoken, 1);
        assert_relative_eq!(metrics.confidence_level, 0.8);
        assert_eq!(calc.smoothed_wpm(), 0.0);
    }

    #[test]
    fn steady_pace_is_reported_across_windows() {
        let mut calc = calculator();
        feed(&mut calc, 0, 0, 20, 400);
        let metrics = calc.metrics();
        assert_relative_eq!(metrics.instantaneous_wpm, 150.0, epsilon = 1e-9);
        assert_relative_eq!(metrics.current_wpm, 150.0, epsilon = 1e-9);
        assert_relative_eq!(metrics.average_wpm, 150.0, epsilon = 1e-9);
        assert_eq!(metrics.pace_trend, PaceTrend::Stable);
        assert_relative_eq!(metrics.speech_duration, 7.6, epsilon = 1e-9);
        assert_relative_eq!(calc.smoothed_wpm(), 150.0, epsilon = 1e-9);
    }

    #[test]
    fn memoizes_rates_on_each_timing() {
        let mut calc = calculator();
        feed(&mut calc, 0, 0, 4, 400);
        let rates: Vec<f64> = calc.history().iter().map(|t| t.instant_wpm).collect();
        assert_eq!(rates[0], 0.0);
        assert_relative_eq!(rates[1], 150.0, epsilon = 1e-9);
        assert_relative_eq!(rates[3], 150.0, epsilon = 1e-9);
    }

    #[test]
    fn duplicate_timestamps_do_not_produce_nan() {
        let mut calc = calculator();
        for i in 0..5 {
            calc.record(i, "same".into(), 500, 1.0);
        }
        let metrics = calc.metrics();
        assert_eq!(metrics.current_wpm, 0.0);
        assert!(metrics.average_wpm.is_finite());
    }

    #[test]
    fn burst_after_steady_reading_accelerates() {
        let mut calc = calculator();
        feed(&mut calc, 0, 0, 25, 400);
        feed(&mut calc, 25, 9_650, 20, 50);
        assert_eq!(calc.metrics().pace_trend, PaceTrend::Accelerating);
    }

    #[test]
    fn slowing_down_decelerates() {
        let mut calc = calculator();
        feed(&mut calc, 0, 0, 30, 300);
        feed(&mut calc, 30, 9_300, 12, 900);
        assert_eq!(calc.metrics().pace_trend, PaceTrend::Decelerating);
    }

    #[test]
    fn trend_threshold_scales_with_average() {
        let mut ring = FloatRing::new(4);
        ring.push(200.0);
        ring.push(215.0);
        // 15 WPM rise: under 10% of a 200 WPM average, over 10% of 100 WPM
        assert_eq!(classify_trend(&ring, 200.0, 0.1), PaceTrend::Stable);
        assert_eq!(classify_trend(&ring, 100.0, 0.1), PaceTrend::Accelerating);
        assert_eq!(classify_trend(&ring, 0.0, 0.1), PaceTrend::Stable);
    }

    #[test]
    fn metrics_age_without_recompute() {
        let mut calc = calculator();
        feed(&mut calc, 0, 0, 3, 400);
        let later = calc.metrics().at(2_300);
        assert_relative_eq!(later.time_since_last_word, 1.5, epsilon = 1e-9);
        assert_eq!(later.current_wpm, calc.metrics().current_wpm);
    }

    #[test]
    fn reset_clears_everything() {
        let mut calc = calculator();
        feed(&mut calc, 0, 0, 10, 400);
        calc.reset();
        assert!(calc.history().is_empty());
        assert_eq!(calc.metrics(), &SpeechPaceMetrics::default());
        assert_eq!(calc.smoothed_wpm(), 0.0);
    }
}
