//! Word timing history: append-only, trimmed from the front at a retention cap.

use std::collections::VecDeque;

use serde::Serialize;

const MS_PER_MINUTE: f64 = 60_000.0;

/// One recognized word. WPM fields are memoized at ingest time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordTiming {
    pub word_index: usize,
    pub word: String,
    /// Monotonic milliseconds on the session clock.
    pub timestamp: u64,
    pub confidence: f64,
    pub instant_wpm: f64,
    pub cumulative_wpm: f64,
}

/// Words per minute for `words` arrivals spanning `first_ms..=last_ms`.
///
/// `words` counts arrivals, so the rate covers `words - 1` intervals.
/// Returns 0 for fewer than two words or a non-positive span.
#[inline]
pub fn words_per_minute(words: usize, first_ms: u64, last_ms: u64) -> f64 {
    if words < 2 || last_ms <= first_ms {
        return 0.0;
    }
    let span_minutes = (last_ms - first_ms) as f64 / MS_PER_MINUTE;
    (words - 1) as f64 / span_minutes
}

/// Bounded, ordered history of word timings.
#[derive(Debug, Clone)]
pub struct TimingHistory {
    entries: VecDeque<WordTiming>,
    retention: usize,
    /// Timestamp of the first word since the last clear; survives trimming.
    first_timestamp: Option<u64>,
    total_words: u64,
}

impl TimingHistory {
    pub fn new(retention: usize) -> Self {
        let retention = retention.max(2);
        Self {
            entries: VecDeque::with_capacity(retention.min(1024)),
            retention,
            first_timestamp: None,
            total_words: 0,
        }
    }

    /// Append a timing, evicting the oldest entries past the retention cap.
    pub fn push(&mut self, timing: WordTiming) {
        if self.first_timestamp.is_none() {
            self.first_timestamp = Some(timing.timestamp);
        }
        self.total_words += 1;
        self.entries.push_back(timing);
        while self.entries.len() > self.retention {
            self.entries.pop_front();
        }
    }

    /// Rate over the most recent `n` retained timings.
    pub fn wpm_over_last(&self, n: usize) -> f64 {
        let n = n.min(self.entries.len());
        if n < 2 {
            return 0.0;
        }
        let first = &self.entries[self.entries.len() - n];
        let last = &self.entries[self.entries.len() - 1];
        words_per_minute(n, first.timestamp, last.timestamp)
    }

    /// Rate over the last `n` timings as if a word at `timestamp` were appended.
    /// Lets rates be memoized on a timing before it enters the history.
    pub fn wpm_including(&self, n: usize, timestamp: u64) -> f64 {
        let n = n.min(self.entries.len() + 1).min(self.retention);
        if n < 2 {
            return 0.0;
        }
        let first = self.entries[self.entries.len() + 1 - n].timestamp;
        words_per_minute(n, first, timestamp)
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Rate over every retained timing.
    pub fn cumulative_wpm(&self) -> f64 {
        self.wpm_over_last(self.entries.len())
    }

    /// Arithmetic mean of the last `n` confidences; 0 with no data.
    pub fn mean_confidence(&self, n: usize) -> f64 {
        let n = n.min(self.entries.len());
        if n == 0 {
            return 0.0;
        }
        let sum: f64 = self.entries.iter().rev().take(n).map(|t| t.confidence).sum();
        sum / n as f64
    }

    pub fn last(&self) -> Option<&WordTiming> {
        self.entries.back()
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.entries.back().map(|t| t.timestamp)
    }

    pub fn first_timestamp(&self) -> Option<u64> {
        self.first_timestamp
    }

    /// Words ingested since the last clear, including trimmed ones.
    pub fn total_words(&self) -> u64 {
        self.total_words
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WordTiming> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.first_timestamp = None;
        self.total_words = 0;
    }
}
