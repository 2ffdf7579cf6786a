//! Scroll target prediction: map the spoken word index, plus a look-ahead,
//! to a document offset. The target never moves backward.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

/// Document offset (height above) of a word in the rendered script.
pub trait HeightEstimator: Send + Sync {
    fn height_at(&self, word_index: usize) -> f64;
}

impl<F> HeightEstimator for F
where
    F: Fn(usize) -> f64 + Send + Sync,
{
    fn height_at(&self, word_index: usize) -> f64 {
        self(word_index)
    }
}

/// Heights spread evenly from 0 at the first word to `total_height` at the last.
#[derive(Debug, Clone, Copy)]
pub struct LinearHeights {
    pub total_words: usize,
    pub total_height: f64,
}

impl HeightEstimator for LinearHeights {
    fn height_at(&self, word_index: usize) -> f64 {
        if self.total_words <= 1 {
            return 0.0;
        }
        let last = self.total_words - 1;
        self.total_height * word_index.min(last) as f64 / last as f64
    }
}

/// Read-only script layout supplied once per session.
#[derive(Clone)]
pub struct ScriptAnalysis {
    pub total_words: usize,
    pub heights: Arc<dyn HeightEstimator>,
}

impl ScriptAnalysis {
    pub fn new(total_words: usize, heights: Arc<dyn HeightEstimator>) -> Self {
        Self {
            total_words,
            heights,
        }
    }

    /// Script laid out at a uniform height per word.
    pub fn uniform(total_words: usize, total_height: f64) -> Self {
        Self::new(
            total_words,
            Arc::new(LinearHeights {
                total_words,
                total_height,
            }),
        )
    }

    /// Height of the final word, or 0 for degenerate scripts.
    pub fn total_height(&self) -> f64 {
        if self.total_words == 0 {
            return 0.0;
        }
        let height = self.heights.height_at(self.total_words - 1);
        if height.is_finite() && height > 0.0 {
            height
        } else {
            0.0
        }
    }
}

impl fmt::Debug for ScriptAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptAnalysis")
            .field("total_words", &self.total_words)
            .field("total_height", &self.total_height())
            .finish()
    }
}

/// Fraction of the script covered at `word_index`, in [0, 1].
/// None for scripts of one word or fewer.
#[inline]
pub fn progress_ratio(word_index: usize, total_words: usize) -> Option<f64> {
    if total_words <= 1 {
        return None;
    }
    let last = total_words - 1;
    Some(word_index.min(last) as f64 / last as f64)
}

#[derive(Debug, Clone)]
pub struct ScrollTargetPredictor {
    script: Option<ScriptAnalysis>,
    look_ahead_words: usize,
    buffer_zone: f64,
    /// Furthest word predicted from; rewinds never pull it back.
    furthest_word_index: Option<usize>,
}

impl ScrollTargetPredictor {
    pub fn new(look_ahead_words: usize, buffer_zone: f64) -> Self {
        Self {
            script: None,
            look_ahead_words,
            buffer_zone,
            furthest_word_index: None,
        }
    }

    pub fn set_script(&mut self, script: ScriptAnalysis) {
        debug!(total_words = script.total_words, "script_loaded");
        self.script = Some(script);
        self.furthest_word_index = None;
    }

    /// Forget the furthest word reached; the script stays loaded.
    pub fn reset(&mut self) {
        self.furthest_word_index = None;
    }

    pub fn script(&self) -> Option<&ScriptAnalysis> {
        self.script.as_ref()
    }

    /// New target for `word_index`, given the scroll's `current_position` and
    /// the `previous_target`. Returns `previous_target` unchanged whenever the
    /// script cannot support a prediction, and never anything below it.
    ///
    /// A rewound index predicts from the furthest word already reached, and
    /// the target never passes the end of the laid-out script plus the
    /// buffer zone.
    pub fn predict(
        &mut self,
        word_index: usize,
        current_position: f64,
        previous_target: f64,
    ) -> f64 {
        let Some(script) = &self.script else {
            return previous_target;
        };
        let word_index = match self.furthest_word_index {
            Some(furthest) if furthest > word_index => furthest,
            _ => word_index,
        };
        self.furthest_word_index = Some(word_index);

        let Some(progress) = progress_ratio(word_index, script.total_words) else {
            return previous_target;
        };

        let Some(total_height) = self.estimate_total_height(script, progress, current_position)
        else {
            return previous_target;
        };

        let future_index = word_index.saturating_add(self.look_ahead_words);
        let future_progress =
            progress_ratio(future_index, script.total_words).unwrap_or(progress);
        let mut target = total_height * future_progress + self.buffer_zone;

        let layout = script.total_height();
        if layout > 0.0 {
            target = target.min(layout + self.buffer_zone);
        }

        if target.is_finite() && target > previous_target {
            target
        } else {
            previous_target
        }
    }

    /// Document height implied by how far the scroll has travelled for this
    /// much progress; falls back to the script layout before any travel.
    fn estimate_total_height(
        &self,
        script: &ScriptAnalysis,
        progress: f64,
        current_position: f64,
    ) -> Option<f64> {
        if progress > 0.0 && current_position > 0.0 {
            let estimate = current_position / progress;
            if estimate.is_finite() {
                return Some(estimate);
            }
        }
        let layout = script.total_height();
        (layout > 0.0).then_some(layout)
    }
}
