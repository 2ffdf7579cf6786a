//! Replay a recorded recognition log through the engine at a fixed frame rate
//! and print every scroll update as a JSON line.
//!
//! Each input line is either a word
//! `{"wordIndex":3,"word":"the","timestampMs":1200,"confidence":0.9}`
//! or a manual scroll `{"scrollTo":420.0,"timestampMs":5000}`.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use paceprompt::{
    AdaptiveScrollSettings, ChannelObserver, EngineError, EngineEvent, PaceEngine, ScriptAnalysis,
};

#[derive(clap::Parser)]
#[command(name = "paceprompt-replay", about = "Replay a recognition log through the scroll engine")]
struct Args {
    /// JSON-lines recognition log.
    events: PathBuf,

    #[arg(long)]
    total_words: usize,

    /// Rendered script height.
    #[arg(long, default_value_t = 1000.0)]
    height: f64,

    /// Settings JSON; missing keys take their defaults.
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Keep ticking this long after the last event.
    #[arg(long, default_value_t = 3_000)]
    tail_ms: u64,

    /// Emit logs on stderr as JSON.
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayEvent {
    #[serde(rename_all = "camelCase")]
    Word {
        word_index: usize,
        word: String,
        timestamp_ms: u64,
        #[serde(default = "full_confidence")]
        confidence: f64,
    },
    #[serde(rename_all = "camelCase")]
    Scroll { scroll_to: f64, timestamp_ms: u64 },
}

impl ReplayEvent {
    fn timestamp_ms(&self) -> u64 {
        match self {
            Self::Word { timestamp_ms, .. } | Self::Scroll { timestamp_ms, .. } => *timestamp_ms,
        }
    }
}

fn full_confidence() -> f64 {
    1.0
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameLine<'a> {
    time_ms: u64,
    #[serde(flatten)]
    event: &'a EngineEvent,
}

fn read_events(path: &Path) -> Result<Vec<ReplayEvent>, EngineError> {
    let display = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|source| EngineError::Io {
        path: display.clone(),
        source,
    })?;

    let mut events = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| EngineError::Io {
            path: display.clone(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line).map_err(|source| EngineError::Parse {
            path: display.clone(),
            source,
        })?;
        events.push(event);
    }
    events.sort_by_key(ReplayEvent::timestamp_ms);
    Ok(events)
}

fn main() -> Result<(), EngineError> {
    use clap::Parser;
    let args = Args::parse();
    paceprompt::init_tracing(args.json_logs);

    let settings = match &args.settings {
        Some(path) => AdaptiveScrollSettings::load_from_file(path)?,
        None => AdaptiveScrollSettings::default(),
    };
    let events = read_events(&args.events)?;
    info!(events = events.len(), total_words = args.total_words, "replay loaded");

    let (observer, rx) = ChannelObserver::new();
    let mut engine = PaceEngine::new(settings, Arc::new(observer))?;
    engine.initialize(ScriptAnalysis::uniform(args.total_words, args.height));
    engine.start(0);

    let frame_ms = (1_000 / u64::from(args.fps.max(1))).max(1);
    let end_ms = events.last().map_or(0, ReplayEvent::timestamp_ms) + args.tail_ms;
    let mut pending = events.into_iter().peekable();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut now_ms = 0;
    while now_ms <= end_ms {
        while let Some(event) = pending.next_if(|e| e.timestamp_ms() <= now_ms) {
            match event {
                ReplayEvent::Word {
                    word_index,
                    word,
                    timestamp_ms,
                    confidence,
                } => engine.ingest(word_index, &word, timestamp_ms, confidence),
                ReplayEvent::Scroll {
                    scroll_to,
                    timestamp_ms,
                } => engine.set_user_scroll_position(scroll_to, timestamp_ms),
            }
        }
        engine.tick(now_ms);

        for event in rx.try_iter() {
            if !matches!(event, EngineEvent::ScrollUpdate { .. }) {
                continue;
            }
            let line = FrameLine {
                time_ms: now_ms,
                event: &event,
            };
            let json = serde_json::to_string(&line).map_err(|source| EngineError::Parse {
                path: "<stdout>".to_string(),
                source,
            })?;
            writeln!(out, "{json}").map_err(|source| EngineError::Io {
                path: "<stdout>".to_string(),
                source,
            })?;
        }
        now_ms += frame_ms;
    }

    engine.stop();
    let state = engine.scroll_state();
    info!(
        position = state.current_position,
        target = state.target_position,
        average_wpm = engine.metrics().average_wpm,
        "replay finished"
    );
    Ok(())
}
