//! Per-frame audit trail with a caller-chosen retention policy.

use serde::Serialize;
use std::collections::VecDeque;
use std::str::FromStr;

use crate::counter::Stage;
use crate::legs::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    Off,
    All,
    /// Keep only the newest `n` frames.
    Last(usize),
}

impl FromStr for Retention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Retention::Off),
            "all" => Ok(Retention::All),
            n => n
                .parse::<usize>()
                .map(Retention::Last)
                .map_err(|_| format!("trace retention must be off, all or a frame count, got '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub frame: u64,
    pub has_pose: bool,
    /// Stage going into this frame.
    pub stage: Stage,
    pub knee_angle: Option<f32>,
    pub side: Option<Side>,
}

#[derive(Debug, Clone)]
pub struct FrameTrace {
    retention: Retention,
    entries: VecDeque<TraceEntry>,
    dropped: u64,
}

impl FrameTrace {
    pub fn new(retention: Retention) -> Self {
        Self {
            retention,
            entries: VecDeque::new(),
            dropped: 0,
        }
    }

    pub fn record(&mut self, entry: TraceEntry) {
        match self.retention {
            Retention::Off => {}
            Retention::All => self.entries.push_back(entry),
            Retention::Last(0) => self.dropped += 1,
            Retention::Last(n) => {
                if self.entries.len() == n {
                    self.entries.pop_front();
                    self.dropped += 1;
                }
                self.entries.push_back(entry);
            }
        }
    }

    /// Frames evicted by a bounded retention.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<TraceEntry> {
        self.entries.into()
    }
}
