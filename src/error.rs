//! Error types for calibration, pose input and job handling.

use thiserror::Error;

use crate::counter::RepLabel;

/// A calibration profile that cannot drive a rep counter.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a finite angle in (0, 180], got {value}")]
    AngleOutOfRange { name: &'static str, value: f32 },

    #[error("reps.down_entry_angle ({entry}) must not be below reps.down_exit_angle ({exit})")]
    InvertedAngles { entry: f32, exit: f32 },

    #[error("{name} must be a finite, non-negative motion threshold, got {value}")]
    InvalidMotion { name: &'static str, value: f32 },

    #[error("motion.move_start ({start}) must not exceed motion.move_end ({end})")]
    InvertedMotion { start: f32, end: f32 },

    #[error("motion.ready_frames must be at least 1")]
    ZeroReadyFrames,

    #[error("motion.min_confidence must be in [0, 1], got {0}")]
    InvalidConfidence(f32),

    #[error("band for {label} must satisfy 0 <= above < up_to <= 180, got ({above}, {up_to}]")]
    BadBand {
        label: RepLabel,
        above: f32,
        up_to: f32,
    },

    #[error("bands for {first} and {second} overlap")]
    OverlappingBands { first: RepLabel, second: RepLabel },

    #[error("scoring.{name} must be finite and non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("scoring.grades must not be empty")]
    NoGrades,

    #[error("scoring.grades must have strictly decreasing min_score (at '{0}')")]
    UnorderedGrades(String),

    #[error("grade '{0}' has min_score above 100")]
    GradeOutOfRange(String),

    #[error("the last grade must have min_score = 0 so every score gets one")]
    GradesNotExhaustive,
}

/// A malformed line in a pose stream.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read pose stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Problems with a queued analysis job.
#[derive(Debug, Error, PartialEq)]
pub enum JobError {
    #[error("message body is not JSON: {0}")]
    BadBody(String),

    #[error("unknown message structure (keys: {0:?})")]
    UnknownMessage(Vec<String>),

    #[error("cannot parse video filename '{0}'")]
    BadFilename(String),

    #[error("unknown exercise id {0}")]
    UnknownExercise(u32),
}
