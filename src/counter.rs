//! Per-frame rep state machine.
//!
//! Consumes `(knee_angle, hip_motion)` pairs in frame order. Counting only
//! begins once the subject has stood still for a while (or visibly started
//! bending), and the up/down stage uses two thresholds so that an angle
//! hovering around a single value does not chatter between stages.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{Band, MotionThresholds, Profile, RepThresholds};
use crate::error::ConfigError;

/// Upper bound of a knee angle; the running minimum restarts here.
pub const ANGLE_SENTINEL: f32 = 180.0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RepLabel {
    Half,
    Basic,
    Full,
    Fail,
}

impl RepLabel {
    pub const ALL: [RepLabel; 4] = [
        RepLabel::Half,
        RepLabel::Basic,
        RepLabel::Full,
        RepLabel::Fail,
    ];
}

impl fmt::Display for RepLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepLabel::Half => "half",
            RepLabel::Basic => "basic",
            RepLabel::Full => "full",
            RepLabel::Fail => "fail",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Unset,
    Down,
    Up,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepResult {
    #[serde(rename = "rep")]
    pub rep_index: u32,
    pub label: RepLabel,
    pub min_knee_angle: i32,
    pub frame_start: u64,
    pub frame_end: u64,
}

/// What a single frame did to the counter.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Still waiting for the subject to settle.
    Waiting,
    /// Counting begins with the next frame.
    Started,
    /// Inside the post-rep freeze window.
    Frozen,
    Tracking,
    Rep(RepResult),
    /// A down/up cycle too short to be a rep.
    Discarded { frames: u64 },
    /// Subject walked off after the last rep; stop feeding frames.
    EndOfSet,
}

#[derive(Debug, Clone)]
struct RepState {
    started: bool,
    stage: Stage,
    ready_frames: u32,
    post_rep_wait: u32,
    min_angle_in_rep: f32,
    rep_start_frame: u64,
    reps: u32,
}

impl Default for RepState {
    fn default() -> Self {
        Self {
            started: false,
            stage: Stage::Unset,
            ready_frames: 0,
            post_rep_wait: 0,
            min_angle_in_rep: ANGLE_SENTINEL,
            rep_start_frame: 0,
            reps: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepCounter {
    motion: MotionThresholds,
    th: RepThresholds,
    bands: Vec<Band>,
    state: RepState,
}

impl RepCounter {
    pub fn new(profile: &Profile) -> Result<Self, ConfigError> {
        profile.validate()?;
        Ok(Self {
            motion: profile.motion.clone(),
            th: profile.reps.clone(),
            bands: profile.bands.clone(),
            state: RepState::default(),
        })
    }

    pub fn started(&self) -> bool {
        self.state.started
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    pub fn reps(&self) -> u32 {
        self.state.reps
    }

    pub fn classify(&self, min_angle: f32) -> RepLabel {
        classify(&self.bands, min_angle)
    }

    pub fn step(&mut self, frame: u64, knee_angle: f32, moved: f32) -> FrameOutcome {
        let st = &mut self.state;

        if !st.started {
            if self.th.early_start_angle.is_some_and(|a| knee_angle < a) {
                st.started = true;
                return FrameOutcome::Started;
            }
            if moved < self.motion.move_start {
                st.ready_frames += 1;
            } else {
                st.ready_frames = 0;
            }
            if st.ready_frames >= self.motion.ready_frames {
                st.started = true;
                return FrameOutcome::Started;
            }
            return FrameOutcome::Waiting;
        }

        if st.post_rep_wait > 0 {
            // only a still, upright subject keeps the freeze going
            if moved < self.motion.move_start && knee_angle > self.th.down_exit_angle {
                st.post_rep_wait -= 1;
                return FrameOutcome::Frozen;
            }
            st.post_rep_wait = 0;
        }

        if st.stage == Stage::Up
            && moved > self.motion.move_end
            && frame > self.th.min_frames_before_end
        {
            return FrameOutcome::EndOfSet;
        }

        if st.stage == Stage::Down
            || (st.stage == Stage::Unset && knee_angle < self.th.down_entry_angle)
        {
            st.min_angle_in_rep = st.min_angle_in_rep.min(knee_angle);
        }

        let stage = if knee_angle < self.th.down_exit_angle {
            Stage::Down
        } else {
            Stage::Up
        };

        let mut outcome = FrameOutcome::Tracking;
        if st.stage == Stage::Down && stage == Stage::Up {
            let frames = frame.saturating_sub(st.rep_start_frame);
            if frames < self.th.min_rep_frames {
                outcome = FrameOutcome::Discarded { frames };
            } else {
                st.reps += 1;
                let result = RepResult {
                    rep_index: st.reps,
                    label: classify(&self.bands, st.min_angle_in_rep),
                    min_knee_angle: st.min_angle_in_rep as i32,
                    frame_start: st.rep_start_frame,
                    frame_end: frame,
                };
                st.min_angle_in_rep = ANGLE_SENTINEL;
                st.post_rep_wait = self.th.post_rep_freeze;
                outcome = FrameOutcome::Rep(result);
            }
        }

        if stage == Stage::Down && st.stage != Stage::Down {
            st.rep_start_frame = frame;
        }

        st.stage = stage;
        outcome
    }
}

/// Bands are `(above, up_to]`; anything no band claims is a fail.
pub fn classify(bands: &[Band], min_angle: f32) -> RepLabel {
    bands
        .iter()
        .find(|b| min_angle > b.above && min_angle <= b.up_to)
        .map(|b| b.label)
        .unwrap_or(RepLabel::Fail)
}
