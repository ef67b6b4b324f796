//! One analysis run: pose frames in, `Summary` out.

use log::{debug, info, warn};
use serde::Serialize;
use std::ops::ControlFlow;

use crate::config::{Profile, Scoring};
use crate::counter::{FrameOutcome, RepCounter, RepResult};
use crate::error::ConfigError;
use crate::legs::select_leg;
use crate::pose::PoseFrame;
use crate::score::{LabelCounts, score};
use crate::trace::{FrameTrace, Retention, TraceEntry};
use crate::tracker::MotionTracker;

/// Below this share of detected frames the result is probably junk.
const LOW_DETECTION_RATE: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetectionStats {
    pub total_frames: u64,
    pub detected_frames: u64,
    pub failed_frames: u64,
}

impl DetectionStats {
    pub fn rate(&self) -> f64 {
        if self.total_frames == 0 {
            0.0
        } else {
            self.detected_frames as f64 / self.total_frames as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub counts: LabelCounts,
    pub total_count: u32,
    pub score: u32,
    pub grade: String,
    pub rep_results: Vec<RepResult>,
    pub frame_trace: Vec<TraceEntry>,
    pub detection: DetectionStats,
    pub ended_early: bool,
}

/// Owns every piece of per-run state. Build a fresh one per video.
#[derive(Debug)]
pub struct Session {
    min_confidence: f32,
    scoring: Scoring,
    tracker: MotionTracker,
    counter: RepCounter,
    trace: FrameTrace,
    counts: LabelCounts,
    reps: Vec<RepResult>,
    detection: DetectionStats,
    last_frame: Option<u64>,
    ended_early: bool,
}

impl Session {
    pub fn new(profile: &Profile, retention: Retention) -> Result<Self, ConfigError> {
        let counter = RepCounter::new(profile)?;
        Ok(Self {
            min_confidence: profile.motion.min_confidence,
            scoring: profile.scoring.clone(),
            tracker: MotionTracker::new(),
            counter,
            trace: FrameTrace::new(retention),
            counts: LabelCounts::default(),
            reps: Vec::new(),
            detection: DetectionStats::default(),
            last_frame: None,
            ended_early: false,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.ended_early
    }

    /// Feeds one frame. `Break` means the set is over and further frames
    /// would be ignored.
    pub fn push(&mut self, frame: &PoseFrame) -> ControlFlow<()> {
        if self.ended_early {
            return ControlFlow::Break(());
        }
        if self.last_frame.is_some_and(|last| frame.frame <= last) {
            warn!("frame {} arrived out of order; skipped", frame.frame);
            return ControlFlow::Continue(());
        }
        self.last_frame = Some(frame.frame);
        self.detection.total_frames += 1;

        let reading = frame
            .landmarks
            .as_ref()
            .and_then(|pose| select_leg(pose, self.min_confidence));

        self.trace.record(TraceEntry {
            frame: frame.frame,
            has_pose: reading.is_some(),
            stage: self.counter.stage(),
            knee_angle: reading.map(|r| r.knee_angle),
            side: reading.map(|r| r.side),
        });

        let Some(reading) = reading else {
            self.detection.failed_frames += 1;
            return ControlFlow::Continue(());
        };
        self.detection.detected_frames += 1;

        let moved = self.tracker.update(reading.hip);
        match self.counter.step(frame.frame, reading.knee_angle, moved) {
            FrameOutcome::Started => info!("counting started at frame {}", frame.frame),
            FrameOutcome::Rep(rep) => {
                info!(
                    "rep {}: {} ({} deg, frames {}-{})",
                    rep.rep_index, rep.label, rep.min_knee_angle, rep.frame_start, rep.frame_end
                );
                self.counts.add(rep.label);
                self.reps.push(rep);
            }
            FrameOutcome::Discarded { frames } => {
                debug!("ignored {frames}-frame cycle ending at frame {}", frame.frame)
            }
            FrameOutcome::EndOfSet => {
                info!("movement after last rep at frame {}; ending", frame.frame);
                self.ended_early = true;
                return ControlFlow::Break(());
            }
            FrameOutcome::Waiting | FrameOutcome::Frozen | FrameOutcome::Tracking => {}
        }
        ControlFlow::Continue(())
    }

    pub fn finish(self) -> Summary {
        let d = self.detection;
        info!(
            "frames: {} total, {} with pose ({:.1}%), {} without",
            d.total_frames,
            d.detected_frames,
            d.rate() * 100.0,
            d.failed_frames
        );
        if d.total_frames > 0 && d.rate() < LOW_DETECTION_RATE {
            warn!("low pose detection rate ({:.1}%)", d.rate() * 100.0);
        }
        if self.trace.dropped() > 0 {
            debug!("trace kept the last {} frames", self.trace.len());
        }

        let s = score(&self.counts, &self.scoring);
        info!(
            "{} reps, score {} ({})",
            self.counts.total(),
            s.score,
            s.grade
        );

        Summary {
            counts: self.counts,
            total_count: self.counts.total(),
            score: s.score,
            grade: s.grade,
            rep_results: self.reps,
            frame_trace: self.trace.into_entries(),
            detection: d,
            ended_early: self.ended_early,
        }
    }
}

/// Runs a whole in-memory stream through a fresh session.
pub fn analyze<I>(frames: I, profile: &Profile, retention: Retention) -> Result<Summary, ConfigError>
where
    I: IntoIterator<Item = PoseFrame>,
{
    let mut session = Session::new(profile, retention)?;
    for frame in frames {
        if session.push(&frame).is_break() {
            break;
        }
    }
    Ok(session.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::RepLabel;
    use crate::pose::{FramePose, Landmark};

    const HIP: (f32, f32) = (0.5, 0.4);

    /// Both legs at `angle`, hip pinned at `hip`.
    fn pose_at(angle: f32, hip: (f32, f32)) -> FramePose {
        let t = angle.to_radians();
        let knee = (hip.0 - 0.2 * t.sin(), hip.1 - 0.2 * t.cos());
        let ankle = (knee.0, knee.1 + 0.2);
        let lm = |p: (f32, f32)| Some(Landmark::new(p.0, p.1));
        FramePose {
            left_hip: lm(hip),
            left_knee: lm(knee),
            left_ankle: lm(ankle),
            right_hip: lm(hip),
            right_knee: lm(knee),
            right_ankle: lm(ankle),
        }
    }

    struct Clip {
        frames: Vec<PoseFrame>,
    }

    impl Clip {
        fn new() -> Self {
            Self { frames: vec![] }
        }

        fn next_index(&self) -> u64 {
            self.frames.len() as u64
        }

        fn stand(mut self, n: usize) -> Self {
            for _ in 0..n {
                let f = self.next_index();
                self.frames.push(PoseFrame::detected(f, pose_at(180.0, HIP)));
            }
            self
        }

        fn lost(mut self, n: usize) -> Self {
            for _ in 0..n {
                let f = self.next_index();
                self.frames.push(PoseFrame::missing(f));
            }
            self
        }

        /// 15 frames down, 3 at the bottom, 15 back up.
        fn squat(mut self, bottom: f32) -> Self {
            let mut angles = vec![];
            for i in 1..=15 {
                angles.push(180.0 - (180.0 - bottom) * i as f32 / 15.0);
            }
            angles.extend([bottom; 3]);
            for i in 1..=15 {
                angles.push(bottom + (180.0 - bottom) * i as f32 / 15.0);
            }
            for a in angles {
                let f = self.next_index();
                self.frames.push(PoseFrame::detected(f, pose_at(a, HIP)));
            }
            self
        }

        fn walk_off(mut self, n: usize) -> Self {
            for i in 1..=n {
                let f = self.next_index();
                let hip = (HIP.0 + 0.01 * i as f32, HIP.1);
                self.frames.push(PoseFrame::detected(f, pose_at(180.0, hip)));
            }
            self
        }
    }

    fn profile() -> Profile {
        Profile::builtin("default").unwrap()
    }

    fn check_invariants(s: &Summary) {
        assert_eq!(s.total_count, s.counts.total());
        assert_eq!(s.total_count as usize, s.rep_results.len());
        assert!(s.score <= 100);
        for r in &s.rep_results {
            assert!(r.frame_start <= r.frame_end);
        }
        for w in s.rep_results.windows(2) {
            assert!(w[0].frame_start <= w[1].frame_start);
        }
    }

    #[test]
    fn three_squats_of_decreasing_depth() {
        let clip = Clip::new()
            .stand(12)
            .squat(88.0)
            .stand(40)
            .squat(68.0)
            .stand(40)
            .squat(40.0)
            .stand(40);
        let s = analyze(clip.frames, &profile(), Retention::Off).unwrap();
        check_invariants(&s);

        let labels: Vec<_> = s.rep_results.iter().map(|r| r.label).collect();
        assert_eq!(labels, [RepLabel::Half, RepLabel::Basic, RepLabel::Full]);
        assert_eq!(
            s.counts,
            LabelCounts {
                half: 1,
                basic: 1,
                full: 1,
                fail: 0
            }
        );
        assert!((s.rep_results[0].min_knee_angle - 88).abs() <= 1);
        assert_eq!(s.total_count, 3);
        assert_eq!(s.score, 70);
        assert_eq!(s.grade, "Great");
        assert!(!s.ended_early);
        assert!(s.frame_trace.is_empty());
    }

    #[test]
    fn standing_only_scores_zero() {
        let clip = Clip::new().stand(200);
        let s = analyze(clip.frames, &profile(), Retention::Off).unwrap();
        check_invariants(&s);
        assert_eq!(s.total_count, 0);
        assert_eq!(s.score, 0);
        assert_eq!(s.grade, "Bad");
    }

    #[test]
    fn empty_stream_still_summarizes() {
        let s = analyze(Vec::new(), &profile(), Retention::All).unwrap();
        check_invariants(&s);
        assert_eq!(s.total_count, 0);
        assert_eq!(s.score, 0);
        assert_eq!(s.grade, "Bad");
        assert_eq!(s.detection, DetectionStats::default());
    }

    #[test]
    fn lost_frames_do_not_touch_the_counter() {
        let clip = Clip::new()
            .stand(12)
            .lost(20)
            .squat(68.0)
            .lost(5)
            .stand(40);
        let s = analyze(clip.frames, &profile(), Retention::All).unwrap();
        check_invariants(&s);
        assert_eq!(s.total_count, 1);
        assert_eq!(s.counts.basic, 1);
        assert_eq!(s.detection.failed_frames, 25);
        assert_eq!(s.detection.total_frames, 12 + 20 + 33 + 5 + 40);
        assert_eq!(s.frame_trace.len() as u64, s.detection.total_frames);
        assert!(!s.frame_trace[12].has_pose);
        assert_eq!(s.frame_trace[12].knee_angle, None);
    }

    #[test]
    fn walking_off_ends_the_run() {
        let clip = Clip::new()
            .stand(12)
            .squat(68.0)
            .stand(80)
            .walk_off(5)
            .squat(40.0)
            .stand(10);
        let total = clip.frames.len() as u64;
        let s = analyze(clip.frames, &profile(), Retention::All).unwrap();
        check_invariants(&s);
        assert!(s.ended_early);
        assert_eq!(s.total_count, 1);
        assert!(s.detection.total_frames < total);
    }

    #[test]
    fn replay_is_deterministic() {
        let clip = || {
            Clip::new()
                .stand(12)
                .squat(70.0)
                .lost(3)
                .stand(40)
                .squat(50.0)
                .stand(40)
        };
        let a = analyze(clip().frames, &profile(), Retention::All).unwrap();
        let b = analyze(clip().frames, &profile(), Retention::All).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn out_of_order_frames_are_skipped() {
        let mut s = Session::new(&profile(), Retention::All).unwrap();
        assert!(s.push(&PoseFrame::detected(5, pose_at(180.0, HIP))).is_continue());
        assert!(s.push(&PoseFrame::detected(3, pose_at(180.0, HIP))).is_continue());
        let summary = s.finish();
        assert_eq!(summary.detection.total_frames, 1);
        assert_eq!(summary.frame_trace.len(), 1);
    }

    #[test]
    fn classic_calibration_counts_too() {
        let clip = Clip::new()
            .stand(12)
            .squat(50.0)
            .stand(20)
            .squat(70.0)
            .stand(20);
        let p = Profile::builtin("classic").unwrap();
        let s = analyze(clip.frames, &p, Retention::Off).unwrap();
        check_invariants(&s);
        assert_eq!(s.total_count, 2);
        assert_eq!(s.counts.full, 1);
        assert_eq!(s.counts.basic, 1);
    }

    #[test]
    fn bad_profile_is_rejected_up_front() {
        let mut p = profile();
        p.reps.down_exit_angle = 175.0;
        assert!(Session::new(&p, Retention::Off).is_err());
    }
}
