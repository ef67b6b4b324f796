//! Picks one knee angle per frame out of the left and right leg estimates.

use serde::Serialize;

use crate::geometry::joint_angle;
use crate::pose::{FramePose, Landmark};

/// Angles at or below this are treated as tracking garbage.
const SANITY_FLOOR: f32 = 30.0;
/// Legs closer than this are averaged.
const MAX_DISAGREEMENT: f32 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
    /// Both legs agreed and were averaged.
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegReading {
    pub knee_angle: f32,
    pub hip: (f32, f32),
    pub side: Side,
}

#[derive(Debug, Clone, Copy)]
struct Leg {
    angle: f32,
    hip: (f32, f32),
}

fn usable(lm: Option<Landmark>, min_confidence: f32) -> Option<Landmark> {
    lm.filter(|l| l.visibility >= min_confidence)
}

fn leg(
    hip: Option<Landmark>,
    knee: Option<Landmark>,
    ankle: Option<Landmark>,
    min_confidence: f32,
) -> Option<Leg> {
    let hip = usable(hip, min_confidence)?;
    let knee = usable(knee, min_confidence)?;
    let ankle = usable(ankle, min_confidence)?;
    Some(Leg {
        angle: joint_angle(hip.point(), knee.point(), ankle.point()),
        hip: hip.point(),
    })
}

fn reading(l: Leg, side: Side) -> LegReading {
    LegReading {
        knee_angle: l.angle,
        hip: l.hip,
        side,
    }
}

/// Returns `None` only when neither leg has a complete hip/knee/ankle triple.
pub fn select_leg(pose: &FramePose, min_confidence: f32) -> Option<LegReading> {
    let left = leg(pose.left_hip, pose.left_knee, pose.left_ankle, min_confidence);
    let right = leg(
        pose.right_hip,
        pose.right_knee,
        pose.right_ankle,
        min_confidence,
    );

    match (left, right) {
        (Some(l), Some(r)) => Some(choose(l, r)),
        (Some(l), None) => Some(reading(l, Side::Left)),
        (None, Some(r)) => Some(reading(r, Side::Right)),
        (None, None) => None,
    }
}

fn choose(l: Leg, r: Leg) -> LegReading {
    let left_ok = l.angle > SANITY_FLOOR;
    let right_ok = r.angle > SANITY_FLOOR;

    match (left_ok, right_ok) {
        (true, true) if (l.angle - r.angle).abs() < MAX_DISAGREEMENT => LegReading {
            knee_angle: (l.angle + r.angle) / 2.0,
            hip: l.hip,
            side: Side::Both,
        },
        // the more extended leg is usually the better tracked one
        (true, true) if r.angle > l.angle => reading(r, Side::Right),
        (true, true) => reading(l, Side::Left),
        (false, true) => reading(r, Side::Right),
        _ => reading(l, Side::Left),
    }
}
