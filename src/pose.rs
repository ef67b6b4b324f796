//! Pose frames as delivered by the external pose estimator.

use serde::{Deserialize, Serialize};

fn full_confidence() -> f32 {
    1.0
}

/// A single joint in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32, // 0-1 normalized
    pub y: f32, // 0-1 normalized
    #[serde(default = "full_confidence", alias = "confidence")]
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            visibility: 1.0,
        }
    }

    pub fn point(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

/// The lower-body joints the rep counter cares about. Anything else the
/// estimator sends is ignored on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramePose {
    pub left_hip: Option<Landmark>,
    pub left_knee: Option<Landmark>,
    pub left_ankle: Option<Landmark>,
    pub right_hip: Option<Landmark>,
    pub right_knee: Option<Landmark>,
    pub right_ankle: Option<Landmark>,
}

/// One element of the input stream. `landmarks == None` means detection
/// failed for this frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    pub frame: u64,
    #[serde(default)]
    pub landmarks: Option<FramePose>,
}

impl PoseFrame {
    pub fn detected(frame: u64, pose: FramePose) -> Self {
        Self {
            frame,
            landmarks: Some(pose),
        }
    }

    pub fn missing(frame: u64) -> Self {
        Self {
            frame,
            landmarks: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frame_with_landmarks() {
        let line = r#"{"frame": 3, "landmarks": {
            "left_hip": {"x": 0.5, "y": 0.4, "visibility": 0.9},
            "left_knee": {"x": 0.5, "y": 0.6},
            "nose": {"x": 0.5, "y": 0.1}
        }}"#;
        let f: PoseFrame = serde_json::from_str(line).unwrap();
        assert_eq!(f.frame, 3);
        let pose = f.landmarks.unwrap();
        assert_eq!(pose.left_hip.unwrap().visibility, 0.9);
        assert_eq!(pose.left_knee.unwrap().visibility, 1.0);
        assert!(pose.right_hip.is_none());
    }

    #[test]
    fn null_or_missing_landmarks_mean_no_pose() {
        let a: PoseFrame = serde_json::from_str(r#"{"frame": 1, "landmarks": null}"#).unwrap();
        let b: PoseFrame = serde_json::from_str(r#"{"frame": 2}"#).unwrap();
        assert!(a.landmarks.is_none());
        assert!(b.landmarks.is_none());
    }

    #[test]
    fn confidence_alias_is_accepted() {
        let lm: Landmark = serde_json::from_str(r#"{"x":0.1,"y":0.2,"confidence":0.3}"#).unwrap();
        assert_eq!(lm.visibility, 0.3);
    }
}
