//! Hip motion between consecutive measured frames.

#[derive(Debug, Clone, Default)]
pub struct MotionTracker {
    previous_hip: Option<(f32, f32)>,
}

impl MotionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// L1 distance to the previous hip position, 0 on the first call.
    /// Always stores `hip` as the new baseline.
    pub fn update(&mut self, hip: (f32, f32)) -> f32 {
        let moved = match self.previous_hip {
            Some(prev) => (hip.0 - prev.0).abs() + (hip.1 - prev.1).abs(),
            None => 0.0,
        };
        self.previous_hip = Some(hip);
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn first_sample_has_no_motion() {
        let mut t = MotionTracker::new();
        assert_eq!(t.update((0.3, 0.7)), 0.0);
    }

    #[test]
    fn motion_is_manhattan_distance() {
        let mut t = MotionTracker::new();
        t.update((0.5, 0.5));
        assert_abs_diff_eq!(t.update((0.52, 0.47)), 0.05, epsilon = 1e-6);
        // baseline moved along with the hip
        assert_abs_diff_eq!(t.update((0.52, 0.47)), 0.0, epsilon = 1e-6);
    }
}
