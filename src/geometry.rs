//! Joint angle from three normalized 2-D points.

/// Added to the magnitude product so coincident points never divide by zero.
const EPS: f32 = 1e-6;

/// Interior angle at `b` (degrees, 0..=180) formed by `a`-`b`-`c`.
///
/// Coincident points degrade to ~90° instead of failing.
pub fn joint_angle(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> f32 {
    let ab = (a.0 - b.0, a.1 - b.1);
    let cb = (c.0 - b.0, c.1 - b.1);

    let dot = ab.0 * cb.0 + ab.1 * cb.1;
    let mag_ab = (ab.0 * ab.0 + ab.1 * ab.1).sqrt();
    let mag_cb = (cb.0 * cb.0 + cb.1 * cb.1).sqrt();

    let cosine = (dot / (mag_ab * mag_cb + EPS)).clamp(-1.0, 1.0);
    cosine.acos().to_degrees()
}
