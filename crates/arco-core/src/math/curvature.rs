//! Discrete curvature estimation for 3-D reference curves
//!
//! Given an ordered point sequence sampled along a path, estimates the
//! cumulative arc length, the radius of curvature, and the curvature
//! vector at every sample via central finite differences:
//!
//! ```text
//! κ = |r' × r''| / |r'|³,    R = 1/κ
//! ```

use nalgebra::{DVector, Vector3};

/// Radius reported where the curve is locally straight (κ → 0)
const STRAIGHT_RADIUS: f64 = 1e6;

/// Per-sample curvature information of a 3-D polyline
#[derive(Debug, Clone)]
pub struct CurvatureProfile {
    /// Cumulative arc length at each sample [m]
    pub arc_length: DVector<f64>,
    /// Radius of curvature at each sample [m]
    pub radius: DVector<f64>,
    /// Curvature vector at each sample [1/m]
    pub curvature: Vec<Vector3<f64>>,
}

/// Estimate arc length, radius, and curvature vectors along a point sequence
///
/// Interior samples use central differences; the endpoints copy their
/// neighbor's estimate. Sequences shorter than 3 points are treated as
/// straight.
pub fn curvature_profile(points: &[Vector3<f64>]) -> CurvatureProfile {
    let n = points.len();
    let mut arc_length = DVector::zeros(n);
    let mut radius = DVector::from_element(n, STRAIGHT_RADIUS);
    let mut curvature = vec![Vector3::zeros(); n];

    for i in 1..n {
        arc_length[i] = arc_length[i - 1] + (points[i] - points[i - 1]).norm();
    }

    if n < 3 {
        return CurvatureProfile { arc_length, radius, curvature };
    }

    for i in 1..n - 1 {
        let d1 = (points[i + 1] - points[i - 1]) / 2.0;
        let d2 = points[i + 1] - points[i] * 2.0 + points[i - 1];

        let speed = d1.norm();
        if speed < 1e-12 {
            continue;
        }

        let cross = d1.cross(&d2);
        let kappa = cross.norm() / speed.powi(3);
        curvature[i] = cross / speed.powi(3);
        if kappa > 1.0 / STRAIGHT_RADIUS {
            radius[i] = 1.0 / kappa;
        }
    }

    radius[0] = radius[1];
    radius[n - 1] = radius[n - 2];
    curvature[0] = curvature[1];
    curvature[n - 1] = curvature[n - 2];

    CurvatureProfile { arc_length, radius, curvature }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_straight_line_has_large_radius() {
        let points: Vec<_> = (0..10)
            .map(|i| Vector3::new(i as f64 * 0.1, 0.0, 0.0))
            .collect();
        let profile = curvature_profile(&points);

        assert_relative_eq!(profile.arc_length[9], 0.9, epsilon = 1e-12);
        for i in 0..10 {
            assert!(profile.radius[i] >= STRAIGHT_RADIUS);
        }
    }

    #[test]
    fn test_circle_radius_recovered() {
        let r = 0.4;
        let n = 200;
        let points: Vec<_> = (0..n)
            .map(|i| {
                let t = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                Vector3::new(r * t.cos(), r * t.sin(), 0.0)
            })
            .collect();
        let profile = curvature_profile(&points);

        // Interior samples should see the circle radius
        assert_relative_eq!(profile.radius[n / 2], r, epsilon = 1e-3);
    }

    #[test]
    fn test_short_sequence_is_straight() {
        let points = vec![Vector3::zeros(), Vector3::x()];
        let profile = curvature_profile(&points);
        assert_eq!(profile.radius.len(), 2);
        assert_relative_eq!(profile.arc_length[1], 1.0, epsilon = 1e-12);
    }
}
