use crate::core::models::scheme::Direction;
use std::f64::consts::{FRAC_PI_2, PI};

/// Angle between two unit vectors, with the inner product clamped to [-1, 1] to
/// tolerate floating-point drift.
#[inline]
pub fn pair_angle(a: &Direction, b: &Direction) -> f64 {
    a.dot(b).clamp(-1.0, 1.0).acos()
}

/// Minimum angular separation between any two points of the set.
///
/// With `antipodal` set, each point is considered together with its negation, so the
/// radius never exceeds π/2.
///
/// Sets with fewer than two points have no pairs; they yield the largest radius the
/// mode allows (π/2 antipodal, π otherwise). Callers that care should guard this case.
pub fn covering_radius(points: &[Direction], antipodal: bool) -> f64 {
    if points.len() < 2 {
        return if antipodal { FRAC_PI_2 } else { PI };
    }

    let mut max_inner = f64::NEG_INFINITY;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            let inner = a.dot(b);
            max_inner = max_inner.max(if antipodal { inner.abs() } else { inner });
        }
    }
    max_inner.clamp(-1.0, 1.0).acos()
}

/// Closed-form upper bound on the best covering radius achievable by `num_points`
/// points on the sphere.
pub fn covering_radius_upper_bound(num_points: usize) -> f64 {
    if num_points < 3 {
        return FRAC_PI_2;
    }
    let n = num_points as f64;
    let chord = (4.0 - (PI * n / (6.0 * (n - 2.0))).sin().powi(-2)).sqrt();
    ((2.0 - chord * chord) / 2.0).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Unit, Vector3};

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn octahedron_axes() -> Vec<Direction> {
        vec![Vector3::x(), Vector3::y(), Vector3::z()]
    }

    #[test]
    fn covering_radius_of_orthogonal_axes_is_right_angle() {
        let points = octahedron_axes();
        assert!(f64_approx_equal(covering_radius(&points, true), FRAC_PI_2));
        assert!(f64_approx_equal(covering_radius(&points, false), FRAC_PI_2));
    }

    #[test]
    fn antipodal_covering_radius_treats_negated_points_as_coincident() {
        let points = vec![Vector3::x(), -Vector3::x()];
        assert!(f64_approx_equal(covering_radius(&points, false), PI));
        assert!(f64_approx_equal(covering_radius(&points, true), 0.0));
    }

    #[test]
    fn covering_radius_uses_closest_pair() {
        let tilted = Vector3::new(1.0, 0.1, 0.0).normalize();
        let points = vec![Vector3::x(), Vector3::z(), tilted];
        let expected = 0.1f64.atan();
        assert!(f64_approx_equal(covering_radius(&points, true), expected));
    }

    #[test]
    fn covering_radius_tolerates_inner_products_slightly_above_one() {
        let almost = Vector3::new(1.0 + 1e-12, 0.0, 0.0);
        let radius = covering_radius(&[Vector3::x(), almost], false);
        assert!(radius.is_finite());
        assert!(f64_approx_equal(radius, 0.0));
    }

    #[test]
    fn covering_radius_of_degenerate_sets_is_the_maximum_angle() {
        assert!(f64_approx_equal(covering_radius(&[], true), FRAC_PI_2));
        assert!(f64_approx_equal(covering_radius(&[Vector3::x()], false), PI));
    }

    #[test]
    fn covering_radius_is_within_zero_and_pi_and_rotation_invariant() {
        let points: Vec<Direction> = [
            [0.3, 0.4, 0.866],
            [-0.5, 0.2, 0.84],
            [0.9, -0.1, 0.42],
            [-0.2, -0.95, 0.24],
            [0.1, 0.7, -0.7],
        ]
        .iter()
        .map(|&[x, y, z]| Vector3::new(x, y, z).normalize())
        .collect();

        let rotation = Rotation3::from_axis_angle(
            &Unit::new_normalize(Vector3::new(0.2, -1.0, 0.7)),
            1.234,
        );
        let rotated: Vec<Direction> = points.iter().map(|p| rotation * p).collect();

        for antipodal in [true, false] {
            let before = covering_radius(&points, antipodal);
            let after = covering_radius(&rotated, antipodal);
            assert!((0.0..=PI).contains(&before));
            assert!(f64_approx_equal(before, after));
        }
    }

    #[test]
    fn upper_bound_matches_known_optimal_configurations() {
        assert!(f64_approx_equal(covering_radius_upper_bound(2), FRAC_PI_2));
        assert!(f64_approx_equal(
            covering_radius_upper_bound(3),
            2.0 * PI / 3.0
        ));
        // Tetrahedron and octahedron attain the bound.
        assert!(f64_approx_equal(
            covering_radius_upper_bound(4),
            (-1.0f64 / 3.0).acos()
        ));
        assert!(f64_approx_equal(covering_radius_upper_bound(6), FRAC_PI_2));
    }

    #[test]
    fn upper_bound_decreases_with_more_points() {
        let mut previous = covering_radius_upper_bound(3);
        for n in 4..200 {
            let bound = covering_radius_upper_bound(n);
            assert!(bound < previous);
            previous = bound;
        }
    }

    #[test]
    fn pair_angle_is_symmetric_and_clamped() {
        let a = Vector3::new(0.0, 0.6, 0.8);
        let b = Vector3::new(0.8, 0.6, 0.0);
        assert!(f64_approx_equal(pair_angle(&a, &b), pair_angle(&b, &a)));
        assert!(f64_approx_equal(pair_angle(&a, &a), 0.0));
        assert!(f64_approx_equal(pair_angle(&a, &(-a)), PI));
    }
}
