use super::covering::covering_radius;
use crate::core::models::scheme::Direction;
use nalgebra::Vector3;

/// L2 norm of the centroid. Zero for a perfectly balanced set and for an empty set.
pub fn norm_of_mean(points: &[Direction]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let sum: Direction = points.iter().fold(Vector3::zeros(), |acc, p| acc + p);
    (sum / points.len() as f64).norm()
}

/// Packing-density cost of appending `new_points` one at a time to `existing_points`.
///
/// For every prefix `existing ++ new[..k]` (k ≥ 1) the term
/// `(1 − cos(r)) / 2 · |prefix|` is accumulated, where `r` is the antipodal covering
/// radius of the prefix.
pub fn packing_density_loss(new_points: &[Direction], existing_points: &[Direction]) -> f64 {
    let combined: Vec<Direction> = existing_points
        .iter()
        .chain(new_points)
        .copied()
        .collect();

    (1..=new_points.len())
        .map(|k| {
            let prefix_len = existing_points.len() + k;
            let radius = covering_radius(&combined[..prefix_len], true);
            (1.0 - radius.cos()) / 2.0 * prefix_len as f64
        })
        .sum()
}

/// Weighted combination of a single-shell cost over several shells:
/// `w / S · Σ cost(shell) + (1 − w) · cost(all shells concatenated)`.
///
/// Extra cost parameters (energy order, antipodal flag, ...) are captured by the
/// closure. An empty shell list costs nothing.
pub fn weighted_cost_multi_shell<S, F>(shells: &[S], cost: F, weight: f64) -> f64
where
    S: AsRef<[Direction]>,
    F: Fn(&[Direction]) -> f64,
{
    if shells.is_empty() {
        return 0.0;
    }
    let per_shell: f64 = shells.iter().map(|s| cost(s.as_ref())).sum();
    let pooled: Vec<Direction> = shells
        .iter()
        .flat_map(|s| s.as_ref().iter().copied())
        .collect();

    weight / shells.len() as f64 * per_shell + (1.0 - weight) * cost(&pooled)
}
