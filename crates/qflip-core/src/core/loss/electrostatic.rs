use crate::core::models::scheme::Direction;

/// Regularizes the reciprocal so coincident points give a large but finite energy.
pub const ENERGY_EPSILON: f64 = 1e-9;

/// Exponent applied to the Euclidean distance before taking the reciprocal.
pub const DEFAULT_ORDER: i32 = 2;

#[inline]
fn reciprocal_power(separation: &Direction, order: i32) -> f64 {
    let distance_power = if order == 2 {
        separation.norm_squared()
    } else {
        separation.norm().powi(order)
    };
    1.0 / (distance_power + ENERGY_EPSILON)
}

/// Repulsion between `a` and `b`: `1 / (‖a − b‖^order + ε)`.
#[inline]
pub fn pair_energy(a: &Direction, b: &Direction, order: i32) -> f64 {
    reciprocal_power(&(a - b), order)
}

/// Repulsion between `a` and the antipode of `b`: `1 / (‖a + b‖^order + ε)`.
#[inline]
pub fn antipodal_pair_energy(a: &Direction, b: &Direction, order: i32) -> f64 {
    reciprocal_power(&(a + b), order)
}

/// Electrostatic energy of a point set, summed over unordered pairs.
///
/// With `antipodal` set, every pair also contributes the repulsion between one point
/// and the other's antipode, which makes the energy invariant under negating any
/// point. The cost is quadratic in the number of points.
pub fn electrostatic_energy(points: &[Direction], order: i32, antipodal: bool) -> f64 {
    let mut energy = 0.0;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            energy += pair_energy(a, b, order);
            if antipodal {
                energy += antipodal_pair_energy(a, b, order);
            }
        }
    }
    energy
}
