//! Semidefinite relaxation bound for the sum-aggregated part of a [`FlipModel`].
//!
//! With spins `s_i = +1` (kept) and `s_i = -1` (flipped), the sum groups cost
//! `offset + Σ_{i<j} J_ij s_i s_j`. At a search node the fixed spins become a linear
//! field on the free ones, and an anchor spin homogenizes the field into a symmetric
//! matrix `Q` of dimension `d`. For any diagonal shift `y`,
//! `½ (Σ y + d · λ_min(Q − Diag y))` bounds every completion from below. The shift is
//! read off a rank-limited solution of the relaxed problem, which is stored per
//! search slot and refined from the parent's solution by block-coordinate sweeps.
//!
//! [`FlipModel`]: crate::engine::model::FlipModel

use crate::engine::model::{Aggregation, TermGroup};
use nalgebra::{DMatrix, SymmetricEigen};
use tracing::trace;

const RANK: usize = 8;
const EIGEN_MAX_ITERATIONS: usize = 10_000;

/// Sweeps used when the relaxation is first solved at the root.
pub const ROOT_SWEEPS: usize = 500;
/// Sweeps used at every other node, starting from the parent's solution.
pub const NODE_SWEEPS: usize = 30;

const START_STEPS: [f64; RANK] = [2.0, 3.0, 5.0, 7.0, 11.0, 13.0, 17.0, 19.0];

#[derive(Debug, Clone)]
struct SpinCouplings {
    offset: f64,
    coupling: DMatrix<f64>,
}

impl SpinCouplings {
    fn from_groups(groups: &[TermGroup], n: usize) -> Option<Self> {
        let mut offset = 0.0;
        let mut coupling = DMatrix::zeros(n, n);
        let mut terms = 0usize;
        for group in groups.iter().filter(|g| g.aggregation == Aggregation::Sum) {
            for term in &group.terms {
                let same = group.weight * term.same;
                let flipped = group.weight * term.flipped;
                offset += 0.5 * (same + flipped);
                let half_gap = 0.5 * (same - flipped);
                coupling[(term.i, term.j)] += half_gap;
                coupling[(term.j, term.i)] += half_gap;
                terms += 1;
            }
        }
        (terms > 0).then_some(Self { offset, coupling })
    }
}

/// Unit vectors of the relaxed solution: row 0 is the anchor, row `u + 1` belongs to
/// variable `u`.
#[derive(Debug, Clone)]
struct Embedding(Vec<f64>);

impl Embedding {
    fn initial(rows: usize) -> Self {
        let mut data = vec![0.0; rows * RANK];
        for (a, row) in data.chunks_exact_mut(RANK).enumerate() {
            for (x, step) in row.iter_mut().zip(START_STEPS) {
                *x = ((a + 1) as f64 * step.sqrt()).fract() - 0.5;
            }
            let norm = dot(row, row).sqrt();
            row.iter_mut().for_each(|x| *x /= norm);
        }
        Self(data)
    }

    fn row(&self, a: usize) -> &[f64] {
        &self.0[a * RANK..(a + 1) * RANK]
    }

    fn row_mut(&mut self, a: usize) -> &mut [f64] {
        &mut self.0[a * RANK..(a + 1) * RANK]
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelaxedBound {
    pub value: f64,
    /// The node's assignment with every free variable set by the sign of its vector
    /// against the anchor.
    pub rounding: Vec<bool>,
}

#[derive(Debug, Clone)]
pub struct Relaxation {
    couplings: SpinCouplings,
    slots: Vec<Embedding>,
}

impl Relaxation {
    /// Builds the relaxation of the model's sum groups, or `None` when there are none.
    ///
    /// `slots` relaxed solutions are kept; a bound computed into one slot starts from
    /// the solution held by another.
    pub fn new(groups: &[TermGroup], n: usize, slots: usize) -> Option<Self> {
        let couplings = SpinCouplings::from_groups(groups, n)?;
        let start = Embedding::initial(n + 1);
        Some(Self {
            couplings,
            slots: vec![start; slots.max(1)],
        })
    }

    /// Lower bound on the sum groups over every completion of the node given by
    /// `assignment` restricted to `fixed`.
    ///
    /// The relaxed solution is copied from slot `parent` into slot `slot` (which must
    /// not precede `parent`) and refined there by `sweeps` sweeps. Returns `None` if the
    /// eigenvalue computation fails or produces a non-finite value.
    pub fn bound(
        &mut self,
        assignment: &[bool],
        fixed: &[bool],
        parent: usize,
        slot: usize,
        sweeps: usize,
    ) -> Option<RelaxedBound> {
        let n = fixed.len();
        let coupling = &self.couplings.coupling;
        let spin = |i: usize| if assignment[i] { -1.0 } else { 1.0 };

        let settled_vars: Vec<usize> = (0..n).filter(|&i| fixed[i]).collect();
        let free: Vec<usize> = (0..n).filter(|&i| !fixed[i]).collect();

        let mut settled = self.couplings.offset;
        for (k, &i) in settled_vars.iter().enumerate() {
            for &j in &settled_vars[k + 1..] {
                settled += coupling[(i, j)] * spin(i) * spin(j);
            }
        }
        if free.is_empty() {
            return Some(RelaxedBound {
                value: settled,
                rounding: assignment.to_vec(),
            });
        }

        let field: Vec<f64> = free
            .iter()
            .map(|&u| settled_vars.iter().map(|&i| coupling[(i, u)] * spin(i)).sum::<f64>())
            .collect();
        let dim = free.len() + 1;
        let q = DMatrix::from_fn(dim, dim, |a, b| match (a, b) {
            _ if a == b => 0.0,
            (0, b) => field[b - 1],
            (a, 0) => field[a - 1],
            (a, b) => coupling[(free[a - 1], free[b - 1])],
        });
        let rows: Vec<usize> = std::iter::once(0).chain(free.iter().map(|&u| u + 1)).collect();

        let (lower, upper) = self.slots.split_at_mut(slot);
        let embedding = &mut upper[0];
        if parent < slot {
            embedding.0.copy_from_slice(&lower[parent].0);
        }

        for _ in 0..sweeps {
            for a in 0..dim {
                let mut gradient = [0.0; RANK];
                for b in (0..dim).filter(|&b| b != a) {
                    let weight = q[(a, b)];
                    if weight != 0.0 {
                        for (g, x) in gradient.iter_mut().zip(embedding.row(rows[b])) {
                            *g += weight * x;
                        }
                    }
                }
                let norm = dot(&gradient, &gradient).sqrt();
                if norm > f64::MIN_POSITIVE {
                    for (x, g) in embedding.row_mut(rows[a]).iter_mut().zip(gradient) {
                        *x = -g / norm;
                    }
                }
            }
        }

        let shift: Vec<f64> = (0..dim)
            .map(|a| {
                (0..dim)
                    .filter(|&b| b != a)
                    .map(|b| q[(a, b)] * dot(embedding.row(rows[a]), embedding.row(rows[b])))
                    .sum::<f64>()
            })
            .collect();
        let shifted = DMatrix::from_fn(dim, dim, |a, b| if a == b { -shift[a] } else { q[(a, b)] });
        let slack = dim as f64 * 64.0 * f64::EPSILON * (1.0 + shifted.norm());

        let eigen = SymmetricEigen::try_new(shifted, f64::EPSILON, EIGEN_MAX_ITERATIONS)?;
        let smallest = eigen.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
        let value =
            settled + 0.5 * (shift.iter().sum::<f64>() + dim as f64 * smallest) - slack;
        if !value.is_finite() {
            trace!("Relaxation produced a non-finite bound; ignoring it.");
            return None;
        }

        let anchor = embedding.row(0);
        let mut rounding = assignment.to_vec();
        for &u in &free {
            rounding[u] = dot(anchor, embedding.row(u + 1)) < 0.0;
        }
        Some(RelaxedBound { value, rounding })
    }
}
