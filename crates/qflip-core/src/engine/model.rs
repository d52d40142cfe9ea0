use crate::core::loss::covering::{covering_radius, pair_angle};
use crate::core::loss::electrostatic::{antipodal_pair_energy, pair_energy};
use crate::core::models::mask::FlipMask;
use crate::core::models::scheme::{Direction, MultiShellScheme};
use crate::engine::config::{Criterion, FlipObjective, ShellArity};
use std::ops::Range;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Cost contributed by the pair `(i, j)`, which depends only on whether the two
/// directions end up with the same sign (`b_i == b_j`) or opposite signs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairTerm {
    pub i: usize,
    pub j: usize,
    /// Value when `b_i == b_j`: the term of `p_i` against `p_j`.
    pub same: f64,
    /// Value when `b_i != b_j`: the term of `p_i` against `-p_j`.
    pub flipped: f64,
}

impl PairTerm {
    #[inline]
    pub fn value(&self, flip_i: bool, flip_j: bool) -> f64 {
        if flip_i == flip_j {
            self.same
        } else {
            self.flipped
        }
    }

    /// The smaller of the two values, reachable by some choice of signs.
    #[inline]
    pub fn best_case(&self) -> f64 {
        self.same.min(self.flipped)
    }

    fn scaled(self, factor: f64) -> Self {
        Self {
            same: self.same * factor,
            flipped: self.flipped * factor,
            ..self
        }
    }
}

/// How the terms of a group combine into the group's cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Total over all pairs (electrostatic energy).
    Sum,
    /// Worst pair (negated covering radius).
    Max,
}

impl Aggregation {
    #[inline]
    pub fn identity(self) -> f64 {
        match self {
            Self::Sum => 0.0,
            Self::Max => f64::NEG_INFINITY,
        }
    }

    #[inline]
    pub fn combine(self, acc: f64, value: f64) -> f64 {
        match self {
            Self::Sum => acc + value,
            Self::Max => acc.max(value),
        }
    }
}

/// A weighted set of pair terms aggregated into one objective component.
#[derive(Debug, Clone, PartialEq)]
pub struct TermGroup {
    pub weight: f64,
    pub aggregation: Aggregation,
    pub terms: Vec<PairTerm>,
}

impl TermGroup {
    /// Weighted cost of the group under a full assignment.
    pub fn evaluate(&self, assignment: &[bool]) -> f64 {
        if self.terms.is_empty() {
            return 0.0;
        }
        let aggregated = self.terms.iter().fold(self.aggregation.identity(), |acc, t| {
            self.aggregation
                .combine(acc, t.value(assignment[t.i], assignment[t.j]))
        });
        self.weight * aggregated
    }
}

#[derive(Debug, Clone, Copy)]
enum PairKernel {
    Electrostatic { order: i32 },
    Distance,
}

impl PairKernel {
    fn for_objective(objective: &FlipObjective) -> Self {
        match objective.criterion {
            Criterion::Electrostatic => Self::Electrostatic {
                order: objective.order,
            },
            Criterion::Distance => Self::Distance,
        }
    }

    /// Cost of a point set with no pairs, where the aggregation has nothing to combine.
    fn degenerate_cost(self, points: &[Direction]) -> f64 {
        match self {
            Self::Electrostatic { .. } => 0.0,
            Self::Distance => -covering_radius(points, false),
        }
    }

    fn aggregation(self) -> Aggregation {
        match self {
            Self::Electrostatic { .. } => Aggregation::Sum,
            Self::Distance => Aggregation::Max,
        }
    }

    #[inline]
    fn term(self, i: usize, j: usize, a: &Direction, b: &Direction) -> PairTerm {
        let (same, flipped) = match self {
            Self::Electrostatic { order } => {
                (pair_energy(a, b, order), antipodal_pair_energy(a, b, order))
            }
            Self::Distance => (-pair_angle(a, b), -pair_angle(a, &(-b))),
        };
        PairTerm { i, j, same, flipped }
    }
}

fn all_pair_terms(directions: &[Direction], kernel: PairKernel) -> Vec<PairTerm> {
    let n = directions.len();
    let row = |i: usize| -> Vec<PairTerm> {
        (i + 1..n)
            .map(|j| kernel.term(i, j, &directions[i], &directions[j]))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let rows: Vec<Vec<PairTerm>> = (0..n).map(row).collect();

    #[cfg(feature = "parallel")]
    let rows: Vec<Vec<PairTerm>> = (0..n).into_par_iter().map(row).collect();

    rows.into_iter().flatten().collect()
}

/// The binary flip model: one variable `b_i` per direction (shells concatenated in
/// order) and an objective to minimize made of weighted pair-term groups.
///
/// Every term depends on `b_i XOR b_j` only, so negating the whole assignment leaves
/// the objective unchanged.
#[derive(Debug, Clone)]
pub struct FlipModel {
    objective: FlipObjective,
    num_variables: usize,
    shell_ranges: Vec<Range<usize>>,
    groups: Vec<TermGroup>,
    constant: f64,
}

impl FlipModel {
    /// Builds the model for `scheme` under `objective`.
    ///
    /// Single shell: one group of weight 1. Multiple shells: a group of weight `w / S`
    /// per shell plus a pooled group of weight `1 − w` over all pairs. Sum-aggregated
    /// groups are merged into a single group with per-pair coefficients. Groups with
    /// zero weight or without pairs are dropped; a shell of a single direction still
    /// contributes its fixed cost through [`Self::constant`].
    #[instrument(skip_all, name = "flip_model_build", fields(criterion = %objective.criterion))]
    pub fn build(scheme: &MultiShellScheme, objective: &FlipObjective) -> Self {
        let directions = scheme.concatenated();
        let shell_ranges = scheme.shell_ranges();
        let kernel = PairKernel::for_objective(objective);
        let terms = all_pair_terms(&directions, kernel);

        let shell_of = |index: usize| shell_ranges.iter().position(|r| r.contains(&index));
        let same_shell = |t: &PairTerm| shell_of(t.i) == shell_of(t.j);

        let groups = match (kernel.aggregation(), objective.arity) {
            (aggregation, ShellArity::Single) => vec![TermGroup {
                weight: 1.0,
                aggregation,
                terms,
            }],
            (Aggregation::Sum, ShellArity::Multi { .. }) => {
                let shell_weight = objective.shell_weight();
                let pooled_weight = objective.pooled_weight();
                let merged = terms
                    .into_iter()
                    .filter_map(|t| {
                        let coefficient = if same_shell(&t) {
                            shell_weight + pooled_weight
                        } else {
                            pooled_weight
                        };
                        (coefficient != 0.0).then(|| t.scaled(coefficient))
                    })
                    .collect();
                vec![TermGroup {
                    weight: 1.0,
                    aggregation: Aggregation::Sum,
                    terms: merged,
                }]
            }
            (Aggregation::Max, ShellArity::Multi { .. }) => {
                let mut groups: Vec<TermGroup> = shell_ranges
                    .iter()
                    .map(|range| TermGroup {
                        weight: objective.shell_weight(),
                        aggregation: Aggregation::Max,
                        terms: terms
                            .iter()
                            .filter(|t| range.contains(&t.i) && range.contains(&t.j))
                            .copied()
                            .collect(),
                    })
                    .collect();
                groups.push(TermGroup {
                    weight: objective.pooled_weight(),
                    aggregation: Aggregation::Max,
                    terms,
                });
                groups
            }
        };

        let groups: Vec<TermGroup> = groups
            .into_iter()
            .filter(|g| g.weight != 0.0 && !g.terms.is_empty())
            .collect();

        let constant = match objective.arity {
            ShellArity::Single if directions.len() < 2 => kernel.degenerate_cost(&directions),
            ShellArity::Single => 0.0,
            ShellArity::Multi { .. } => {
                let shells: f64 = shell_ranges
                    .iter()
                    .filter(|range| range.len() < 2)
                    .map(|range| {
                        objective.shell_weight()
                            * kernel.degenerate_cost(&directions[range.clone()])
                    })
                    .sum();
                let pooled = if directions.len() < 2 {
                    objective.pooled_weight() * kernel.degenerate_cost(&directions)
                } else {
                    0.0
                };
                shells + pooled
            }
        };

        debug!(
            variables = directions.len(),
            groups = groups.len(),
            terms = groups.iter().map(|g| g.terms.len()).sum::<usize>(),
            "Flip model built."
        );

        Self {
            objective: *objective,
            num_variables: directions.len(),
            shell_ranges,
            groups,
            constant,
        }
    }

    pub fn objective(&self) -> &FlipObjective {
        &self.objective
    }

    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    pub fn shell_ranges(&self) -> &[Range<usize>] {
        &self.shell_ranges
    }

    pub fn groups(&self) -> &[TermGroup] {
        &self.groups
    }

    /// Part of the objective that no assignment can change.
    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// True when no pair terms exist, so every assignment is optimal.
    pub fn is_trivial(&self) -> bool {
        self.groups.is_empty()
    }

    /// Objective value of a full assignment (`true` = flip).
    ///
    /// # Panics
    ///
    /// Panics if `assignment` is shorter than [`Self::num_variables`].
    pub fn evaluate(&self, assignment: &[bool]) -> f64 {
        self.constant + self.groups.iter().map(|g| g.evaluate(assignment)).sum::<f64>()
    }

    /// Splits a global assignment into one mask per shell, preserving shell order and
    /// the order of directions within each shell.
    pub fn split_assignment(&self, assignment: &[bool]) -> Vec<FlipMask> {
        self.shell_ranges
            .iter()
            .map(|range| FlipMask::from(assignment[range.clone()].to_vec()))
            .collect()
    }
}
