//! Explicit mixed-integer linear form of a [`FlipModel`].
//!
//! The pairwise structure is linearized with one XOR variable per pair,
//!
//! ```text
//! y_ij ≤ b_i + b_j        y_ij ≥ b_i − b_j
//! y_ij ≤ 2 − b_i − b_j    y_ij ≥ b_j − b_i
//! ```
//!
//! so a term contributes `same + (flipped − same) · y_ij`. Sum groups add that
//! expression to the objective directly; max groups get an epigraph variable `t_g`
//! bounded below by every term of the group. `b_0 = 0` removes the global flip
//! symmetry. The result can be written in CPLEX LP format for external MILP solvers.

use crate::engine::model::{Aggregation, FlipModel};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use tracing::{debug, instrument};

const FEASIBILITY_TOLERANCE: f64 = 1e-9;
const TERMS_PER_LINE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariableKind {
    Binary,
    Free,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessEq,
    GreaterEq,
    Equal,
}

impl Relation {
    fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::LessEq => lhs <= rhs + FEASIBILITY_TOLERANCE,
            Self::GreaterEq => lhs >= rhs - FEASIBILITY_TOLERANCE,
            Self::Equal => (lhs - rhs).abs() <= FEASIBILITY_TOLERANCE,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LessEq => write!(f, "<="),
            Self::GreaterEq => write!(f, ">="),
            Self::Equal => write!(f, "="),
        }
    }
}

/// `Σ coefficient · x[index]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<(usize, f64)>,
}

impl LinearExpr {
    fn with_terms(terms: &[(usize, f64)]) -> Self {
        Self {
            terms: terms.to_vec(),
        }
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(idx, c)| c * values[idx]).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub lhs: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MilpModel {
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: LinearExpr,
    objective_constant: f64,
    num_flip_variables: usize,
    xor_variables: BTreeMap<(usize, usize), usize>,
    epigraph_variables: Vec<(usize, usize)>,
}

impl MilpModel {
    /// Linearizes `model`. Variables `0..n` are the flip variables `b_i`.
    #[instrument(skip_all, name = "milp_linearize")]
    pub fn from_flip_model(model: &FlipModel) -> Self {
        let n = model.num_variables();
        let mut milp = Self {
            variables: (0..n)
                .map(|i| Variable {
                    name: format!("b{i}"),
                    kind: VariableKind::Binary,
                })
                .collect(),
            num_flip_variables: n,
            objective_constant: model.constant(),
            ..Self::default()
        };

        if n > 0 {
            milp.add_constraint("fix_b0".to_string(), &[(0, 1.0)], Relation::Equal, 0.0);
        }

        let mut objective: BTreeMap<usize, f64> = BTreeMap::new();
        for (g, group) in model.groups().iter().enumerate() {
            match group.aggregation {
                Aggregation::Sum => {
                    for term in &group.terms {
                        let y = milp.xor_variable(term.i, term.j);
                        milp.objective_constant += group.weight * term.same;
                        *objective.entry(y).or_default() +=
                            group.weight * (term.flipped - term.same);
                    }
                }
                Aggregation::Max => {
                    let t = milp.add_variable(format!("t{g}"), VariableKind::Free);
                    milp.epigraph_variables.push((t, g));
                    *objective.entry(t).or_default() += group.weight;
                    for term in &group.terms {
                        let y = milp.xor_variable(term.i, term.j);
                        milp.add_constraint(
                            format!("epi{g}_{}_{}", term.i, term.j),
                            &[(t, 1.0), (y, term.same - term.flipped)],
                            Relation::GreaterEq,
                            term.same,
                        );
                    }
                }
            }
        }
        milp.objective = LinearExpr {
            terms: objective.into_iter().filter(|&(_, c)| c != 0.0).collect(),
        };

        debug!(
            variables = milp.variables.len(),
            constraints = milp.constraints.len(),
            "MILP linearization complete."
        );
        milp
    }

    fn add_variable(&mut self, name: String, kind: VariableKind) -> usize {
        self.variables.push(Variable { name, kind });
        self.variables.len() - 1
    }

    fn add_constraint(&mut self, name: String, lhs: &[(usize, f64)], relation: Relation, rhs: f64) {
        self.constraints.push(Constraint {
            name,
            lhs: LinearExpr::with_terms(lhs),
            relation,
            rhs,
        });
    }

    fn xor_variable(&mut self, i: usize, j: usize) -> usize {
        let key = (i.min(j), i.max(j));
        if let Some(&y) = self.xor_variables.get(&key) {
            return y;
        }
        let (i, j) = key;
        let y = self.add_variable(format!("y{i}_{j}"), VariableKind::Binary);
        self.xor_variables.insert(key, y);

        self.add_constraint(format!("xor{i}_{j}_a"), &[(y, 1.0), (i, -1.0), (j, -1.0)], Relation::LessEq, 0.0);
        self.add_constraint(format!("xor{i}_{j}_b"), &[(y, 1.0), (i, 1.0), (j, 1.0)], Relation::LessEq, 2.0);
        self.add_constraint(format!("xor{i}_{j}_c"), &[(y, 1.0), (i, -1.0), (j, 1.0)], Relation::GreaterEq, 0.0);
        self.add_constraint(format!("xor{i}_{j}_d"), &[(y, 1.0), (i, 1.0), (j, -1.0)], Relation::GreaterEq, 0.0);
        y
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn num_flip_variables(&self) -> usize {
        self.num_flip_variables
    }

    pub fn num_binaries(&self) -> usize {
        self.variables
            .iter()
            .filter(|v| v.kind == VariableKind::Binary)
            .count()
    }

    /// Extends a flip assignment to values for every MILP variable: XOR variables take
    /// `b_i XOR b_j` and each epigraph variable the worst term of its group.
    pub fn complete_assignment(&self, model: &FlipModel, flips: &[bool]) -> Vec<f64> {
        let mut values = vec![0.0; self.variables.len()];
        for (i, &flip) in flips.iter().enumerate().take(self.num_flip_variables) {
            values[i] = if flip { 1.0 } else { 0.0 };
        }
        for (&(i, j), &y) in &self.xor_variables {
            values[y] = if flips[i] != flips[j] { 1.0 } else { 0.0 };
        }
        for &(t, g) in &self.epigraph_variables {
            let group = &model.groups()[g];
            values[t] = group
                .terms
                .iter()
                .map(|term| term.value(flips[term.i], flips[term.j]))
                .fold(f64::NEG_INFINITY, f64::max);
        }
        values
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.objective_constant + self.objective.evaluate(values)
    }

    /// Checks integrality of binaries and every constraint.
    pub fn is_feasible(&self, values: &[f64]) -> bool {
        let integral = self.variables.iter().zip(values).all(|(v, &x)| match v.kind {
            VariableKind::Binary => {
                x.abs() <= FEASIBILITY_TOLERANCE || (x - 1.0).abs() <= FEASIBILITY_TOLERANCE
            }
            VariableKind::Free => x.is_finite(),
        });
        integral
            && self
                .constraints
                .iter()
                .all(|c| c.relation.holds(c.lhs.evaluate(values), c.rhs))
    }

    fn write_expr(&self, writer: &mut impl Write, expr: &LinearExpr) -> io::Result<()> {
        if expr.terms.is_empty() {
            return write!(writer, " 0 {}", self.variables.first().map_or("b0", |v| &v.name));
        }
        for (k, &(idx, coefficient)) in expr.terms.iter().enumerate() {
            if k > 0 && k % TERMS_PER_LINE == 0 {
                write!(writer, "\n   ")?;
            }
            let sign = if coefficient < 0.0 { '-' } else { '+' };
            write!(writer, " {} {} {}", sign, coefficient.abs(), self.variables[idx].name)?;
        }
        Ok(())
    }

    /// Writes the model in CPLEX LP format.
    pub fn write_lp(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "\\ qflip sign-flip model")?;
        writeln!(writer, "\\ objective constant: {}", self.objective_constant)?;
        writeln!(writer, "Minimize")?;
        write!(writer, " obj:")?;
        self.write_expr(writer, &self.objective)?;
        if self.objective_constant != 0.0 {
            let sign = if self.objective_constant < 0.0 { '-' } else { '+' };
            write!(writer, " {} {}", sign, self.objective_constant.abs())?;
        }
        writeln!(writer)?;

        writeln!(writer, "Subject To")?;
        for c in &self.constraints {
            write!(writer, " {}:", c.name)?;
            self.write_expr(writer, &c.lhs)?;
            writeln!(writer, " {} {}", c.relation, c.rhs)?;
        }

        writeln!(writer, "Bounds")?;
        for v in self.variables.iter().filter(|v| v.kind == VariableKind::Free) {
            writeln!(writer, " {} free", v.name)?;
        }

        writeln!(writer, "Binaries")?;
        let binaries: Vec<&str> = self
            .variables
            .iter()
            .filter(|v| v.kind == VariableKind::Binary)
            .map(|v| v.name.as_str())
            .collect();
        for chunk in binaries.chunks(TERMS_PER_LINE * 2) {
            writeln!(writer, " {}", chunk.join(" "))?;
        }
        writeln!(writer, "End")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::scheme::{Direction, MultiShellScheme, Scheme};
    use crate::engine::config::{Criterion, FlipObjective, ShellArity};

    const TOLERANCE: f64 = 1e-9;

    fn scheme() -> MultiShellScheme {
        let shell = |rows: &[[f64; 3]]| -> Scheme {
            rows.iter()
                .map(|&[x, y, z]| Direction::new(x, y, z).normalize())
                .collect()
        };
        MultiShellScheme::new(vec![
            shell(&[[1.0, 0.1, 0.0], [-0.7, 0.7, 0.1], [0.0, 0.2, 1.0]]),
            shell(&[[0.5, 0.5, 0.7], [-0.1, -0.9, 0.4]]),
        ])
    }

    fn build(criterion: Criterion) -> (FlipModel, MilpModel) {
        let objective = FlipObjective {
            criterion,
            order: 2,
            arity: ShellArity::Multi {
                num_shells: 2,
                weight: 0.4,
            },
        };
        let model = FlipModel::build(&scheme(), &objective);
        let milp = MilpModel::from_flip_model(&model);
        (model, milp)
    }

    fn assignments(n: usize) -> impl Iterator<Item = Vec<bool>> {
        (0u32..1 << n).map(move |bits| (0..n).map(|k| bits & (1 << k) != 0).collect())
    }

    #[test]
    fn milp_objective_equals_model_objective_for_every_assignment() {
        for criterion in [Criterion::Electrostatic, Criterion::Distance] {
            let (model, milp) = build(criterion);
            for flips in assignments(5) {
                let values = milp.complete_assignment(&model, &flips);
                let expected = model.evaluate(&flips);
                assert!(
                    (milp.evaluate(&values) - expected).abs() < TOLERANCE * expected.abs().max(1.0),
                    "{criterion}: {flips:?}"
                );
            }
        }
    }

    #[test]
    fn single_direction_shell_cost_is_part_of_the_objective_constant() {
        let scheme = MultiShellScheme::new(vec![
            Scheme::from_rows(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]),
            Scheme::from_rows(&[[0.6, 0.8, 0.0]]),
        ]);
        let objective = FlipObjective {
            criterion: Criterion::Distance,
            order: 2,
            arity: ShellArity::Multi {
                num_shells: 2,
                weight: 0.5,
            },
        };
        let model = FlipModel::build(&scheme, &objective);
        let milp = MilpModel::from_flip_model(&model);

        for flips in assignments(4) {
            let values = milp.complete_assignment(&model, &flips);
            let expected = model.evaluate(&flips);
            assert!((milp.evaluate(&values) - expected).abs() < TOLERANCE * expected.abs().max(1.0));
        }
    }

    #[test]
    fn completed_assignments_with_b0_unflipped_are_feasible() {
        for criterion in [Criterion::Electrostatic, Criterion::Distance] {
            let (model, milp) = build(criterion);
            for flips in assignments(5).filter(|f| !f[0]) {
                let values = milp.complete_assignment(&model, &flips);
                assert!(milp.is_feasible(&values), "{criterion}: {flips:?}");
            }
        }
    }

    #[test]
    fn symmetry_breaking_excludes_flipping_the_first_direction() {
        let (model, milp) = build(Criterion::Electrostatic);
        let values = milp.complete_assignment(&model, &[true, false, false, false, false]);
        assert!(!milp.is_feasible(&values));
    }

    #[test]
    fn xor_constraints_reject_inconsistent_pair_variables() {
        let (model, milp) = build(Criterion::Electrostatic);
        let mut values = milp.complete_assignment(&model, &[false, true, false, false, false]);
        let y01 = milp.xor_variables[&(0, 1)];
        assert_eq!(values[y01], 1.0);
        values[y01] = 0.0;
        assert!(!milp.is_feasible(&values));
    }

    #[test]
    fn variable_counts_follow_the_linearization() {
        let (_, energy) = build(Criterion::Electrostatic);
        // 5 flip variables and one XOR variable per pair.
        assert_eq!(energy.num_flip_variables(), 5);
        assert_eq!(energy.num_binaries(), 5 + 10);
        assert_eq!(energy.constraints().len(), 1 + 4 * 10);

        let (_, distance) = build(Criterion::Distance);
        // Two shell groups and the pooled group each get an epigraph variable.
        assert_eq!(distance.variables().len(), 5 + 10 + 3);
        assert_eq!(distance.constraints().len(), 1 + 4 * 10 + (3 + 1 + 10));
    }

    #[test]
    fn lp_output_contains_every_section() {
        let (_, milp) = build(Criterion::Distance);
        let mut buffer = Vec::new();
        milp.write_lp(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        for section in ["Minimize", "Subject To", "Bounds", "Binaries", "End"] {
            assert!(text.contains(section), "missing section {section}");
        }
        assert!(text.contains(" fix_b0: + 1 b0 = 0"));
        assert!(text.contains(" t0 free"));
        assert!(text.contains("xor0_1_a"));
    }
}
