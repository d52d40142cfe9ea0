use super::relaxation::{NODE_SWEEPS, ROOT_SWEEPS, Relaxation};
use super::{FlipSolver, SolveOutcome, SolveStatus};
use crate::engine::config::SolverSettings;
use crate::engine::error::EngineError;
use crate::engine::model::{Aggregation, FlipModel, TermGroup};
use crate::engine::progress::{Progress, ProgressReporter};
use std::time::Instant;
use tracing::{debug, info, instrument, trace};

const TIME_CHECK_INTERVAL: u64 = 16;
const RELATIVE_IMPROVEMENT: f64 = 1e-9;
/// Nodes with fewer free variables are bounded without the relaxation.
const RELAXATION_MIN_FREE: usize = 3;

/// Exact depth-first branch-and-bound over the flip variables.
///
/// Variable `b_0` is fixed to "not flipped". The others are branched strongest-coupled
/// first; each node bounds both children from below and visits the lower one first.
/// Bounds combine a per-term bound with a semidefinite relaxation of the
/// sum-aggregated groups, whose rounded solutions also feed the incumbent. The search
/// starts from the better of the identity assignment and a greedy single-flip descent,
/// and only strictly better assignments replace the incumbent, so an already optimal
/// scheme comes back unflipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchAndBound;

impl BranchAndBound {
    pub fn new() -> Self {
        Self
    }
}

fn improves(candidate: f64, incumbent: f64) -> bool {
    candidate < incumbent - RELATIVE_IMPROVEMENT * incumbent.abs().max(1.0)
}

/// `b_0` first, then repeatedly the unplaced variable with the largest total coupling
/// `Σ weight · |same − flipped|` to the variables already placed. Ties go to the
/// smaller index.
fn branching_order(model: &FlipModel) -> Vec<usize> {
    let n = model.num_variables();
    let mut strength = vec![0.0; n * n];
    for group in model.groups() {
        for term in &group.terms {
            let coupling = (group.weight * (term.same - term.flipped)).abs();
            strength[term.i * n + term.j] += coupling;
            strength[term.j * n + term.i] += coupling;
        }
    }

    let mut order = Vec::with_capacity(n);
    let mut placed = vec![false; n];
    let mut pull = vec![0.0; n];
    let mut next = 0;
    while order.len() < n {
        order.push(next);
        placed[next] = true;
        for (v, p) in pull.iter_mut().enumerate() {
            *p += strength[next * n + v];
        }
        let mut candidate = None;
        for v in (0..n).filter(|&v| !placed[v]) {
            if candidate.is_none_or(|c: usize| pull[v] > pull[c]) {
                candidate = Some(v);
            }
        }
        match candidate {
            Some(v) => next = v,
            None => break,
        }
    }
    order
}

struct Search<'a, 'r> {
    model: &'a FlipModel,
    reporter: &'a ProgressReporter<'r>,
    verbose: bool,
    deadline: Option<Instant>,
    order: Vec<usize>,
    fixed: Vec<bool>,
    current: Vec<bool>,
    best: Vec<bool>,
    best_value: f64,
    nodes: u64,
    timed_out: bool,
    relaxation: Option<Relaxation>,
    // Per-variable [cost if not flipped, cost if flipped] of terms with one free end.
    slots: Vec<[f64; 2]>,
    slot_in_use: Vec<bool>,
    touched: Vec<usize>,
}

impl<'a, 'r> Search<'a, 'r> {
    fn new(
        model: &'a FlipModel,
        settings: &SolverSettings,
        reporter: &'a ProgressReporter<'r>,
    ) -> Self {
        let n = model.num_variables();
        let identity = vec![false; n];
        let best_value = model.evaluate(&identity);
        Self {
            model,
            reporter,
            verbose: settings.verbose(),
            deadline: Instant::now().checked_add(settings.time_limit()),
            order: branching_order(model),
            fixed: vec![false; n],
            current: identity.clone(),
            best: identity,
            best_value,
            nodes: 0,
            timed_out: false,
            // Two relaxed solutions per depth, one for each child.
            relaxation: Relaxation::new(model.groups(), n, 2 * n),
            slots: vec![[0.0; 2]; n],
            slot_in_use: vec![false; n],
            touched: Vec::with_capacity(n),
        }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn accept(&mut self, assignment: &[bool], value: f64) {
        self.best.copy_from_slice(assignment);
        self.best_value = value;
        if self.verbose {
            info!(
                "New incumbent {:.6} after {} nodes ({} flipped).",
                value,
                self.nodes,
                assignment.iter().filter(|&&b| b).count()
            );
        } else {
            debug!("New incumbent {:.6} after {} nodes.", value, self.nodes);
        }
        self.reporter.report(Progress::Incumbent {
            objective: value,
            nodes: self.nodes,
        });
    }

    /// Greedy descent: flip any single variable (except `b_0`) that strictly improves
    /// the objective, until a full pass changes nothing.
    fn polish(&mut self, assignment: &mut [bool], value: &mut f64) {
        let mut improved = true;
        while improved {
            if self.deadline_passed() {
                self.timed_out = true;
                break;
            }
            improved = false;
            for k in 1..assignment.len() {
                assignment[k] = !assignment[k];
                let candidate = self.model.evaluate(assignment);
                if improves(candidate, *value) {
                    *value = candidate;
                    improved = true;
                } else {
                    assignment[k] = !assignment[k];
                }
            }
        }
    }

    /// Polishes `assignment` and keeps it if it beats the incumbent.
    fn offer(&mut self, mut assignment: Vec<bool>) {
        let mut value = self.model.evaluate(&assignment);
        self.polish(&mut assignment, &mut value);
        if improves(value, self.best_value) {
            self.accept(&assignment, value);
        }
    }

    fn warm_start(&mut self) {
        self.offer(self.best.clone());
    }

    fn group_bound(&mut self, group: &TermGroup) -> f64 {
        let aggregation = group.aggregation;
        let mut acc = aggregation.identity();

        for term in &group.terms {
            let (i, j) = (term.i, term.j);
            let (settled, free) = match (self.fixed[i], self.fixed[j]) {
                (true, true) => {
                    acc = aggregation.combine(acc, term.value(self.current[i], self.current[j]));
                    continue;
                }
                (false, false) => {
                    acc = aggregation.combine(acc, term.best_case());
                    continue;
                }
                (true, false) => (i, j),
                (false, true) => (j, i),
            };
            let slot = &mut self.slots[free];
            if !self.slot_in_use[free] {
                *slot = [aggregation.identity(); 2];
                self.slot_in_use[free] = true;
                self.touched.push(free);
            }
            let fixed = self.current[settled];
            slot[0] = aggregation.combine(slot[0], term.value(fixed, false));
            slot[1] = aggregation.combine(slot[1], term.value(fixed, true));
        }

        for &j in &self.touched {
            let [unflipped, flipped] = self.slots[j];
            acc = aggregation.combine(acc, unflipped.min(flipped));
            self.slot_in_use[j] = false;
        }
        self.touched.clear();

        group.weight * acc
    }

    /// Lower bound on the objective over every completion of the variables in
    /// `order[..depth]`.
    ///
    /// The relaxed solution for this node is refined from slot `parent` into `slot`.
    fn lower_bound(&mut self, depth: usize, parent: usize, slot: usize) -> f64 {
        let model = self.model;
        let mut summed = 0.0;
        let mut rest = model.constant();
        for group in model.groups() {
            let bound = self.group_bound(group);
            match group.aggregation {
                Aggregation::Sum => summed += bound,
                Aggregation::Max => rest += bound,
            }
        }

        let elementwise = rest + summed;
        if !improves(elementwise, self.best_value)
            || model.num_variables() - depth < RELAXATION_MIN_FREE
        {
            return elementwise;
        }
        let Some(relaxed) = self.relaxation.as_mut().and_then(|relaxation| {
            relaxation.bound(&self.current, &self.fixed, parent, slot, NODE_SWEEPS)
        }) else {
            return elementwise;
        };
        self.offer(relaxed.rounding);
        rest + summed.max(relaxed.value)
    }

    /// Solves the relaxation at the root into slot 0 and offers its rounding.
    fn relax_root(&mut self) {
        let Some(relaxed) = self.relaxation.as_mut().and_then(|relaxation| {
            relaxation.bound(&self.current, &self.fixed, 0, 0, ROOT_SWEEPS)
        }) else {
            return;
        };
        debug!(
            "Root relaxation bound: {:.6}",
            self.model.constant() + relaxed.value
        );
        self.offer(relaxed.rounding);
    }

    /// Expands the node whose variables `order[..depth]` are fixed and whose relaxed
    /// solution sits in `slot`.
    fn descend(&mut self, depth: usize, slot: usize) {
        if self.timed_out {
            return;
        }
        if self.nodes % TIME_CHECK_INTERVAL == 0 && self.deadline_passed() {
            self.timed_out = true;
            return;
        }
        self.nodes += 1;

        if depth == self.model.num_variables() {
            let value = self.model.evaluate(&self.current);
            if improves(value, self.best_value) {
                let assignment = self.current.clone();
                self.accept(&assignment, value);
            }
            return;
        }

        let v = self.order[depth];
        self.fixed[v] = true;
        let mut children = [false, true].map(|flip| {
            self.current[v] = flip;
            let child = 2 * depth + usize::from(flip);
            (self.lower_bound(depth + 1, slot, child), flip)
        });
        children.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (bound, flip) in children {
            if !improves(bound, self.best_value) {
                trace!("Pruned b{} = {} at bound {:.6}.", v, flip, bound);
                continue;
            }
            self.current[v] = flip;
            self.descend(depth + 1, 2 * depth + usize::from(flip));
        }
        self.current[v] = false;
        self.fixed[v] = false;
    }
}

impl FlipSolver for BranchAndBound {
    fn name(&self) -> &'static str {
        "branch-and-bound"
    }

    #[instrument(skip_all, name = "branch_and_bound", fields(variables = model.num_variables()))]
    fn solve(
        &self,
        model: &FlipModel,
        settings: &SolverSettings,
        reporter: &ProgressReporter,
    ) -> Result<SolveOutcome, EngineError> {
        let n = model.num_variables();
        let mut search = Search::new(model, settings, reporter);
        debug!("Identity assignment objective: {:.6}", search.best_value);

        if n > 1 && !model.is_trivial() {
            search.warm_start();
            search.fixed[0] = true;
            if !search.timed_out {
                search.relax_root();
            }
            search.descend(1, 0);
        }

        let status = if search.timed_out {
            SolveStatus::TimeLimitReached
        } else {
            SolveStatus::Optimal
        };
        debug!(
            "Search finished: {} after {} nodes, objective {:.6}.",
            status, search.nodes, search.best_value
        );

        Ok(SolveOutcome {
            status,
            values: search
                .best
                .iter()
                .map(|&b| if b { 1.0 } else { 0.0 })
                .collect(),
            objective: search.best_value,
            nodes_explored: search.nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::scheme::{Direction, MultiShellScheme, Scheme};
    use crate::engine::config::{Criterion, FlipObjective, ShellArity};
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE * a.abs().max(b.abs()).max(1.0)
    }

    /// Golden-angle spiral points with every third one sent to the opposite hemisphere.
    fn scrambled_shell(n: usize, phase: f64) -> Scheme {
        let golden = PI * (3.0 - 5.0_f64.sqrt());
        (0..n)
            .map(|k| {
                let z = 1.0 - (k as f64 + 0.5) / n as f64;
                let r = (1.0 - z * z).sqrt();
                let theta = golden * k as f64 + phase;
                let d = Direction::new(r * theta.cos(), r * theta.sin(), z);
                if k % 3 == 0 { -d } else { d }
            })
            .collect()
    }

    /// Golden-angle spiral over the upper hemisphere.
    fn hemisphere(n: usize) -> Scheme {
        let golden = PI * (3.0 - 5.0_f64.sqrt());
        (0..n)
            .map(|k| {
                let z = 1.0 - (k as f64 + 0.5) / n as f64;
                let r = (1.0 - z * z).sqrt();
                let theta = golden * k as f64;
                Direction::new(r * theta.cos(), r * theta.sin(), z)
            })
            .collect()
    }

    fn objective(criterion: Criterion, arity: ShellArity) -> FlipObjective {
        FlipObjective {
            criterion,
            order: 2,
            arity,
        }
    }

    fn settings() -> SolverSettings {
        SolverSettings::new(60.0, false).unwrap()
    }

    fn brute_force_minimum(model: &FlipModel) -> f64 {
        let n = model.num_variables();
        (0u32..1 << (n - 1))
            .map(|bits| {
                let assignment: Vec<bool> = std::iter::once(false)
                    .chain((1..n).map(|k| bits & (1 << (k - 1)) != 0))
                    .collect();
                model.evaluate(&assignment)
            })
            .fold(f64::INFINITY, f64::min)
    }

    fn solve(model: &FlipModel) -> SolveOutcome {
        BranchAndBound::new()
            .solve(model, &settings(), &ProgressReporter::new())
            .unwrap()
    }

    fn assignment(outcome: &SolveOutcome) -> Vec<bool> {
        outcome.values.iter().map(|&v| v > 0.5).collect()
    }

    #[test]
    fn matches_brute_force_on_single_shells() {
        for criterion in [Criterion::Electrostatic, Criterion::Distance] {
            for n in [2, 5, 8] {
                let scheme = MultiShellScheme::single(scrambled_shell(n, 0.3));
                let model = FlipModel::build(&scheme, &objective(criterion, ShellArity::Single));
                let outcome = solve(&model);

                assert_eq!(outcome.status, SolveStatus::Optimal);
                assert!(
                    f64_approx_equal(outcome.objective, brute_force_minimum(&model)),
                    "{criterion} with {n} directions"
                );
                assert!(f64_approx_equal(
                    outcome.objective,
                    model.evaluate(&assignment(&outcome))
                ));
            }
        }
    }

    #[test]
    fn matches_brute_force_on_multiple_shells() {
        let scheme = MultiShellScheme::new(vec![scrambled_shell(4, 0.0), scrambled_shell(5, 1.1)]);
        for criterion in [Criterion::Electrostatic, Criterion::Distance] {
            for weight in [0.0, 0.5, 1.0] {
                let arity = ShellArity::Multi {
                    num_shells: 2,
                    weight,
                };
                let model = FlipModel::build(&scheme, &objective(criterion, arity));
                let outcome = solve(&model);
                assert!(
                    f64_approx_equal(outcome.objective, brute_force_minimum(&model)),
                    "{criterion} with weight {weight}"
                );
            }
        }
    }

    #[test]
    fn first_direction_is_never_flipped() {
        let scheme = MultiShellScheme::single(scrambled_shell(7, 0.9));
        let model = FlipModel::build(
            &scheme,
            &objective(Criterion::Electrostatic, ShellArity::Single),
        );
        assert_eq!(solve(&model).values[0], 0.0);
    }

    #[test]
    fn orthogonal_and_antipodal_pairs_stay_unflipped() {
        for rows in [
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            [[0.0, 0.0, 1.0], [0.0, 0.0, -1.0]],
        ] {
            let scheme = MultiShellScheme::single(Scheme::from_rows(&rows));
            for criterion in [Criterion::Electrostatic, Criterion::Distance] {
                let model = FlipModel::build(&scheme, &objective(criterion, ShellArity::Single));
                assert_eq!(solve(&model).values, vec![0.0, 0.0], "{criterion}: {rows:?}");
            }
        }
    }

    #[test]
    fn nearly_parallel_pair_is_separated() {
        let scheme = MultiShellScheme::single(
            [Direction::new(1.0, 0.0, 0.0), Direction::new(1.0, 0.1, 0.0).normalize()]
                .into_iter()
                .collect(),
        );
        let model = FlipModel::build(
            &scheme,
            &objective(Criterion::Electrostatic, ShellArity::Single),
        );
        let outcome = solve(&model);
        assert_eq!(outcome.values, vec![0.0, 1.0]);
        assert!(outcome.objective < model.evaluate(&[false, false]));
    }

    #[test]
    fn solving_the_flipped_scheme_again_changes_nothing() {
        let scheme = MultiShellScheme::single(scrambled_shell(8, 0.7));
        for criterion in [Criterion::Electrostatic, Criterion::Distance] {
            let model = FlipModel::build(&scheme, &objective(criterion, ShellArity::Single));
            let first = solve(&model);
            let flipped = scheme
                .apply_masks(&model.split_assignment(&assignment(&first)))
                .unwrap();

            let again = FlipModel::build(&flipped, &objective(criterion, ShellArity::Single));
            let second = solve(&again);
            assert!(second.values.iter().all(|&v| v == 0.0), "{criterion}");
        }
    }

    #[test]
    fn incumbents_are_reported_in_decreasing_order() {
        use std::sync::{Arc, Mutex};

        let incumbents = Arc::new(Mutex::new(Vec::new()));
        let sink = incumbents.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            if let Progress::Incumbent { objective, .. } = event {
                sink.lock().unwrap().push(objective);
            }
        }));

        // A nearly duplicated direction makes the unflipped scheme clearly suboptimal.
        let mut directions = scrambled_shell(8, 0.2).into_directions();
        directions.push((directions[2] + Direction::new(0.01, -0.01, 0.0)).normalize());
        let scheme = MultiShellScheme::single(Scheme::new(directions));
        let model = FlipModel::build(
            &scheme,
            &objective(Criterion::Electrostatic, ShellArity::Single),
        );
        let verbose = SolverSettings::new(60.0, true).unwrap();
        let outcome = BranchAndBound::new().solve(&model, &verbose, &reporter).unwrap();

        let incumbents = incumbents.lock().unwrap();
        assert!(!incumbents.is_empty());
        assert!(incumbents.windows(2).all(|w| w[1] < w[0]));
        assert_eq!(*incumbents.last().unwrap(), outcome.objective);
    }

    #[test]
    fn expired_time_limit_returns_the_incumbent() {
        let scheme = MultiShellScheme::single(scrambled_shell(40, 0.5));
        let model = FlipModel::build(
            &scheme,
            &objective(Criterion::Electrostatic, ShellArity::Single),
        );
        let settings = SolverSettings::new(1e-9, false).unwrap();
        let outcome = BranchAndBound::new()
            .solve(&model, &settings, &ProgressReporter::new())
            .unwrap();

        assert_eq!(outcome.status, SolveStatus::TimeLimitReached);
        assert_eq!(outcome.values.len(), 40);
        assert!(outcome.objective <= model.evaluate(&vec![false; 40]));
    }

    #[test]
    fn single_direction_is_trivially_optimal() {
        let scheme = MultiShellScheme::single(Scheme::from_rows(&[[0.0, 1.0, 0.0]]));
        let model = FlipModel::build(&scheme, &objective(Criterion::Distance, ShellArity::Single));
        let outcome = solve(&model);
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.values, vec![0.0]);
        assert_eq!(outcome.nodes_explored, 0);
    }

    #[test]
    fn forty_direction_hemisphere_is_solved_to_optimality() {
        let scheme = MultiShellScheme::single(hemisphere(40));
        let model = FlipModel::build(
            &scheme,
            &objective(Criterion::Electrostatic, ShellArity::Single),
        );
        let settings = SolverSettings::new(600.0, false).unwrap();
        let outcome = BranchAndBound::new()
            .solve(&model, &settings, &ProgressReporter::new())
            .unwrap();

        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert!(f64_approx_equal(
            outcome.objective,
            model.evaluate(&assignment(&outcome))
        ));
        assert!((outcome.objective - 704.009386).abs() < 1e-4, "{}", outcome.objective);
        assert!(outcome.objective < model.evaluate(&vec![false; 40]));
    }

    #[test]
    fn icosahedron_vertices_are_kept_as_they_are() {
        let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
        let axes = [
            Direction::new(0.0, 1.0, phi),
            Direction::new(0.0, -1.0, phi),
            Direction::new(1.0, phi, 0.0),
            Direction::new(-1.0, phi, 0.0),
            Direction::new(phi, 0.0, 1.0),
            Direction::new(phi, 0.0, -1.0),
        ];
        let vertices: Scheme = axes
            .iter()
            .map(|a| a.normalize())
            .flat_map(|a| [a, -a])
            .collect();
        let scheme = MultiShellScheme::single(vertices);

        for criterion in [Criterion::Electrostatic, Criterion::Distance] {
            let model = FlipModel::build(&scheme, &objective(criterion, ShellArity::Single));
            let outcome = solve(&model);
            assert_eq!(outcome.status, SolveStatus::Optimal, "{criterion}");
            assert!(outcome.objective <= model.evaluate(&[false; 12]), "{criterion}");
            assert!(outcome.values.iter().all(|&v| v == 0.0), "{criterion}");
        }
    }

    #[test]
    fn branching_visits_the_most_strongly_coupled_direction_next() {
        let mut directions = scrambled_shell(6, 0.0).into_directions();
        directions[3] = (directions[0] + Direction::new(0.0, 0.02, -0.01)).normalize();
        let scheme = MultiShellScheme::single(Scheme::new(directions));
        let model = FlipModel::build(
            &scheme,
            &objective(Criterion::Electrostatic, ShellArity::Single),
        );

        let order = branching_order(&model);
        assert_eq!(&order[..2], &[0, 3]);
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..6).collect::<Vec<_>>());
    }
}
