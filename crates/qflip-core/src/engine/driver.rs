use crate::core::models::mask::FlipMask;
use crate::core::models::scheme::MultiShellScheme;
use crate::engine::config::SolverSettings;
use crate::engine::error::EngineError;
use crate::engine::model::FlipModel;
use crate::engine::progress::ProgressReporter;
use crate::engine::solver::{FlipSolver, SolveStatus};
use tracing::{info, instrument, warn};

/// A solved and applied flip assignment.
#[derive(Debug, Clone)]
pub struct FlipSolution {
    pub status: SolveStatus,
    pub assignment: Vec<bool>,
    pub masks: Vec<FlipMask>,
    pub shells: MultiShellScheme,
    /// Model objective of `assignment`, recomputed after rounding.
    pub objective: f64,
    pub nodes_explored: u64,
}

/// Solves `model` with `solver` and applies the resulting masks to `scheme`.
///
/// A time-limited result is accepted and reported through
/// [`FlipSolution::status`]. The assignment is normalized so that the first
/// direction is never flipped; the objective does not change under a global flip.
///
/// # Errors
///
/// Returns [`EngineError::Infeasible`] when the solver reports that no assignment
/// exists, and [`EngineError::Internal`] when the solver returns the wrong number of
/// values or the model does not describe `scheme`.
#[instrument(skip_all, name = "solver_driver", fields(solver = solver.name()))]
pub fn solve_and_apply<S: FlipSolver + ?Sized>(
    model: &FlipModel,
    scheme: &MultiShellScheme,
    solver: &S,
    settings: &SolverSettings,
    reporter: &ProgressReporter,
) -> Result<FlipSolution, EngineError> {
    if scheme.total_directions() != model.num_variables() {
        return Err(EngineError::Internal(format!(
            "model has {} variables but the scheme has {} directions",
            model.num_variables(),
            scheme.total_directions()
        )));
    }

    let outcome = solver.solve(model, settings, reporter)?;
    match outcome.status {
        SolveStatus::Infeasible => return Err(EngineError::Infeasible),
        SolveStatus::TimeLimitReached => warn!(
            "Time limit of {:.1}s reached; using the best assignment found (objective {:.6}).",
            settings.time_limit().as_secs_f64(),
            outcome.objective
        ),
        SolveStatus::Optimal => info!(
            "Optimal assignment found after {} nodes (objective {:.6}).",
            outcome.nodes_explored, outcome.objective
        ),
    }

    if outcome.values.len() != model.num_variables() {
        return Err(EngineError::Internal(format!(
            "solver '{}' returned {} values for {} variables",
            solver.name(),
            outcome.values.len(),
            model.num_variables()
        )));
    }

    let mut assignment: Vec<bool> = FlipMask::from_values(&outcome.values).iter().collect();
    if assignment.first() == Some(&true) {
        assignment.iter_mut().for_each(|b| *b = !*b);
    }

    let masks = model.split_assignment(&assignment);
    let shells = scheme.apply_masks(&masks)?;
    let objective = model.evaluate(&assignment);

    Ok(FlipSolution {
        status: outcome.status,
        assignment,
        masks,
        shells,
        objective,
        nodes_explored: outcome.nodes_explored,
    })
}
