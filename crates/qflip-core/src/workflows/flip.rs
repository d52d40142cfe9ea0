use crate::core::models::mask::FlipMask;
use crate::core::models::scheme::{MultiShellScheme, Scheme};
use crate::engine::config::{FlipConfig, FlipObjective, ShellArity};
use crate::engine::driver;
use crate::engine::error::EngineError;
use crate::engine::milp::MilpModel;
use crate::engine::model::FlipModel;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::solver::{BranchAndBound, FlipSolver, SolveStatus};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct FlipResult {
    /// The flipped shells, in input order.
    pub shells: Vec<Scheme>,
    /// One mask per shell; `true` marks a negated direction.
    pub masks: Vec<FlipMask>,
    pub status: SolveStatus,
    /// Objective of the input scheme, before any flip.
    pub initial_objective: f64,
    /// Objective of the returned scheme.
    pub objective: f64,
    pub nodes_explored: u64,
}

impl FlipResult {
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    pub fn flipped_count(&self) -> usize {
        self.masks.iter().map(FlipMask::flipped_count).sum()
    }
}

fn validate_shells(shells: &[Scheme]) -> Result<(), EngineError> {
    if shells.is_empty() {
        return Err(EngineError::NoShells);
    }
    if let Some(shell) = shells.iter().position(Scheme::is_empty) {
        return Err(EngineError::EmptyScheme { shell });
    }
    Ok(())
}

fn prepare(
    shells: &[Scheme],
    config: &FlipConfig,
) -> Result<(MultiShellScheme, FlipModel), EngineError> {
    validate_shells(shells)?;
    let objective = FlipObjective::resolve(config, shells.len())?;
    if objective.arity == ShellArity::Single && config.weight.is_some() {
        debug!("Multi-shell weight is ignored for a single shell.");
    }

    let scheme = MultiShellScheme::new(shells.to_vec());
    let model = FlipModel::build(&scheme, &objective);
    Ok((scheme, model))
}

/// Runs the flip optimization with the built-in [`BranchAndBound`] solver.
pub fn run(
    shells: &[Scheme],
    config: &FlipConfig,
    reporter: &ProgressReporter,
) -> Result<FlipResult, EngineError> {
    run_with_solver(shells, config, &BranchAndBound::new(), reporter)
}

/// Runs the flip optimization with any [`FlipSolver`].
///
/// Several shells are optimized jointly as a single model; a multi-shell weight is
/// required in that case.
///
/// # Errors
///
/// Fails before solving on empty input, empty shells or an incomplete configuration,
/// and afterwards only when the solver itself fails or reports infeasibility.
#[instrument(skip_all, name = "flip_workflow", fields(shells = shells.len(), criterion = %config.criterion))]
pub fn run_with_solver<S: FlipSolver + ?Sized>(
    shells: &[Scheme],
    config: &FlipConfig,
    solver: &S,
    reporter: &ProgressReporter,
) -> Result<FlipResult, EngineError> {
    let (scheme, model) = reporter.phase("Model Construction", || prepare(shells, config))?;
    info!(
        "Optimizing signs of {} directions in {} shell(s).",
        model.num_variables(),
        scheme.num_shells()
    );

    let initial_objective = model.evaluate(&vec![false; model.num_variables()]);

    if model.is_trivial() {
        info!("No direction pairs to score; returning the scheme unflipped.");
        return Ok(FlipResult {
            masks: shells.iter().map(|s| FlipMask::identity(s.len())).collect(),
            shells: shells.to_vec(),
            status: SolveStatus::Optimal,
            initial_objective,
            objective: initial_objective,
            nodes_explored: 0,
        });
    }

    let solution = reporter.phase("Solving", || {
        driver::solve_and_apply(&model, &scheme, solver, &config.solver, reporter)
    })?;

    let result = FlipResult {
        shells: solution.shells.into_shells(),
        masks: solution.masks,
        status: solution.status,
        initial_objective,
        objective: solution.objective,
        nodes_explored: solution.nodes_explored,
    };
    reporter.report(Progress::Message(format!(
        "{} of {} directions flipped",
        result.flipped_count(),
        model.num_variables()
    )));
    info!(
        "Flip workflow complete ({}): objective {:.6} -> {:.6}, {} direction(s) flipped.",
        result.status,
        result.initial_objective,
        result.objective,
        result.flipped_count()
    );
    Ok(result)
}

/// Builds the explicit MILP for `shells` without solving it.
pub fn export_model(shells: &[Scheme], config: &FlipConfig) -> Result<MilpModel, EngineError> {
    let (_, model) = prepare(shells, config)?;
    Ok(MilpModel::from_flip_model(&model))
}
