use crate::core::loss::electrostatic::DEFAULT_ORDER;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIME_LIMIT_SECS: f64 = 600.0;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid criteria '{0}'. Expected DISTANCE or ELECTROSTATIC")]
    InvalidCriteria(String),
    #[error("Time limit must be a positive, finite number of seconds (got {0})")]
    InvalidTimeLimit(f64),
    #[error("Multi-shell weight must lie in [0, 1] (got {0})")]
    InvalidWeight(f64),
    #[error("Electrostatic order must be at least 1 (got {0})")]
    InvalidOrder(i32),
}

/// The spread criterion optimized by the flip model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Criterion {
    /// Maximize the (non-antipodal) covering radius of the flipped scheme.
    Distance,
    /// Minimize the (non-antipodal) electrostatic energy of the flipped scheme.
    #[default]
    Electrostatic,
}

impl FromStr for Criterion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DISTANCE" => Ok(Self::Distance),
            "ELECTROSTATIC" => Ok(Self::Electrostatic),
            _ => Err(ConfigError::InvalidCriteria(s.to_string())),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Distance => write!(f, "DISTANCE"),
            Self::Electrostatic => write!(f, "ELECTROSTATIC"),
        }
    }
}

/// Whether one shell or several jointly-scored shells are flipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShellArity {
    Single,
    Multi { num_shells: usize, weight: f64 },
}

/// The `{criterion × shell arity}` variant, resolved once per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlipObjective {
    pub criterion: Criterion,
    pub order: i32,
    pub arity: ShellArity,
}

impl FlipObjective {
    /// Resolves the objective for a scheme with `num_shells` shells.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingParameter`] when several shells are given but the
    /// configuration carries no multi-shell weight.
    pub fn resolve(config: &FlipConfig, num_shells: usize) -> Result<Self, ConfigError> {
        let arity = if num_shells <= 1 {
            ShellArity::Single
        } else {
            let weight = config.weight.ok_or(ConfigError::MissingParameter("weight"))?;
            ShellArity::Multi { num_shells, weight }
        };
        Ok(Self {
            criterion: config.criterion,
            order: config.order,
            arity,
        })
    }

    /// Weight of each per-shell cost term (`w / S`). One for a single shell.
    pub fn shell_weight(&self) -> f64 {
        match self.arity {
            ShellArity::Single => 1.0,
            ShellArity::Multi { num_shells, weight } => weight / num_shells as f64,
        }
    }

    /// Weight of the pooled all-shells cost term (`1 − w`). Zero for a single shell,
    /// whose only term is its own cost.
    pub fn pooled_weight(&self) -> f64 {
        match self.arity {
            ShellArity::Single => 0.0,
            ShellArity::Multi { weight, .. } => 1.0 - weight,
        }
    }
}

/// Solver configuration. Kept apart from the model so that model construction stays
/// deterministic and independent of the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    time_limit: Duration,
    verbose: bool,
}

impl SolverSettings {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTimeLimit`] unless `time_limit_secs` is finite and
    /// strictly positive.
    pub fn new(time_limit_secs: f64, verbose: bool) -> Result<Self, ConfigError> {
        if !time_limit_secs.is_finite() || time_limit_secs <= 0.0 {
            return Err(ConfigError::InvalidTimeLimit(time_limit_secs));
        }
        let time_limit = Duration::try_from_secs_f64(time_limit_secs)
            .map_err(|_| ConfigError::InvalidTimeLimit(time_limit_secs))?;
        Ok(Self {
            time_limit,
            verbose,
        })
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Whether solver progress is surfaced. Has no effect on the result.
    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs_f64(DEFAULT_TIME_LIMIT_SECS),
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlipConfig {
    pub criterion: Criterion,
    pub order: i32,
    /// Multi-shell weight `w`; required when more than one shell is flipped.
    pub weight: Option<f64>,
    pub solver: SolverSettings,
}

impl Default for FlipConfig {
    fn default() -> Self {
        Self {
            criterion: Criterion::default(),
            order: DEFAULT_ORDER,
            weight: None,
            solver: SolverSettings::default(),
        }
    }
}

#[derive(Default)]
pub struct FlipConfigBuilder {
    criterion: Option<Criterion>,
    order: Option<i32>,
    weight: Option<f64>,
    time_limit_secs: Option<f64>,
    verbose: Option<bool>,
}

impl FlipConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = Some(criterion);
        self
    }
    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }
    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
    pub fn time_limit_secs(mut self, secs: f64) -> Self {
        self.time_limit_secs = Some(secs);
        self
    }
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    pub fn build(self) -> Result<FlipConfig, ConfigError> {
        let criterion = self
            .criterion
            .ok_or(ConfigError::MissingParameter("criterion"))?;
        let time_limit_secs = self
            .time_limit_secs
            .ok_or(ConfigError::MissingParameter("time_limit"))?;
        let solver = SolverSettings::new(time_limit_secs, self.verbose.unwrap_or(false))?;

        let order = self.order.unwrap_or(DEFAULT_ORDER);
        if order < 1 {
            return Err(ConfigError::InvalidOrder(order));
        }
        if let Some(w) = self.weight {
            if !(0.0..=1.0).contains(&w) {
                return Err(ConfigError::InvalidWeight(w));
            }
        }

        Ok(FlipConfig {
            criterion,
            order,
            weight: self.weight,
            solver,
        })
    }
}
