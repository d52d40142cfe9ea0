use super::config::ConfigError;
use crate::core::models::mask::MaskLengthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("No shells were provided")]
    NoShells,

    #[error("Shell {shell} contains no directions")]
    EmptyScheme { shell: usize },

    #[error(transparent)]
    MaskLength(#[from] MaskLengthError),

    #[error("Solver reported that no feasible flip assignment exists")]
    Infeasible,

    #[error("Internal logic error: {0}")]
    Internal(String),
}
