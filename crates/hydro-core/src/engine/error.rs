use thiserror::Error;

use super::config::ConfigError;
use crate::core::forcefield::parameterization::ParameterizationError;
use crate::core::io::dcd::DcdError;
use crate::core::io::inpcrd::InpcrdError;
use crate::core::io::prmtop::PrmtopError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Platform '{name}' is unavailable: {reason}")]
    Platform { name: &'static str, reason: String },

    #[error("No platform could be acquired (tried: {tried})")]
    NoPlatform { tried: String },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("System construction failed: {source}")]
    Parameterization {
        #[from]
        source: ParameterizationError,
    },

    #[error("Failed to read topology: {source}")]
    Topology {
        #[from]
        source: PrmtopError,
    },

    #[error("Failed to read or write coordinates: {source}")]
    Coordinates {
        #[from]
        source: InpcrdError,
    },

    #[error("Trajectory error: {source}")]
    Trajectory {
        #[from]
        source: DcdError,
    },

    #[error("Simulation became unstable in stage '{stage}' at step {step}: {reason}")]
    Instability {
        stage: String,
        step: u64,
        reason: String,
    },

    #[error("Constraint solver failed to converge after {iterations} iterations")]
    Constraints { iterations: usize },

    #[error("Reporter '{reporter}' failed: {message}")]
    Reporter {
        reporter: &'static str,
        message: String,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
