//! # Analysis Module
//!
//! Post-processing of finished trajectories: radial distribution functions, their CSV
//! export and SVG figures.

use crate::engine::config::ConfigError;
use thiserror::Error;

pub mod figures;
pub mod rdf;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Selection '{selection}' matches no atoms")]
    EmptySelection { selection: String },

    #[error("Trajectory contains no frames")]
    NoFrames,

    #[error("Frame {frame} has {found} atoms but the topology has {expected}")]
    AtomCountMismatch {
        frame: usize,
        expected: usize,
        found: usize,
    },

    #[error("Frame {frame} has no usable orthorhombic unit cell")]
    InvalidUnitCell { frame: usize },

    #[error("Invalid histogram: {0}")]
    InvalidRange(String),

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to write '{path}': {message}")]
    Export { path: String, message: String },

    #[error("Plotting failed: {0}")]
    Plot(String),
}
