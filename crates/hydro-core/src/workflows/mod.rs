//! # Workflows Module
//!
//! End-to-end procedures built from the `core`, `engine` and `analysis` layers.
//!
//! - [`simulate`] loads Amber inputs, picks a platform, minimizes, runs the configured
//!   stages and analyses the production trajectory.
//! - [`analyze`] computes radial distribution functions from an existing trajectory.
//!
//! Both report progress through [`ProgressReporter`](crate::engine::progress::ProgressReporter)
//! and write every artifact into the configured output directory.

use crate::analysis::AnalysisError;
use crate::engine::error::EngineError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod analyze;
pub mod simulate;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Cannot prepare output directory '{path}': {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn prepare_output_directory(directory: &Path) -> Result<(), WorkflowError> {
    std::fs::create_dir_all(directory).map_err(|source| WorkflowError::OutputDirectory {
        path: directory.to_path_buf(),
        source,
    })
}
