use super::{WorkflowError, prepare_output_directory};
use crate::analysis::figures::plot_rdfs;
use crate::analysis::rdf::{RdfResult, compute_rdfs, write_rdf_table};
use crate::core::io::dcd::Trajectory;
use crate::core::io::prmtop::PrmtopFile;
use crate::core::io::traits::MolecularFile;
use crate::core::models::topology::Topology;
use crate::engine::config::{AnalyzeConfig, OutputConfig, RdfConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub rdfs: Vec<RdfResult>,
    pub table_path: PathBuf,
    pub figure_path: PathBuf,
}

#[instrument(skip_all, name = "analysis_workflow")]
pub fn run(config: &AnalyzeConfig, reporter: &ProgressReporter) -> Result<AnalysisReport, WorkflowError> {
    prepare_output_directory(&config.output.directory)?;
    let (topology, _) = PrmtopFile::read_from_path(&config.topology_path).map_err(EngineError::from)?;
    info!(
        atoms = topology.atom_count(),
        trajectory = %config.trajectory_path.display(),
        "Loaded topology for analysis"
    );
    analyze_trajectory(&topology, &config.trajectory_path, &config.rdf, &config.output, reporter)
}

/// RDFs of a finished trajectory, exported as a table and a figure.
pub(crate) fn analyze_trajectory(
    topology: &Topology,
    trajectory: &Path,
    rdf: &RdfConfig,
    output: &OutputConfig,
    reporter: &ProgressReporter,
) -> Result<AnalysisReport, WorkflowError> {
    reporter.report(Progress::PhaseStart {
        name: "Analysis".to_string(),
    });
    let frames = Trajectory::load(trajectory).map_err(EngineError::from)?;
    reporter.report(Progress::Message(format!(
        "Computing {} RDF(s) over {} frame(s)",
        rdf.pairs.len(),
        frames.len()
    )));
    let rdfs = compute_rdfs(topology, &frames, rdf)?;

    let table_path = output.rdf_table_path();
    let figure_path = output.rdf_figure_path();
    write_rdf_table(&table_path, &rdfs)?;
    plot_rdfs(&figure_path, &rdfs)?;
    reporter.report(Progress::PhaseFinish);

    info!(
        table = %table_path.display(),
        figure = %figure_path.display(),
        "Analysis complete"
    );
    Ok(AnalysisReport {
        rdfs,
        table_path,
        figure_path,
    })
}
