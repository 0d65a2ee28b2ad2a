use super::analyze::{AnalysisReport, analyze_trajectory};
use super::{WorkflowError, prepare_output_directory};
use crate::core::forcefield::parameterization::create_system;
use crate::core::io::inpcrd::{Coordinates, InpcrdFile, InpcrdMetadata};
use crate::core::io::prmtop::PrmtopFile;
use crate::core::io::traits::MolecularFile;
use crate::core::models::state::State;
use crate::core::models::topology::Topology;
use crate::engine::config::SimulationConfig;
use crate::engine::context::Context;
use crate::engine::error::EngineError;
use crate::engine::minimizer::MinimizationReport;
use crate::engine::platform::{providers_for, select_platform};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::reporters::{Reporter, StateLogReporter, TrajectoryReporter};
use crate::engine::simulation::{Simulation, StageSummary};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub platform: &'static str,
    pub minimization: Option<MinimizationReport>,
    pub stages: Vec<StageSummary>,
    pub trajectory: Option<PathBuf>,
    pub trajectory_frames: usize,
    pub restart: Option<PathBuf>,
    /// `None` when no stage wrote a trajectory.
    pub analysis: Option<AnalysisReport>,
    pub final_state: State,
}

/// Reads the topology and coordinates and checks that they describe the same atoms.
pub fn load_inputs(config: &SimulationConfig) -> Result<(Topology, State), EngineError> {
    let (topology, metadata) = PrmtopFile::read_from_path(&config.topology_path)?;
    let (coordinates, _) = InpcrdFile::read_from_path(&config.coordinates_path)?;
    coordinates.check_atom_count(topology.atom_count())?;
    let state = coordinates.into_state(metadata.periodic_box)?;
    info!(
        atoms = topology.atom_count(),
        residues = topology.residue_count(),
        volume = state.periodic_box.volume(),
        "Loaded inputs"
    );
    Ok((topology, state))
}

#[instrument(skip_all, name = "simulation_workflow")]
pub fn run(config: &SimulationConfig, reporter: &ProgressReporter) -> Result<SimulationReport, WorkflowError> {
    // === Phase 0: Inputs, platform and system ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation".to_string(),
    });
    prepare_output_directory(&config.output.directory)?;
    let (topology, state) = load_inputs(config)?;
    let platform = select_platform(&providers_for(config.platform, config.threads))?;
    let platform_name = platform.name();
    let system = create_system(&topology, &config.system).map_err(EngineError::from)?;
    let context = Context::new(system, platform, &state)?;
    let mut simulation = Simulation::new(context, &config.integrator, state)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Energy minimization ===
    let minimization = match &config.minimization {
        Some(settings) => {
            reporter.report(Progress::PhaseStart {
                name: "Minimization".to_string(),
            });
            let report = simulation.minimize(settings)?;
            if !report.converged {
                warn!(
                    max_force = report.max_force,
                    tolerance = settings.tolerance,
                    "Minimization stopped before reaching the force tolerance"
                );
            }
            reporter.report(Progress::PhaseFinish);
            Some(report)
        }
        None => None,
    };
    simulation.initialize_velocities(config.integrator.temperature)?;

    // === Phase 2: Equilibration and production stages ===
    let mut state_log = StateLogReporter::create(config.output.state_log_path())?;
    let trajectory_stage = config.trajectory_stage_index();
    let mut trajectory = TrajectoryReporter::new(config.output.trajectory_path());
    let mut stages = Vec::with_capacity(config.stages.len());
    for (index, stage) in config.stages.iter().enumerate() {
        let summary = {
            let mut reporters: Vec<&mut dyn Reporter> = Vec::with_capacity(2);
            reporters.push(&mut state_log);
            if trajectory_stage == Some(index) {
                reporters.push(&mut trajectory);
            }
            simulation.run_stage(stage, &mut reporters, reporter)?
        };
        stages.push(summary);
    }
    let trajectory_frames = trajectory.frame_count();
    let trajectory_path = (trajectory_frames > 0).then(|| trajectory.path().to_path_buf());
    drop(trajectory);

    // === Phase 3: Restart file ===
    let final_state = simulation.into_state();
    let restart = match config.output.restart_path() {
        Some(path) => {
            InpcrdFile::write_to_path(
                &Coordinates::from_state(&final_state),
                &InpcrdMetadata {
                    title: "hydromd restart".to_string(),
                    time: Some(final_state.time),
                },
                &path,
            )
            .map_err(EngineError::from)?;
            info!(path = %path.display(), "Wrote restart file");
            Some(path)
        }
        None => None,
    };

    // === Phase 4: Trajectory analysis ===
    let analysis = match &trajectory_path {
        Some(path) => Some(analyze_trajectory(&topology, path, &config.rdf, &config.output, reporter)?),
        None => {
            info!("No stage wrote a trajectory; skipping RDF analysis");
            None
        }
    };

    info!(
        platform = platform_name,
        stages = stages.len(),
        frames = trajectory_frames,
        "Simulation workflow complete"
    );
    Ok(SimulationReport {
        platform: platform_name,
        minimization,
        stages,
        trajectory: trajectory_path,
        trajectory_frames,
        restart,
        analysis,
        final_state,
    })
}
