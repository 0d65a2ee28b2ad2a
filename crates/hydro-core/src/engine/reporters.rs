use super::config::StageConfig;
use super::error::EngineError;
use crate::core::forcefield::term::EnergyTerm;
use crate::core::io::dcd::{Frame, Trajectory, UnitCell};
use crate::core::models::state::State;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const NM_TO_ANGSTROM: f64 = 10.0;

/// What a reporter sees at a reporting step.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub stage: &'a str,
    pub state: &'a State,
    pub energy: EnergyTerm,
    pub temperature: f64,
    /// g/mL.
    pub density: f64,
    /// Integration timestep in ps.
    pub timestep: f64,
}

/// Periodic observer of a running stage.
pub trait Reporter {
    fn name(&self) -> &'static str;

    /// Steps between reports during `stage`, or `None` to stay silent for it.
    fn interval(&self, stage: &StageConfig) -> Option<u64>;

    /// Called once before the first step of every stage.
    fn begin_stage(&mut self, _stage: &StageConfig) {}

    fn report(&mut self, snapshot: &Snapshot<'_>) -> Result<(), EngineError>;

    fn finish(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StateRow<'a> {
    #[serde(rename = "Stage")]
    stage: &'a str,
    #[serde(rename = "Step")]
    step: u64,
    #[serde(rename = "Time (ps)")]
    time: f64,
    #[serde(rename = "Potential Energy (kJ/mole)")]
    potential_energy: f64,
    #[serde(rename = "Temperature (K)")]
    temperature: f64,
    #[serde(rename = "Density (g/mL)")]
    density: f64,
    #[serde(rename = "Box Volume (nm^3)")]
    box_volume: f64,
}

/// Writes one CSV row of thermodynamic data every `report_interval` steps of every stage.
pub struct StateLogReporter<W: Write> {
    writer: csv::Writer<W>,
}

impl StateLogReporter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let file = File::create(path.as_ref()).map_err(|e| EngineError::Reporter {
            reporter: "state-log",
            message: format!("cannot create '{}': {}", path.as_ref().display(), e),
        })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> StateLogReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }

    pub fn into_inner(self) -> Result<W, EngineError> {
        self.writer.into_inner().map_err(|e| EngineError::Reporter {
            reporter: "state-log",
            message: e.to_string(),
        })
    }

    fn failure(e: impl std::fmt::Display) -> EngineError {
        EngineError::Reporter {
            reporter: "state-log",
            message: e.to_string(),
        }
    }
}

impl<W: Write> Reporter for StateLogReporter<W> {
    fn name(&self) -> &'static str {
        "state-log"
    }

    fn interval(&self, stage: &StageConfig) -> Option<u64> {
        Some(stage.report_interval)
    }

    fn report(&mut self, snapshot: &Snapshot<'_>) -> Result<(), EngineError> {
        self.writer
            .serialize(StateRow {
                stage: snapshot.stage,
                step: snapshot.state.step,
                time: snapshot.state.time,
                potential_energy: snapshot.energy.total(),
                temperature: snapshot.temperature,
                density: snapshot.density,
                box_volume: snapshot.state.periodic_box.volume(),
            })
            .map_err(Self::failure)?;
        self.writer.flush().map_err(Self::failure)
    }

    fn finish(&mut self) -> Result<(), EngineError> {
        self.writer.flush().map_err(Self::failure)
    }
}

/// Collects positions for stages that request a trajectory and saves them as DCD.
///
/// The file is rewritten at the end of every stage that added frames, so a run that stops
/// in a later stage still leaves the frames of the finished ones on disk.
pub struct TrajectoryReporter {
    path: PathBuf,
    trajectory: Trajectory,
    saved_frames: usize,
}

impl TrajectoryReporter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            trajectory: Trajectory::new(),
            saved_frames: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frame_count(&self) -> usize {
        self.trajectory.len()
    }
}

impl Reporter for TrajectoryReporter {
    fn name(&self) -> &'static str {
        "trajectory"
    }

    fn interval(&self, stage: &StageConfig) -> Option<u64> {
        stage.trajectory_interval
    }

    fn report(&mut self, snapshot: &Snapshot<'_>) -> Result<(), EngineError> {
        let state = snapshot.state;
        let lengths = state.periodic_box.lengths() * NM_TO_ANGSTROM;
        self.trajectory.push(Frame {
            time: state.time,
            positions: state.positions.iter().map(|p| p * NM_TO_ANGSTROM).collect(),
            unit_cell: Some(UnitCell::orthorhombic(lengths.x, lengths.y, lengths.z)),
        })?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EngineError> {
        if self.trajectory.len() > self.saved_frames {
            self.trajectory.save(&self.path)?;
            self.saved_frames = self.trajectory.len();
        }
        Ok(())
    }
}
