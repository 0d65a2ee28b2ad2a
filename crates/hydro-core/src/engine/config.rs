use crate::core::models::atom::Element;
use crate::core::models::topology::AtomSelection;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub use crate::core::forcefield::parameterization::{ConstraintMode, SystemConfig};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

fn require_positive(parameter: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            parameter,
            reason: format!("must be positive and finite (got {})", value),
        })
    }
}

fn require_nonzero(parameter: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        Err(ConfigError::InvalidValue {
            parameter,
            reason: "must be at least 1".to_string(),
        })
    } else {
        Ok(value)
    }
}

/// Which execution platform to run the force kernels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlatformChoice {
    /// Parallel if available, otherwise reference.
    #[default]
    Auto,
    Parallel,
    Reference,
}

impl FromStr for PlatformChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "parallel" | "cpu" => Ok(Self::Parallel),
            "reference" => Ok(Self::Reference),
            _ => Err(ConfigError::InvalidValue {
                parameter: "platform",
                reason: format!("unknown platform '{}' (expected auto, parallel or reference)", s),
            }),
        }
    }
}

impl fmt::Display for PlatformChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Parallel => write!(f, "parallel"),
            Self::Reference => write!(f, "reference"),
        }
    }
}

/// Langevin integrator settings shared by every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratorConfig {
    /// Bath temperature in K.
    pub temperature: f64,
    /// Friction coefficient in 1/ps.
    pub friction: f64,
    /// Timestep in ps.
    pub timestep: f64,
    /// Seed of the single random stream used for velocities, noise and barostat moves.
    pub seed: u64,
    /// Relative tolerance of the constraint solver.
    pub constraint_tolerance: f64,
}

impl IntegratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("temperature", self.temperature)?;
        require_positive("timestep", self.timestep)?;
        require_positive("constraint_tolerance", self.constraint_tolerance)?;
        if !(self.friction.is_finite() && self.friction >= 0.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "friction",
                reason: format!("must be non-negative (got {})", self.friction),
            });
        }
        Ok(())
    }
}

/// Monte Carlo barostat settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarostatConfig {
    /// Target pressure in bar.
    pub pressure: f64,
    /// Steps between volume moves.
    pub frequency: u64,
}

impl Default for BarostatConfig {
    fn default() -> Self {
        Self {
            pressure: 1.0,
            frequency: 25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizationConfig {
    /// Stop once the largest force falls below this value, in kJ/mol/nm.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for MinimizationConfig {
    fn default() -> Self {
        Self {
            tolerance: 10.0,
            max_iterations: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ensemble {
    Nvt,
    Npt(BarostatConfig),
}

impl Ensemble {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Nvt => "NVT",
            Self::Npt(_) => "NPT",
        }
    }
}

/// One block of dynamics. Stages run in order, each starting from the state the previous
/// one ended with.
#[derive(Debug, Clone, PartialEq)]
pub struct StageConfig {
    pub name: String,
    pub steps: u64,
    pub ensemble: Ensemble,
    /// Steps between state-log rows.
    pub report_interval: u64,
    /// Steps between trajectory frames, or no trajectory for this stage.
    pub trajectory_interval: Option<u64>,
}

impl StageConfig {
    pub fn nvt(name: &str, steps: u64) -> Self {
        Self {
            name: name.to_string(),
            steps,
            ensemble: Ensemble::Nvt,
            report_interval: 1000,
            trajectory_interval: None,
        }
    }

    pub fn npt(name: &str, steps: u64, barostat: BarostatConfig) -> Self {
        Self {
            ensemble: Ensemble::Npt(barostat),
            ..Self::nvt(name, steps)
        }
    }

    pub fn with_report_interval(mut self, interval: u64) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn with_trajectory_interval(mut self, interval: u64) -> Self {
        self.trajectory_interval = Some(interval);
        self
    }

    /// Number of frames this stage writes: one every `trajectory_interval` steps.
    pub fn expected_frames(&self) -> u64 {
        self.trajectory_interval.map_or(0, |interval| self.steps / interval)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                parameter: "stage.name",
                reason: "must not be empty".to_string(),
            });
        }
        require_nonzero("stage.report_interval", self.report_interval)?;
        if let Some(interval) = self.trajectory_interval {
            require_nonzero("stage.trajectory_interval", interval)?;
        }
        if let Ensemble::Npt(barostat) = self.ensemble {
            require_positive("barostat.pressure", barostat.pressure)?;
            require_nonzero("barostat.frequency", barostat.frequency)?;
        }
        Ok(())
    }
}

/// Heat-up at constant volume, density equilibration at 1 bar, then production.
pub fn default_stages() -> Vec<StageConfig> {
    vec![
        StageConfig::nvt("nvt-equilibration", 5_000),
        StageConfig::npt("npt-equilibration", 5_000, BarostatConfig::default()),
        StageConfig::nvt("production", 25_000).with_trajectory_interval(250),
    ]
}

/// Two atom groups whose radial distribution function is computed.
#[derive(Debug, Clone, PartialEq)]
pub struct RdfPairConfig {
    pub label: String,
    pub reference: AtomSelection,
    pub target: AtomSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RdfConfig {
    pub pairs: Vec<RdfPairConfig>,
    pub bins: usize,
    /// Histogram range in Å.
    pub r_min: f64,
    pub r_max: f64,
    /// Skip pairs inside the same residue.
    pub exclude_same_residue: bool,
}

impl Default for RdfConfig {
    fn default() -> Self {
        Self {
            pairs: vec![
                RdfPairConfig {
                    label: "O-O".to_string(),
                    reference: AtomSelection::Element(Element::Oxygen),
                    target: AtomSelection::Element(Element::Oxygen),
                },
                RdfPairConfig {
                    label: "O-H".to_string(),
                    reference: AtomSelection::Element(Element::Oxygen),
                    target: AtomSelection::Element(Element::Hydrogen),
                },
            ],
            bins: 200,
            r_min: 0.0,
            r_max: 8.0,
            exclude_same_residue: true,
        }
    }
}

impl RdfConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pairs.is_empty() {
            return Err(ConfigError::MissingParameter("rdf.pairs"));
        }
        if self.bins == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "rdf.bins",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.r_min.is_finite() && self.r_max.is_finite() && self.r_min >= 0.0 && self.r_max > self.r_min) {
            return Err(ConfigError::InvalidValue {
                parameter: "rdf.range",
                reason: format!("need 0 <= r_min < r_max (got {}..{})", self.r_min, self.r_max),
            });
        }
        Ok(())
    }
}

/// File names of every artifact, relative to `directory`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub state_log: PathBuf,
    pub trajectory: PathBuf,
    pub restart: Option<PathBuf>,
    pub rdf_table: PathBuf,
    pub rdf_figure: PathBuf,
}

impl OutputConfig {
    pub fn in_directory<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            state_log: PathBuf::from("state.csv"),
            trajectory: PathBuf::from("trajectory.dcd"),
            restart: Some(PathBuf::from("final.rst7")),
            rdf_table: PathBuf::from("rdf.csv"),
            rdf_figure: PathBuf::from("rdf.svg"),
        }
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        self.directory.join(file)
    }

    pub fn state_log_path(&self) -> PathBuf {
        self.resolve(&self.state_log)
    }

    pub fn trajectory_path(&self) -> PathBuf {
        self.resolve(&self.trajectory)
    }

    pub fn restart_path(&self) -> Option<PathBuf> {
        self.restart.as_deref().map(|file| self.resolve(file))
    }

    pub fn rdf_table_path(&self) -> PathBuf {
        self.resolve(&self.rdf_table)
    }

    pub fn rdf_figure_path(&self) -> PathBuf {
        self.resolve(&self.rdf_figure)
    }
}

/// Everything the full pipeline needs: inputs, physics, stages and outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub topology_path: PathBuf,
    pub coordinates_path: PathBuf,
    pub platform: PlatformChoice,
    /// Worker threads of the parallel platform; `None` uses one per core.
    pub threads: Option<usize>,
    pub system: SystemConfig,
    pub integrator: IntegratorConfig,
    pub minimization: Option<MinimizationConfig>,
    pub stages: Vec<StageConfig>,
    pub output: OutputConfig,
    pub rdf: RdfConfig,
}

impl SimulationConfig {
    /// The stage whose frames are analysed: the last one that writes a trajectory.
    pub fn trajectory_stage(&self) -> Option<&StageConfig> {
        self.trajectory_stage_index().map(|k| &self.stages[k])
    }

    pub fn trajectory_stage_index(&self) -> Option<usize> {
        self.stages.iter().rposition(|stage| stage.trajectory_interval.is_some())
    }
}

#[derive(Default)]
pub struct SimulationConfigBuilder {
    topology_path: Option<PathBuf>,
    coordinates_path: Option<PathBuf>,
    output_directory: Option<PathBuf>,
    platform: Option<PlatformChoice>,
    threads: Option<usize>,
    system: Option<SystemConfig>,
    temperature: Option<f64>,
    friction: Option<f64>,
    timestep: Option<f64>,
    seed: Option<u64>,
    constraint_tolerance: Option<f64>,
    minimization: Option<Option<MinimizationConfig>>,
    stages: Option<Vec<StageConfig>>,
    rdf: Option<RdfConfig>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topology_path(mut self, path: PathBuf) -> Self {
        self.topology_path = Some(path);
        self
    }
    pub fn coordinates_path(mut self, path: PathBuf) -> Self {
        self.coordinates_path = Some(path);
        self
    }
    pub fn output_directory(mut self, path: PathBuf) -> Self {
        self.output_directory = Some(path);
        self
    }
    pub fn platform(mut self, platform: PlatformChoice) -> Self {
        self.platform = Some(platform);
        self
    }
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
    pub fn system(mut self, system: SystemConfig) -> Self {
        self.system = Some(system);
        self
    }
    pub fn temperature(mut self, kelvin: f64) -> Self {
        self.temperature = Some(kelvin);
        self
    }
    pub fn friction(mut self, per_ps: f64) -> Self {
        self.friction = Some(per_ps);
        self
    }
    pub fn timestep(mut self, ps: f64) -> Self {
        self.timestep = Some(ps);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn constraint_tolerance(mut self, tolerance: f64) -> Self {
        self.constraint_tolerance = Some(tolerance);
        self
    }
    pub fn minimization(mut self, minimization: Option<MinimizationConfig>) -> Self {
        self.minimization = Some(minimization);
        self
    }
    pub fn stages(mut self, stages: Vec<StageConfig>) -> Self {
        self.stages = Some(stages);
        self
    }
    pub fn rdf(mut self, rdf: RdfConfig) -> Self {
        self.rdf = Some(rdf);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let integrator = IntegratorConfig {
            temperature: self
                .temperature
                .ok_or(ConfigError::MissingParameter("temperature"))?,
            friction: self.friction.ok_or(ConfigError::MissingParameter("friction"))?,
            timestep: self.timestep.ok_or(ConfigError::MissingParameter("timestep"))?,
            seed: self.seed.unwrap_or_else(rand::random),
            constraint_tolerance: self.constraint_tolerance.unwrap_or(1e-5),
        };
        integrator.validate()?;

        let stages = self.stages.ok_or(ConfigError::MissingParameter("stages"))?;
        if stages.is_empty() {
            return Err(ConfigError::MissingParameter("stages"));
        }
        for (k, stage) in stages.iter().enumerate() {
            stage.validate()?;
            if stages[..k].iter().any(|earlier| earlier.name == stage.name) {
                return Err(ConfigError::InvalidValue {
                    parameter: "stages",
                    reason: format!("stage name '{}' is used more than once", stage.name),
                });
            }
        }
        if self.threads == Some(0) {
            return Err(ConfigError::InvalidValue {
                parameter: "threads",
                reason: "must be at least 1".to_string(),
            });
        }

        let rdf = self.rdf.unwrap_or_default();
        rdf.validate()?;

        Ok(SimulationConfig {
            topology_path: self
                .topology_path
                .ok_or(ConfigError::MissingParameter("topology_path"))?,
            coordinates_path: self
                .coordinates_path
                .ok_or(ConfigError::MissingParameter("coordinates_path"))?,
            platform: self.platform.unwrap_or_default(),
            threads: self.threads,
            system: self.system.unwrap_or_default(),
            integrator,
            minimization: self
                .minimization
                .unwrap_or(Some(MinimizationConfig::default())),
            stages,
            output: OutputConfig::in_directory(
                self.output_directory
                    .ok_or(ConfigError::MissingParameter("output_directory"))?,
            ),
            rdf,
        })
    }
}

/// RDF analysis of an existing trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeConfig {
    pub topology_path: PathBuf,
    pub trajectory_path: PathBuf,
    pub output: OutputConfig,
    pub rdf: RdfConfig,
}

#[derive(Default)]
pub struct AnalyzeConfigBuilder {
    topology_path: Option<PathBuf>,
    trajectory_path: Option<PathBuf>,
    output_directory: Option<PathBuf>,
    rdf: Option<RdfConfig>,
}

impl AnalyzeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topology_path(mut self, path: PathBuf) -> Self {
        self.topology_path = Some(path);
        self
    }
    pub fn trajectory_path(mut self, path: PathBuf) -> Self {
        self.trajectory_path = Some(path);
        self
    }
    pub fn output_directory(mut self, path: PathBuf) -> Self {
        self.output_directory = Some(path);
        self
    }
    pub fn rdf(mut self, rdf: RdfConfig) -> Self {
        self.rdf = Some(rdf);
        self
    }

    pub fn build(self) -> Result<AnalyzeConfig, ConfigError> {
        let rdf = self.rdf.unwrap_or_default();
        rdf.validate()?;
        Ok(AnalyzeConfig {
            topology_path: self
                .topology_path
                .ok_or(ConfigError::MissingParameter("topology_path"))?,
            trajectory_path: self
                .trajectory_path
                .ok_or(ConfigError::MissingParameter("trajectory_path"))?,
            output: OutputConfig::in_directory(
                self.output_directory
                    .ok_or(ConfigError::MissingParameter("output_directory"))?,
            ),
            rdf,
        })
    }
}
