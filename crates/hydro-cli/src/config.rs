mod defaults;

use crate::cli::{AnalyzeArgs, RunArgs};
use crate::error::{CliError, Result};
use defaults::DefaultsConfig;
use hydromd::core::models::topology::AtomSelection;
use hydromd::engine::config::{
    self as core_config, AnalyzeConfig, AnalyzeConfigBuilder, BarostatConfig, ConstraintMode, Ensemble,
    MinimizationConfig, PlatformChoice, RdfConfig, RdfPairConfig, SimulationConfig, SimulationConfigBuilder,
    StageConfig, SystemConfig,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialInputsConfig {
    topology: Option<PathBuf>,
    coordinates: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialOutputConfig {
    directory: Option<PathBuf>,
    state_log: Option<PathBuf>,
    trajectory: Option<PathBuf>,
    restart: Option<PathBuf>,
    write_restart: Option<bool>,
    rdf_table: Option<PathBuf>,
    rdf_figure: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialSystemConfig {
    nonbonded_cutoff: Option<f64>,
    ewald_error_tolerance: Option<f64>,
    constraints: Option<String>,
    rigid_water: Option<bool>,
    dispersion_correction: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialIntegratorConfig {
    temperature: Option<f64>,
    friction: Option<f64>,
    timestep: Option<f64>,
    seed: Option<u64>,
    constraint_tolerance: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialMinimizationConfig {
    enabled: Option<bool>,
    tolerance: Option<f64>,
    max_iterations: Option<usize>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialStageConfig {
    name: String,
    steps: u64,
    ensemble: Option<String>,
    report_interval: Option<u64>,
    trajectory_interval: Option<u64>,
    pressure: Option<f64>,
    barostat_frequency: Option<u64>,
}

impl From<&StageConfig> for PartialStageConfig {
    fn from(stage: &StageConfig) -> Self {
        let (ensemble, pressure, barostat_frequency) = match stage.ensemble {
            Ensemble::Nvt => ("nvt", None, None),
            Ensemble::Npt(barostat) => ("npt", Some(barostat.pressure), Some(barostat.frequency)),
        };
        Self {
            name: stage.name.clone(),
            steps: stage.steps,
            ensemble: Some(ensemble.to_string()),
            report_interval: Some(stage.report_interval),
            trajectory_interval: stage.trajectory_interval,
            pressure,
            barostat_frequency,
        }
    }
}

impl PartialStageConfig {
    fn into_stage(self) -> Result<StageConfig> {
        let ensemble = self.ensemble.as_deref().unwrap_or("nvt").to_lowercase();
        let mut stage = match ensemble.as_str() {
            "nvt" => {
                if self.pressure.is_some() || self.barostat_frequency.is_some() {
                    return Err(CliError::Config(format!(
                        "Stage '{}' is NVT but sets barostat parameters",
                        self.name
                    )));
                }
                StageConfig::nvt(&self.name, self.steps)
            }
            "npt" => {
                let defaults = BarostatConfig::default();
                StageConfig::npt(
                    &self.name,
                    self.steps,
                    BarostatConfig {
                        pressure: self.pressure.unwrap_or(defaults.pressure),
                        frequency: self.barostat_frequency.unwrap_or(defaults.frequency),
                    },
                )
            }
            other => {
                return Err(CliError::Config(format!(
                    "Unknown ensemble '{}' for stage '{}' (expected nvt or npt)",
                    other, self.name
                )));
            }
        };
        if let Some(interval) = self.report_interval {
            stage = stage.with_report_interval(interval);
        }
        if let Some(interval) = self.trajectory_interval {
            stage = stage.with_trajectory_interval(interval);
        }
        Ok(stage)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialRdfPairConfig {
    label: String,
    reference: String,
    target: String,
}

impl PartialRdfPairConfig {
    fn into_pair(self) -> Result<RdfPairConfig> {
        let parse = |selection: &str| {
            AtomSelection::from_str(selection).map_err(|e| {
                CliError::Config(format!("Invalid selection '{}' in RDF pair '{}': {}", selection, self.label, e))
            })
        };
        Ok(RdfPairConfig {
            reference: parse(&self.reference)?,
            target: parse(&self.target)?,
            label: self.label.clone(),
        })
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialRdfConfig {
    bins: Option<usize>,
    r_min: Option<f64>,
    r_max: Option<f64>,
    exclude_same_residue: Option<bool>,
    pairs: Option<Vec<PartialRdfPairConfig>>,
}

impl PartialRdfConfig {
    fn merge(self) -> Result<RdfConfig> {
        let defaults = RdfConfig::default();
        let pairs = match self.pairs {
            Some(pairs) => pairs
                .into_iter()
                .map(PartialRdfPairConfig::into_pair)
                .collect::<Result<Vec<_>>>()?,
            None => defaults.pairs,
        };
        Ok(RdfConfig {
            pairs,
            bins: self.bins.unwrap_or(defaults.bins),
            r_min: self.r_min.unwrap_or(defaults.r_min),
            r_max: self.r_max.unwrap_or(defaults.r_max),
            exclude_same_residue: self.exclude_same_residue.unwrap_or(defaults.exclude_same_residue),
        })
    }
}

/// The `run` configuration as written in a TOML file. Every field is optional; missing
/// values come from the command line or the built-in defaults.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialRunConfig {
    inputs: Option<PartialInputsConfig>,
    output: Option<PartialOutputConfig>,
    platform: Option<String>,
    system: Option<PartialSystemConfig>,
    integrator: Option<PartialIntegratorConfig>,
    minimization: Option<PartialMinimizationConfig>,
    stages: Option<Vec<PartialStageConfig>>,
    rdf: Option<PartialRdfConfig>,
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Merges command-line arguments (highest priority), `-S` values, the file and the
    /// defaults into a validated simulation configuration.
    pub fn merge_with_cli(mut self, args: &RunArgs, threads: Option<usize>) -> Result<SimulationConfig> {
        self.apply_set_values(&args.set_values)?;
        let defaults = DefaultsConfig::default();

        let inputs = self.inputs.take().unwrap_or_default();
        let output = self.output.take().unwrap_or_default();
        let integrator = self.integrator.take().unwrap_or_default();
        let minimization = self.minimization.take().unwrap_or_default();

        let topology_path = args
            .topology
            .clone()
            .or(inputs.topology)
            .unwrap_or_else(|| PathBuf::from(&defaults.topology));
        let coordinates_path = args
            .coordinates
            .clone()
            .or(inputs.coordinates)
            .unwrap_or_else(|| PathBuf::from(&defaults.coordinates));
        let output_directory = args
            .output_dir
            .clone()
            .or(output.directory.clone())
            .unwrap_or_else(|| PathBuf::from(&defaults.output_directory));

        let platform_name = args
            .platform
            .clone()
            .or(self.platform.take())
            .unwrap_or(defaults.platform);
        let platform = PlatformChoice::from_str(&platform_name)?;

        let system = Self::merge_system(self.system.take())?;
        let mut stages = match self.stages.take() {
            Some(stages) => stages
                .into_iter()
                .map(PartialStageConfig::into_stage)
                .collect::<Result<Vec<_>>>()?,
            None => core_config::default_stages(),
        };
        if let Some(steps) = args.production_steps {
            let last = stages
                .last_mut()
                .ok_or_else(|| CliError::Config("At least one stage is required".to_string()))?;
            last.steps = steps;
        }

        let minimization = if args.no_minimize || minimization.enabled == Some(false) {
            None
        } else {
            let defaults = MinimizationConfig::default();
            Some(MinimizationConfig {
                tolerance: minimization.tolerance.unwrap_or(defaults.tolerance),
                max_iterations: minimization.max_iterations.unwrap_or(defaults.max_iterations),
            })
        };

        let rdf = self.rdf.take().unwrap_or_default().merge()?;

        let mut builder = SimulationConfigBuilder::new()
            .topology_path(topology_path)
            .coordinates_path(coordinates_path)
            .output_directory(output_directory)
            .platform(platform)
            .system(system)
            .temperature(integrator.temperature.unwrap_or(defaults.temperature))
            .friction(integrator.friction.unwrap_or(defaults.friction))
            .timestep(integrator.timestep.unwrap_or(defaults.timestep))
            .minimization(minimization)
            .stages(stages)
            .rdf(rdf);
        if let Some(seed) = args.seed.or(integrator.seed) {
            builder = builder.seed(seed);
        }
        if let Some(tolerance) = integrator.constraint_tolerance {
            builder = builder.constraint_tolerance(tolerance);
        }
        if let Some(threads) = threads {
            builder = builder.threads(threads);
        }

        let mut config = builder.build()?;
        Self::merge_output_files(&mut config, output);
        Ok(config)
    }

    fn merge_system(partial: Option<PartialSystemConfig>) -> Result<SystemConfig> {
        let partial = partial.unwrap_or_default();
        let defaults = SystemConfig::default();
        let constraints = match partial.constraints {
            Some(mode) => ConstraintMode::from_str(&mode).map_err(CliError::Config)?,
            None => defaults.constraints,
        };
        Ok(SystemConfig {
            nonbonded_cutoff: partial.nonbonded_cutoff.unwrap_or(defaults.nonbonded_cutoff),
            ewald_error_tolerance: partial.ewald_error_tolerance.unwrap_or(defaults.ewald_error_tolerance),
            constraints,
            rigid_water: partial.rigid_water.unwrap_or(defaults.rigid_water),
            dispersion_correction: partial.dispersion_correction.unwrap_or(defaults.dispersion_correction),
        })
    }

    fn merge_output_files(config: &mut SimulationConfig, partial: PartialOutputConfig) {
        let output = &mut config.output;
        if let Some(file) = partial.state_log {
            output.state_log = file;
        }
        if let Some(file) = partial.trajectory {
            output.trajectory = file;
        }
        if let Some(file) = partial.restart {
            output.restart = Some(file);
        }
        if partial.write_restart == Some(false) {
            output.restart = None;
        }
        if let Some(file) = partial.rdf_table {
            output.rdf_table = file;
        }
        if let Some(file) = partial.rdf_figure {
            output.rdf_figure = file;
        }
    }

    fn stage_mut(&mut self, name: &str, key: &str) -> Result<&mut PartialStageConfig> {
        let stages = self
            .stages
            .get_or_insert_with(|| core_config::default_stages().iter().map(PartialStageConfig::from).collect());
        stages
            .iter_mut()
            .find(|stage| stage.name == name)
            .ok_or_else(|| CliError::Config(format!("Unknown stage '{}' in --set key '{}'", name, key)))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let key = key.trim();

            match key.split('.').collect::<Vec<_>>().as_slice() {
                ["platform"] => self.platform = Some(value.trim().to_string()),
                ["inputs", "topology"] => {
                    self.inputs.get_or_insert_with(Default::default).topology = Some(PathBuf::from(value.trim()))
                }
                ["inputs", "coordinates"] => {
                    self.inputs.get_or_insert_with(Default::default).coordinates = Some(PathBuf::from(value.trim()))
                }
                ["output", "directory"] => {
                    self.output.get_or_insert_with(Default::default).directory = Some(PathBuf::from(value.trim()))
                }
                ["output", "write-restart"] => {
                    self.output.get_or_insert_with(Default::default).write_restart = Some(parse_value(key, value)?)
                }
                ["integrator", field] => {
                    let integrator = self.integrator.get_or_insert_with(Default::default);
                    match *field {
                        "temperature" => integrator.temperature = Some(parse_value(key, value)?),
                        "friction" => integrator.friction = Some(parse_value(key, value)?),
                        "timestep" => integrator.timestep = Some(parse_value(key, value)?),
                        "seed" => integrator.seed = Some(parse_value(key, value)?),
                        "constraint-tolerance" => integrator.constraint_tolerance = Some(parse_value(key, value)?),
                        _ => return Err(unsupported(key)),
                    }
                }
                ["system", field] => {
                    let system = self.system.get_or_insert_with(Default::default);
                    match *field {
                        "nonbonded-cutoff" => system.nonbonded_cutoff = Some(parse_value(key, value)?),
                        "ewald-error-tolerance" => system.ewald_error_tolerance = Some(parse_value(key, value)?),
                        "constraints" => system.constraints = Some(value.trim().to_string()),
                        "rigid-water" => system.rigid_water = Some(parse_value(key, value)?),
                        "dispersion-correction" => system.dispersion_correction = Some(parse_value(key, value)?),
                        _ => return Err(unsupported(key)),
                    }
                }
                ["minimization", field] => {
                    let minimization = self.minimization.get_or_insert_with(Default::default);
                    match *field {
                        "enabled" => minimization.enabled = Some(parse_value(key, value)?),
                        "tolerance" => minimization.tolerance = Some(parse_value(key, value)?),
                        "max-iterations" => minimization.max_iterations = Some(parse_value(key, value)?),
                        _ => return Err(unsupported(key)),
                    }
                }
                ["rdf", field] => {
                    let rdf = self.rdf.get_or_insert_with(Default::default);
                    match *field {
                        "bins" => rdf.bins = Some(parse_value(key, value)?),
                        "r-min" => rdf.r_min = Some(parse_value(key, value)?),
                        "r-max" => rdf.r_max = Some(parse_value(key, value)?),
                        "exclude-same-residue" => rdf.exclude_same_residue = Some(parse_value(key, value)?),
                        _ => return Err(unsupported(key)),
                    }
                }
                ["stages", name, field] => {
                    let stage = self.stage_mut(name, key)?;
                    match *field {
                        "steps" => stage.steps = parse_value(key, value)?,
                        "report-interval" => stage.report_interval = Some(parse_value(key, value)?),
                        "trajectory-interval" => stage.trajectory_interval = Some(parse_value(key, value)?),
                        "pressure" => stage.pressure = Some(parse_value(key, value)?),
                        "barostat-frequency" => stage.barostat_frequency = Some(parse_value(key, value)?),
                        _ => return Err(unsupported(key)),
                    }
                }
                _ => return Err(unsupported(key)),
            }
        }
        Ok(())
    }
}

fn unsupported(key: &str) -> CliError {
    CliError::Config(format!("Unsupported configuration key for --set: '{}'", key))
}

/// Builds the analysis configuration from the `analyze` arguments.
pub fn build_analyze_config(args: &AnalyzeArgs) -> Result<AnalyzeConfig> {
    let defaults = RdfConfig::default();
    let rdf = RdfConfig {
        bins: args.bins.unwrap_or(defaults.bins),
        r_max: args.r_max.unwrap_or(defaults.r_max),
        exclude_same_residue: !args.include_same_residue,
        ..defaults
    };
    let config = AnalyzeConfigBuilder::new()
        .topology_path(args.topology.clone())
        .trajectory_path(args.trajectory.clone())
        .output_directory(args.output_dir.clone())
        .rdf(rdf)
        .build()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::fs;
    use tempfile::TempDir;

    const EXAMPLE_CONFIG: &str = r#"
        platform = "reference"

        [inputs]
        topology = "systems/tip3p.prmtop"
        coordinates = "systems/tip3p.inpcrd"

        [output]
        directory = "results"
        trajectory = "prod.dcd"
        write-restart = false

        [system]
        nonbonded-cutoff = 0.9
        constraints = "hbonds"

        [integrator]
        temperature = 310.0
        timestep = 0.001
        seed = 7

        [minimization]
        max-iterations = 200

        [[stages]]
        name = "heat"
        steps = 1000
        report-interval = 100

        [[stages]]
        name = "density"
        steps = 2000
        ensemble = "npt"
        pressure = 1.5

        [[stages]]
        name = "production"
        steps = 4000
        trajectory-interval = 400

        [rdf]
        bins = 120
        r-max = 10.0

        [[rdf.pairs]]
        label = "O-O"
        reference = "name O"
        target = "name O"
        "#;

    static CONFIG_DIR: Lazy<TempDir> = Lazy::new(|| {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join("run.toml"), EXAMPLE_CONFIG).expect("write config");
        dir
    });

    fn example_file() -> PathBuf {
        CONFIG_DIR.path().join("run.toml")
    }

    #[test]
    fn defaults_apply_without_file_or_arguments() {
        let config = PartialRunConfig::default()
            .merge_with_cli(&RunArgs::default(), None)
            .unwrap();
        assert_eq!(config.topology_path, PathBuf::from("inputs/water.prmtop"));
        assert_eq!(config.coordinates_path, PathBuf::from("inputs/water.inpcrd"));
        assert_eq!(config.output.directory, PathBuf::from("output"));
        assert_eq!(config.platform, PlatformChoice::Auto);
        assert_eq!(config.stages, core_config::default_stages());
        assert_eq!(config.integrator.temperature, 300.0);
        assert!(config.minimization.is_some());
        assert_eq!(config.rdf, RdfConfig::default());
    }

    #[test]
    fn file_values_are_merged() {
        let config = PartialRunConfig::from_file(&example_file())
            .unwrap()
            .merge_with_cli(&RunArgs::default(), Some(4))
            .unwrap();
        assert_eq!(config.platform, PlatformChoice::Reference);
        assert_eq!(config.threads, Some(4));
        assert_eq!(config.topology_path, PathBuf::from("systems/tip3p.prmtop"));
        assert_eq!(config.output.trajectory_path(), PathBuf::from("results/prod.dcd"));
        assert_eq!(config.output.restart, None);
        assert_eq!(config.system.nonbonded_cutoff, 0.9);
        assert_eq!(config.integrator.seed, 7);
        assert_eq!(config.minimization.map(|m| m.max_iterations), Some(200));

        assert_eq!(config.stages.len(), 3);
        assert_eq!(config.stages[0].report_interval, 100);
        assert_eq!(
            config.stages[1].ensemble,
            Ensemble::Npt(BarostatConfig {
                pressure: 1.5,
                frequency: 25
            })
        );
        assert_eq!(config.trajectory_stage().map(|s| s.name.as_str()), Some("production"));
        assert_eq!(config.rdf.bins, 120);
        assert_eq!(config.rdf.pairs.len(), 1);
        assert_eq!(config.rdf.pairs[0].reference, AtomSelection::Name("O".to_string()));
    }

    #[test]
    fn cli_arguments_override_file_values() {
        let args = RunArgs {
            topology: Some(PathBuf::from("other.prmtop")),
            platform: Some("parallel".to_string()),
            seed: Some(99),
            production_steps: Some(10),
            no_minimize: true,
            ..Default::default()
        };
        let config = PartialRunConfig::from_file(&example_file())
            .unwrap()
            .merge_with_cli(&args, None)
            .unwrap();
        assert_eq!(config.topology_path, PathBuf::from("other.prmtop"));
        assert_eq!(config.platform, PlatformChoice::Parallel);
        assert_eq!(config.integrator.seed, 99);
        assert_eq!(config.stages[2].steps, 10);
        assert!(config.minimization.is_none());
    }

    #[test]
    fn set_values_override_file_and_default_stages() {
        let args = RunArgs {
            set_values: vec![
                "integrator.temperature=280".to_string(),
                "rdf.bins=64".to_string(),
                "system.rigid-water=false".to_string(),
                "stages.production.trajectory-interval=50".to_string(),
                "stages.npt-equilibration.barostat-frequency=10".to_string(),
            ],
            ..Default::default()
        };
        let config = PartialRunConfig::default().merge_with_cli(&args, None).unwrap();
        assert_eq!(config.integrator.temperature, 280.0);
        assert_eq!(config.rdf.bins, 64);
        assert!(!config.system.rigid_water);
        assert_eq!(config.stages[2].trajectory_interval, Some(50));
        assert_eq!(
            config.stages[1].ensemble,
            Ensemble::Npt(BarostatConfig {
                pressure: 1.0,
                frequency: 10
            })
        );
    }

    #[test]
    fn invalid_inputs_are_reported() {
        let bad_key = RunArgs {
            set_values: vec!["integrator.colour=blue".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            PartialRunConfig::default().merge_with_cli(&bad_key, None),
            Err(CliError::Config(_))
        ));

        let bad_platform = RunArgs {
            platform: Some("gpu".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            PartialRunConfig::default().merge_with_cli(&bad_platform, None),
            Err(CliError::Config(_))
        ));

        assert!(PartialRunConfig::from_toml("unknown-section = 1").is_err());
        let nvt_with_pressure = PartialRunConfig::from_toml(
            r#"
            [[stages]]
            name = "x"
            steps = 10
            pressure = 1.0
            "#,
        )
        .unwrap();
        assert!(nvt_with_pressure.merge_with_cli(&RunArgs::default(), None).is_err());
    }

    #[test]
    fn analyze_arguments_build_rdf_settings() {
        let args = AnalyzeArgs {
            topology: PathBuf::from("a.prmtop"),
            trajectory: PathBuf::from("t.dcd"),
            output_dir: PathBuf::from("out"),
            bins: Some(50),
            r_max: Some(6.0),
            include_same_residue: true,
        };
        let config = build_analyze_config(&args).unwrap();
        assert_eq!(config.rdf.bins, 50);
        assert_eq!(config.rdf.r_max, 6.0);
        assert!(!config.rdf.exclude_same_residue);
        assert_eq!(config.output.rdf_table_path(), PathBuf::from("out/rdf.csv"));
    }
}
