use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "hydromd developers",
    version,
    about = "hydromd - staged molecular dynamics of water boxes: equilibration, production and radial distribution functions.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of worker threads of the parallel platform and the RDF analysis.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Minimize, equilibrate (NVT then NPT), run production and analyse the trajectory.
    Run(RunArgs),
    /// Compute radial distribution functions from an existing trajectory.
    Analyze(AnalyzeArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Inputs and outputs ---
    /// Amber topology file (.prmtop).
    #[arg(long, value_name = "PATH")]
    pub topology: Option<PathBuf>,

    /// Amber coordinate file (.inpcrd or .rst7).
    #[arg(long, value_name = "PATH")]
    pub coordinates: Option<PathBuf>,

    /// Directory receiving the state log, trajectory, restart and RDF files.
    #[arg(short, long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    // --- Engine overrides ---
    /// Execution platform: auto, parallel or reference.
    #[arg(short, long, value_name = "NAME")]
    pub platform: Option<String>,

    /// Seed of the random stream (velocities, Langevin noise, barostat moves).
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the number of steps of the production stage.
    #[arg(long, value_name = "INT")]
    pub production_steps: Option<u64>,

    /// Skip the energy minimization before the first stage.
    #[arg(long)]
    pub no_minimize: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S integrator.temperature=310
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Amber topology file (.prmtop) matching the trajectory.
    #[arg(long, required = true, value_name = "PATH")]
    pub topology: PathBuf,

    /// DCD trajectory to analyse.
    #[arg(long, required = true, value_name = "PATH")]
    pub trajectory: PathBuf,

    /// Directory receiving rdf.csv and rdf.svg.
    #[arg(short, long = "output-dir", value_name = "DIR", default_value = "analysis")]
    pub output_dir: PathBuf,

    /// Number of histogram bins.
    #[arg(long, value_name = "INT")]
    pub bins: Option<usize>,

    /// Upper end of the histogram range, in Angstrom.
    #[arg(long, value_name = "FLOAT")]
    pub r_max: Option<f64>,

    /// Count pairs inside the same residue as well.
    #[arg(long)]
    pub include_same_residue: bool,
}
