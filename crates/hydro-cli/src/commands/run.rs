use crate::cli::RunArgs;
use crate::config::PartialRunConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use hydromd::engine::progress::ProgressReporter;
use hydromd::workflows::simulate::{self, SimulationReport};
use tracing::{info, warn};

pub fn run(args: RunArgs, threads: Option<usize>) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialRunConfig::from_file(path)?,
        None => {
            info!("No configuration file given; using defaults and command-line values.");
            PartialRunConfig::default()
        }
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args, threads)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Simulating {} ({} stage(s), seed {})...",
        config.topology_path.display(),
        config.stages.len(),
        config.integrator.seed
    );
    info!("Invoking the simulation workflow...");
    let report = simulate::run(&config, &reporter)?;

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &SimulationReport) {
    println!("Platform: {}", report.platform);

    if let Some(minimization) = &report.minimization {
        println!(
            "Minimization: {:.2} -> {:.2} kJ/mol in {} iteration(s)",
            minimization.initial_energy, minimization.final_energy, minimization.iterations
        );
        if !minimization.converged {
            warn!("Minimization did not converge (max force {:.3} kJ/mol/nm).", minimization.max_force);
        }
    }

    for stage in &report.stages {
        let acceptance = stage
            .barostat_acceptance
            .map(|rate| format!("  barostat acceptance {:.0}%", rate * 100.0))
            .unwrap_or_default();
        println!(
            "  {:<20} {} {:>8} steps  E={:.2} kJ/mol  T={:.1} K  rho={:.4} g/mL{}",
            stage.name,
            stage.ensemble,
            stage.steps,
            stage.potential_energy,
            stage.temperature,
            stage.density,
            acceptance
        );
    }

    match &report.trajectory {
        Some(path) => println!("Trajectory ({} frames) written to: {}", report.trajectory_frames, path.display()),
        None => println!("No trajectory was written."),
    }
    if let Some(path) = &report.restart {
        println!("Restart coordinates written to: {}", path.display());
    }
    if let Some(analysis) = &report.analysis {
        println!("RDF table written to: {}", analysis.table_path.display());
        println!("RDF figure written to: {}", analysis.figure_path.display());
    }
}
