use crate::cli::AnalyzeArgs;
use crate::config::build_analyze_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use hydromd::engine::progress::ProgressReporter;
use hydromd::workflows::analyze;
use tracing::info;

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let config = build_analyze_config(&args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Analyzing {}...", config.trajectory_path.display());
    info!("Invoking the analysis workflow...");
    let report = analyze::run(&config, &reporter)?;

    for rdf in &report.rdfs {
        let peak = rdf
            .bins
            .iter()
            .zip(&rdf.rdf)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(r, g)| format!("first maximum g={:.3} at r={:.3} Angstrom", g, r))
            .unwrap_or_default();
        println!("  {:<8} {} frame(s)  {}", rdf.label, rdf.frames, peak);
    }
    println!("RDF table written to: {}", report.table_path.display());
    println!("RDF figure written to: {}", report.figure_path.display());
    Ok(())
}
