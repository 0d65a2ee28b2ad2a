use hydromd::core::forcefield::parameterization::{SystemConfig, create_system};
use hydromd::core::io::dcd::Trajectory;
use hydromd::core::io::inpcrd::{Coordinates, InpcrdFile, InpcrdMetadata};
use hydromd::core::io::prmtop::{PrmtopFile, PrmtopMetadata};
use hydromd::core::io::traits::MolecularFile;
use hydromd::core::models::builder::WaterBoxBuilder;
use hydromd::engine::config::{
    BarostatConfig, MinimizationConfig, PlatformChoice, RdfConfig, SimulationConfig, SimulationConfigBuilder,
    StageConfig,
};
use hydromd::engine::context::Context;
use hydromd::engine::platform::{
    ParallelProvider, PlatformKind, PlatformProvider, ReferenceProvider, select_platform,
};
use hydromd::engine::progress::ProgressReporter;
use hydromd::workflows::simulate;
use std::path::Path;
use tempfile::tempdir;

fn write_inputs(dir: &Path) {
    let (topology, state) = WaterBoxBuilder::new(3).build().unwrap();
    PrmtopFile::write_to_path(
        &topology,
        &PrmtopMetadata {
            title: "tiny water box".to_string(),
            version: None,
            periodic_box: Some(state.periodic_box),
        },
        dir.join("water.prmtop"),
    )
    .unwrap();
    InpcrdFile::write_to_path(
        &Coordinates {
            positions: state.positions.clone(),
            velocities: None,
            periodic_box: Some(state.periodic_box),
        },
        &InpcrdMetadata {
            title: "tiny water box".to_string(),
            time: None,
        },
        dir.join("water.inpcrd"),
    )
    .unwrap();
}

fn config(dir: &Path, platform: PlatformChoice) -> SimulationConfig {
    let barostat = BarostatConfig {
        pressure: 1.0,
        frequency: 5,
    };
    SimulationConfigBuilder::new()
        .topology_path(dir.join("water.prmtop"))
        .coordinates_path(dir.join("water.inpcrd"))
        .output_directory(dir.join("out"))
        .platform(platform)
        .threads(2)
        .system(SystemConfig {
            nonbonded_cutoff: 0.4,
            ..Default::default()
        })
        .temperature(300.0)
        .friction(1.0)
        .timestep(0.001)
        .seed(2024)
        .minimization(Some(MinimizationConfig {
            tolerance: 10.0,
            max_iterations: 20,
        }))
        .stages(vec![
            StageConfig::nvt("nvt-equilibration", 20).with_report_interval(10),
            StageConfig::npt("npt-equilibration", 20, barostat).with_report_interval(10),
            StageConfig::npt("production", 35, barostat)
                .with_report_interval(10)
                .with_trajectory_interval(10),
        ])
        .rdf(RdfConfig {
            bins: 24,
            r_max: 4.0,
            ..Default::default()
        })
        .build()
        .unwrap()
}

#[test]
fn full_pipeline_writes_every_artifact() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    let config = config(dir.path(), PlatformChoice::Auto);
    let report = simulate::run(&config, &ProgressReporter::new()).unwrap();

    // Stages hand over a state of consistent shape.
    assert_eq!(report.stages.len(), 3);
    assert_eq!(report.stages[2].final_step, 75);
    assert!(report.final_state.is_consistent());
    assert_eq!(report.final_state.atom_count(), 81);

    // floor(35 / 10) production frames.
    assert_eq!(report.trajectory_frames, 3);
    let trajectory = report.trajectory.as_ref().unwrap();
    assert_eq!(Trajectory::load(trajectory).unwrap().len(), 3);

    // One RDF per pair, with the configured bin count.
    let analysis = report.analysis.as_ref().unwrap();
    assert_eq!(analysis.rdfs.len(), 2);
    for rdf in &analysis.rdfs {
        assert_eq!(rdf.rdf.len(), 24);
        assert_eq!(rdf.bins.len(), 24);
        assert!((rdf.edges[24] - 4.0).abs() < 1e-12);
        assert!(rdf.rdf.iter().all(|g| g.is_finite() && *g >= 0.0));
    }

    assert!(analysis.table_path.exists());
    assert!(analysis.figure_path.exists());
    let log = std::fs::read_to_string(config.output.state_log_path()).unwrap();
    assert_eq!(log.lines().count(), 1 + 2 + 2 + 3);

    let restart = report.restart.as_ref().unwrap();
    let (coordinates, metadata) = InpcrdFile::read_from_path(restart).unwrap();
    assert_eq!(coordinates.atom_count(), 81);
    assert!(coordinates.velocities.is_some());
    assert!((metadata.time.unwrap() - 0.075).abs() < 1e-6);
}

#[test]
fn unavailable_parallel_platform_falls_back_to_reference() {
    let (topology, state) = WaterBoxBuilder::new(3).build().unwrap();
    let providers: Vec<Box<dyn PlatformProvider>> = vec![
        Box::new(ParallelProvider { threads: Some(0) }),
        Box::new(ReferenceProvider),
    ];
    let platform = select_platform(&providers).unwrap();
    assert_eq!(platform.kind(), PlatformKind::Reference);

    let system = create_system(
        &topology,
        &SystemConfig {
            nonbonded_cutoff: 0.4,
            ..Default::default()
        },
    )
    .unwrap();
    let mut context = Context::new(system, platform, &state).unwrap();
    let energy = context
        .potential_energy(&state.positions, &state.periodic_box)
        .unwrap();
    assert!(energy.is_finite());
}
