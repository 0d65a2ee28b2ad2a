use super::barostat::{MonteCarloBarostat, MoveTarget};
use super::config::{Ensemble, IntegratorConfig, MinimizationConfig, StageConfig};
use super::constraints::ConstraintSolver;
use super::context::Context;
use super::error::EngineError;
use super::integrator::{LangevinMiddleIntegrator, maxwell_boltzmann_velocities};
use super::minimizer::{MinimizationReport, minimize};
use super::progress::{Progress, ProgressReporter};
use super::reporters::{Reporter, Snapshot};
use crate::core::forcefield::term::EnergyTerm;
use crate::core::models::state::State;
use nalgebra::Vector3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

/// Outcome of one stage, taken at its last step.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSummary {
    pub name: String,
    pub ensemble: &'static str,
    pub steps: u64,
    /// Global step counter after the stage.
    pub final_step: u64,
    pub potential_energy: f64,
    pub temperature: f64,
    pub density: f64,
    pub box_volume: f64,
    pub barostat_acceptance: Option<f64>,
}

/// A context, its dynamic state and the random stream driving it.
///
/// Stages run back to back on the same simulation, so each one starts from exactly the
/// state the previous one ended with.
pub struct Simulation {
    context: Context,
    constraints: ConstraintSolver,
    integrator: LangevinMiddleIntegrator,
    state: State,
    forces: Vec<Vector3<f64>>,
    energy: EnergyTerm,
    rng: StdRng,
}

fn instability(stage: &StageConfig, step: u64, reason: String) -> EngineError {
    EngineError::Instability {
        stage: stage.name.clone(),
        step,
        reason,
    }
}

impl Simulation {
    /// Puts the initial positions on the constraint surface and evaluates the first forces.
    pub fn new(mut context: Context, config: &IntegratorConfig, mut state: State) -> Result<Self, EngineError> {
        let constraints = ConstraintSolver::new(context.system(), config.constraint_tolerance);
        let reference = state.positions.clone();
        constraints.apply_positions(&reference, &mut state.positions, &state.periodic_box)?;
        constraints.apply_velocities(&state.positions, &mut state.velocities, &state.periodic_box)?;
        let evaluation = context.evaluate(&state.positions, &state.periodic_box)?;
        debug!(
            constraints = constraints.len(),
            seed = config.seed,
            energy = evaluation.energy.total(),
            "Initialized simulation"
        );
        Ok(Self {
            constraints,
            integrator: LangevinMiddleIntegrator {
                temperature: config.temperature,
                friction: config.friction,
                timestep: config.timestep,
            },
            state,
            forces: evaluation.forces,
            energy: evaluation.energy,
            rng: StdRng::seed_from_u64(config.seed),
            context,
        })
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn into_state(self) -> State {
        self.state
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn energy(&self) -> EnergyTerm {
        self.energy
    }

    pub fn temperature(&self) -> f64 {
        self.context.temperature(&self.state.velocities)
    }

    pub fn density(&self) -> f64 {
        self.context.density(&self.state.periodic_box)
    }

    pub fn minimize(&mut self, config: &MinimizationConfig) -> Result<MinimizationReport, EngineError> {
        let report = minimize(&mut self.context, &self.constraints, &mut self.state, config)?;
        let evaluation = self.context.evaluate(&self.state.positions, &self.state.periodic_box)?;
        self.forces = evaluation.forces;
        self.energy = evaluation.energy;
        Ok(report)
    }

    /// Draws fresh Maxwell-Boltzmann velocities consistent with the constraints.
    pub fn initialize_velocities(&mut self, temperature: f64) -> Result<(), EngineError> {
        let velocities = maxwell_boltzmann_velocities(&self.context.system().masses, temperature, &mut self.rng);
        self.state.velocities = velocities;
        self.constraints
            .apply_velocities(&self.state.positions, &mut self.state.velocities, &self.state.periodic_box)
    }

    fn snapshot<'a>(&'a self, stage: &'a StageConfig) -> Snapshot<'a> {
        Snapshot {
            stage: &stage.name,
            state: &self.state,
            energy: self.energy,
            temperature: self.temperature(),
            density: self.density(),
            timestep: self.integrator.timestep,
        }
    }

    /// Runs `stage.steps` steps, attempting barostat moves in NPT stages and handing
    /// snapshots to every reporter at its interval.
    pub fn run_stage(
        &mut self,
        stage: &StageConfig,
        reporters: &mut [&mut dyn Reporter],
        progress: &ProgressReporter<'_>,
    ) -> Result<StageSummary, EngineError> {
        info!(
            stage = %stage.name,
            ensemble = stage.ensemble.label(),
            steps = stage.steps,
            "Starting stage"
        );
        progress.report(Progress::PhaseStart {
            name: stage.name.clone(),
        });
        progress.report(Progress::TaskStart {
            total_steps: stage.steps,
        });

        for reporter in reporters.iter_mut() {
            reporter.begin_stage(stage);
        }
        let intervals: Vec<Option<u64>> = reporters.iter().map(|r| r.interval(stage)).collect();
        let mut barostat = match stage.ensemble {
            Ensemble::Npt(config) => Some(MonteCarloBarostat::new(
                &config,
                self.integrator.temperature,
                self.state.periodic_box.volume(),
            )),
            Ensemble::Nvt => None,
        };
        let tick = (stage.steps / 100).max(1);
        let mut since_tick = 0;

        for local_step in 1..=stage.steps {
            let global_step = self.state.step + 1;
            self.energy = self
                .integrator
                .step(
                    &mut self.context,
                    &self.constraints,
                    &mut self.state,
                    &mut self.forces,
                    &mut self.rng,
                )
                .map_err(|e| match e {
                    EngineError::Constraints { .. } => instability(stage, global_step, e.to_string()),
                    other => other,
                })?;

            if let Some(barostat) = barostat.as_mut() {
                if local_step % barostat.frequency() == 0 {
                    barostat.attempt(
                        MoveTarget {
                            context: &mut self.context,
                            state: &mut self.state,
                            forces: &mut self.forces,
                            energy: &mut self.energy,
                        },
                        &mut self.rng,
                    )?;
                }
            }

            if !self.energy.is_finite() {
                return Err(instability(stage, global_step, "potential energy is not finite".to_string()));
            }
            if !self.state.is_finite() {
                return Err(instability(stage, global_step, "positions or velocities are not finite".to_string()));
            }

            for (reporter, interval) in reporters.iter_mut().zip(&intervals) {
                if interval.is_some_and(|every| local_step % every == 0) {
                    let snapshot = self.snapshot(stage);
                    reporter.report(&snapshot)?;
                }
            }

            since_tick += 1;
            if local_step % tick == 0 || local_step == stage.steps {
                progress.report(Progress::TaskIncrement { steps: since_tick });
                progress.report(Progress::Status {
                    step: self.state.step,
                    temperature: self.temperature(),
                    potential_energy: self.energy.total(),
                });
                since_tick = 0;
            }
        }

        for reporter in reporters.iter_mut() {
            reporter.finish()?;
        }
        progress.report(Progress::TaskFinish);
        progress.report(Progress::PhaseFinish);

        let summary = StageSummary {
            name: stage.name.clone(),
            ensemble: stage.ensemble.label(),
            steps: stage.steps,
            final_step: self.state.step,
            potential_energy: self.energy.total(),
            temperature: self.temperature(),
            density: self.density(),
            box_volume: self.state.periodic_box.volume(),
            barostat_acceptance: barostat.as_ref().and_then(MonteCarloBarostat::acceptance_rate),
        };
        info!(
            stage = %summary.name,
            potential_energy = summary.potential_energy,
            temperature = summary.temperature,
            density = summary.density,
            "Finished stage"
        );
        Ok(summary)
    }
}
