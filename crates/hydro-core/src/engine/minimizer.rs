use super::config::MinimizationConfig;
use super::constraints::ConstraintSolver;
use super::context::Context;
use super::error::EngineError;
use crate::core::models::state::State;
use nalgebra::Vector3;
use tracing::{debug, info};

const INITIAL_STEP: f64 = 0.01;
const MIN_STEP: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizationReport {
    pub initial_energy: f64,
    pub final_energy: f64,
    pub iterations: usize,
    /// Largest constraint-projected force at the end, kJ/mol/nm.
    pub max_force: f64,
    pub converged: bool,
}

/// Forces with the components along constrained bonds removed.
fn projected_forces(
    context: &Context,
    constraints: &ConstraintSolver,
    state: &State,
    forces: &[Vector3<f64>],
) -> Result<Vec<Vector3<f64>>, EngineError> {
    let masses = &context.system().masses;
    let mut accelerations: Vec<Vector3<f64>> = forces
        .iter()
        .zip(masses)
        .map(|(f, &m)| if m > 0.0 { f / m } else { Vector3::zeros() })
        .collect();
    constraints.apply_velocities(&state.positions, &mut accelerations, &state.periodic_box)?;
    Ok(accelerations.iter().zip(masses).map(|(a, &m)| a * m).collect())
}

fn largest_norm(vectors: &[Vector3<f64>]) -> f64 {
    vectors.iter().map(|v| v.norm()).fold(0.0, f64::max)
}

/// Steepest descent with an adaptive step: every accepted move grows the step, every
/// uphill move shrinks it. Constraints are enforced after each move.
pub fn minimize(
    context: &mut Context,
    constraints: &ConstraintSolver,
    state: &mut State,
    config: &MinimizationConfig,
) -> Result<MinimizationReport, EngineError> {
    let reference = state.positions.clone();
    constraints.apply_positions(&reference, &mut state.positions, &state.periodic_box)?;

    let mut evaluation = context.evaluate(&state.positions, &state.periodic_box)?;
    let initial_energy = evaluation.energy.total();
    let mut energy = initial_energy;
    let mut forces = projected_forces(context, constraints, state, &evaluation.forces)?;
    let mut max_force = largest_norm(&forces);
    let mut step = INITIAL_STEP;
    let mut iterations = 0;

    info!(energy = initial_energy, max_force, "Starting energy minimization");
    while iterations < config.max_iterations && max_force > config.tolerance && step > MIN_STEP {
        iterations += 1;
        let scale = step / max_force;
        let mut trial: Vec<Vector3<f64>> = state
            .positions
            .iter()
            .zip(&forces)
            .map(|(x, f)| x + f * scale)
            .collect();
        constraints.apply_positions(&state.positions, &mut trial, &state.periodic_box)?;

        let candidate = context.evaluate(&trial, &state.periodic_box)?;
        let candidate_energy = candidate.energy.total();
        if candidate_energy.is_finite() && candidate_energy < energy {
            state.positions = trial;
            energy = candidate_energy;
            evaluation = candidate;
            forces = projected_forces(context, constraints, state, &evaluation.forces)?;
            max_force = largest_norm(&forces);
            step *= 1.2;
        } else {
            step *= 0.2;
        }
        if iterations % 100 == 0 {
            debug!(iterations, energy, max_force, step, "Minimization progress");
        }
    }

    let converged = max_force <= config.tolerance;
    info!(
        iterations,
        energy,
        max_force,
        converged,
        "Energy minimization finished"
    );
    Ok(MinimizationReport {
        initial_energy,
        final_energy: energy,
        iterations,
        max_force,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::parameterization::{SystemConfig, create_system};
    use crate::core::models::builder::WaterBoxBuilder;
    use crate::engine::platform::Platform;

    #[test]
    fn minimization_lowers_energy_and_keeps_constraints() {
        let (topology, mut state) = WaterBoxBuilder::new(3).build().unwrap();
        for (k, p) in state.positions.iter_mut().enumerate().step_by(3) {
            p.x += 0.02 * ((k as f64) * 0.37).sin();
        }
        let config = SystemConfig {
            nonbonded_cutoff: 0.4,
            ..Default::default()
        };
        let system = create_system(&topology, &config).unwrap();
        let constraints = ConstraintSolver::new(&system, 1e-8);
        let mut context = Context::new(system, Platform::reference(), &state).unwrap();

        let report = minimize(
            &mut context,
            &constraints,
            &mut state,
            &MinimizationConfig {
                tolerance: 1.0,
                max_iterations: 50,
            },
        )
        .unwrap();
        assert!(report.iterations > 0);
        assert!(report.final_energy < report.initial_energy);
        assert!(constraints.max_deviation(&state.positions, &state.periodic_box) < 1e-6);
    }

    #[test]
    fn zero_iterations_leaves_positions_on_constraint_surface() {
        let (topology, mut state) = WaterBoxBuilder::new(3).build().unwrap();
        let config = SystemConfig {
            nonbonded_cutoff: 0.4,
            ..Default::default()
        };
        let system = create_system(&topology, &config).unwrap();
        let constraints = ConstraintSolver::new(&system, 1e-8);
        let mut context = Context::new(system, Platform::reference(), &state).unwrap();
        let report = minimize(
            &mut context,
            &constraints,
            &mut state,
            &MinimizationConfig {
                tolerance: 1.0,
                max_iterations: 0,
            },
        )
        .unwrap();
        assert_eq!(report.iterations, 0);
        assert_eq!(report.initial_energy, report.final_energy);
    }
}
