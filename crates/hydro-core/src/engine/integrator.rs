use super::constraints::ConstraintSolver;
use super::context::{BOLTZMANN, Context};
use super::error::EngineError;
use crate::core::forcefield::term::EnergyTerm;
use crate::core::models::state::State;
use nalgebra::Vector3;
use rand::Rng;
use rand_distr::StandardNormal;

/// Langevin dynamics with the "middle" splitting: a full kick, half a drift, the
/// Ornstein-Uhlenbeck friction/noise update, the second half drift, then constraints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LangevinMiddleIntegrator {
    /// K.
    pub temperature: f64,
    /// 1/ps.
    pub friction: f64,
    /// ps.
    pub timestep: f64,
}

fn gaussian_vector<R: Rng>(rng: &mut R) -> Vector3<f64> {
    Vector3::new(
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
    )
}

impl LangevinMiddleIntegrator {
    /// Advances `state` by one step. `forces` must hold the forces at the current positions
    /// and is replaced by the forces at the new ones; the new potential energy is returned.
    pub fn step<R: Rng>(
        &self,
        context: &mut Context,
        constraints: &ConstraintSolver,
        state: &mut State,
        forces: &mut Vec<Vector3<f64>>,
        rng: &mut R,
    ) -> Result<EnergyTerm, EngineError> {
        let dt = self.timestep;
        let a = (-self.friction * dt).exp();
        let b = (1.0 - a * a).sqrt();
        let kt = BOLTZMANN * self.temperature;
        let masses = &context.system().masses;

        for ((v, f), &m) in state.velocities.iter_mut().zip(forces.iter()).zip(masses) {
            if m > 0.0 {
                *v += f * (dt / m);
            }
        }
        constraints.apply_velocities(&state.positions, &mut state.velocities, &state.periodic_box)?;

        let mut trial: Vec<Vector3<f64>> = state
            .positions
            .iter()
            .zip(&state.velocities)
            .map(|(x, v)| x + v * (0.5 * dt))
            .collect();
        for ((v, &m), x) in state.velocities.iter_mut().zip(masses).zip(trial.iter_mut()) {
            if m > 0.0 {
                *v = *v * a + gaussian_vector(rng) * (b * (kt / m).sqrt());
                *x += *v * (0.5 * dt);
            }
        }

        constraints.apply_positions(&state.positions, &mut trial, &state.periodic_box)?;
        for ((v, x_new), x_old) in state.velocities.iter_mut().zip(&trial).zip(&state.positions) {
            *v = (x_new - x_old) / dt;
        }
        remove_center_of_mass_motion(masses, &mut state.velocities);
        state.positions = trial;
        state.step += 1;
        state.time += dt;

        let evaluation = context.evaluate(&state.positions, &state.periodic_box)?;
        *forces = evaluation.forces;
        Ok(evaluation.energy)
    }
}

/// Subtracts the mass-weighted mean velocity.
pub fn remove_center_of_mass_motion(masses: &[f64], velocities: &mut [Vector3<f64>]) {
    let total_mass: f64 = masses.iter().sum();
    if total_mass <= 0.0 {
        return;
    }
    let momentum: Vector3<f64> = masses.iter().zip(velocities.iter()).map(|(m, v)| v * *m).sum();
    let drift = momentum / total_mass;
    for (v, &m) in velocities.iter_mut().zip(masses) {
        if m > 0.0 {
            *v -= drift;
        }
    }
}

/// Draws velocities from the Maxwell-Boltzmann distribution at `temperature` with zero net
/// momentum. Massless atoms stay at rest.
pub fn maxwell_boltzmann_velocities<R: Rng>(masses: &[f64], temperature: f64, rng: &mut R) -> Vec<Vector3<f64>> {
    let kt = BOLTZMANN * temperature;
    let mut velocities: Vec<Vector3<f64>> = masses
        .iter()
        .map(|&m| {
            if m > 0.0 {
                gaussian_vector(rng) * (kt / m).sqrt()
            } else {
                Vector3::zeros()
            }
        })
        .collect();
    remove_center_of_mass_motion(masses, &mut velocities);
    velocities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::parameterization::{SystemConfig, create_system};
    use crate::core::models::builder::WaterBoxBuilder;
    use crate::engine::platform::Platform;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn maxwell_boltzmann_velocities_have_zero_momentum_and_right_scale() {
        let masses = vec![15.999, 1.008, 1.008].repeat(300);
        let mut rng = StdRng::seed_from_u64(11);
        let velocities = maxwell_boltzmann_velocities(&masses, 300.0, &mut rng);
        let momentum: Vector3<f64> = masses.iter().zip(&velocities).map(|(m, v)| v * *m).sum();
        assert!(momentum.norm() < 1e-9);

        let kinetic: f64 = masses
            .iter()
            .zip(&velocities)
            .map(|(m, v)| 0.5 * m * v.norm_squared())
            .sum();
        let temperature = 2.0 * kinetic / ((3 * masses.len() - 3) as f64 * BOLTZMANN);
        assert!((temperature - 300.0).abs() < 30.0, "temperature {}", temperature);
    }

    #[test]
    fn same_seed_gives_identical_velocities() {
        let masses = vec![16.0, 1.0, 1.0];
        let a = maxwell_boltzmann_velocities(&masses, 300.0, &mut StdRng::seed_from_u64(3));
        let b = maxwell_boltzmann_velocities(&masses, 300.0, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    #[test]
    fn step_keeps_constraints_and_advances_clock() {
        let (topology, mut state) = WaterBoxBuilder::new(3).build().unwrap();
        let config = SystemConfig {
            nonbonded_cutoff: 0.4,
            ..Default::default()
        };
        let system = create_system(&topology, &config).unwrap();
        let constraints = ConstraintSolver::new(&system, 1e-8);
        let mut context = Context::new(system, Platform::reference(), &state).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        constraints
            .apply_positions(&state.positions.clone(), &mut state.positions, &state.periodic_box)
            .unwrap();
        let mut forces = context.evaluate(&state.positions, &state.periodic_box).unwrap().forces;
        let integrator = LangevinMiddleIntegrator {
            temperature: 300.0,
            friction: 1.0,
            timestep: 0.001,
        };
        for _ in 0..5 {
            let energy = integrator
                .step(&mut context, &constraints, &mut state, &mut forces, &mut rng)
                .unwrap();
            assert!(energy.is_finite());
        }
        assert_eq!(state.step, 5);
        assert!((state.time - 0.005).abs() < 1e-12);
        assert!(constraints.max_deviation(&state.positions, &state.periodic_box) < 1e-6);
        assert!(state.is_finite());
    }
}
