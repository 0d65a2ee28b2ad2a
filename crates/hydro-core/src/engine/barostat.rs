use super::config::BarostatConfig;
use super::context::{BOLTZMANN, Context};
use super::error::EngineError;
use crate::core::forcefield::term::EnergyTerm;
use crate::core::models::state::State;
use nalgebra::Vector3;
use rand::Rng;
use tracing::trace;

/// kJ/mol/nm³ per bar.
pub const BAR_TO_KJ_PER_MOL_NM3: f64 = 0.060_221_407_6;

const INITIAL_VOLUME_FRACTION: f64 = 0.01;
const MAX_VOLUME_FRACTION: f64 = 0.3;
const ADAPT_EVERY: usize = 10;

/// Isotropic Monte Carlo barostat acting on molecule centres.
#[derive(Debug, Clone)]
pub struct MonteCarloBarostat {
    /// Target pressure in kJ/mol/nm³.
    pressure: f64,
    temperature: f64,
    frequency: u64,
    /// Maximum volume change of a trial move, in nm³.
    volume_scale: f64,
    attempted: usize,
    accepted: usize,
    total_attempted: usize,
    total_accepted: usize,
}

/// Mutable pieces of a running simulation a volume move touches.
pub struct MoveTarget<'a> {
    pub context: &'a mut Context,
    pub state: &'a mut State,
    pub forces: &'a mut Vec<Vector3<f64>>,
    pub energy: &'a mut EnergyTerm,
}

impl MonteCarloBarostat {
    pub fn new(config: &BarostatConfig, temperature: f64, initial_volume: f64) -> Self {
        Self {
            pressure: config.pressure * BAR_TO_KJ_PER_MOL_NM3,
            temperature,
            frequency: config.frequency,
            volume_scale: INITIAL_VOLUME_FRACTION * initial_volume,
            attempted: 0,
            accepted: 0,
            total_attempted: 0,
            total_accepted: 0,
        }
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn volume_scale(&self) -> f64 {
        self.volume_scale
    }

    /// Fraction of accepted moves over the barostat's lifetime.
    pub fn acceptance_rate(&self) -> Option<f64> {
        (self.total_attempted > 0).then(|| self.total_accepted as f64 / self.total_attempted as f64)
    }

    /// Attempts one volume move. On acceptance the state, forces and energy describe the
    /// scaled system; on rejection they are untouched.
    pub fn attempt<R: Rng>(&mut self, target: MoveTarget<'_>, rng: &mut R) -> Result<bool, EngineError> {
        let MoveTarget {
            context,
            state,
            forces,
            energy,
        } = target;
        let kt = BOLTZMANN * self.temperature;
        let old_box = state.periodic_box;
        let old_volume = old_box.volume();
        let delta_volume = self.volume_scale * 2.0 * (rng.r#gen::<f64>() - 0.5);
        let new_volume = old_volume + delta_volume;
        let draw = rng.r#gen::<f64>();

        let new_box = match old_box.scaled_by_volume(new_volume / old_volume) {
            Ok(b) if 2.0 * context.system().nonbonded.cutoff < b.min_length() => Some(b),
            _ => None,
        };

        let accepted = match new_box {
            Some(new_box) => {
                let length_scale = (new_volume / old_volume).cbrt();
                let mut positions = state.positions.clone();
                for molecule in &context.system().molecules {
                    let centre: Vector3<f64> =
                        molecule.iter().map(|&i| state.positions[i]).sum::<Vector3<f64>>() / molecule.len() as f64;
                    let shift = centre * (length_scale - 1.0);
                    for &i in molecule {
                        positions[i] += shift;
                    }
                }
                let molecule_count = context.system().molecules.len() as f64;
                let evaluation = context.evaluate(&positions, &new_box)?;
                let w = evaluation.energy.total() - energy.total() + self.pressure * delta_volume
                    - molecule_count * kt * (new_volume / old_volume).ln();
                let accept = w <= 0.0 || draw < (-w / kt).exp();
                trace!(delta_volume, w, accept, "Barostat volume move");
                if accept {
                    state.positions = positions;
                    state.periodic_box = new_box;
                    *forces = evaluation.forces;
                    *energy = evaluation.energy;
                }
                accept
            }
            None => false,
        };

        self.record(accepted, state.periodic_box.volume());
        Ok(accepted)
    }

    fn record(&mut self, accepted: bool, volume: f64) {
        self.attempted += 1;
        self.total_attempted += 1;
        if accepted {
            self.accepted += 1;
            self.total_accepted += 1;
        }
        if self.attempted >= ADAPT_EVERY {
            let rate = self.accepted as f64 / self.attempted as f64;
            if rate < 0.25 {
                self.volume_scale /= 1.1;
            } else if rate > 0.75 {
                self.volume_scale = (self.volume_scale * 1.1).min(MAX_VOLUME_FRACTION * volume);
            }
            self.attempted = 0;
            self.accepted = 0;
        }
    }
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
    fn volume_scale_adapts_to_acceptance() {
        let config = BarostatConfig::default();
        let mut barostat = MonteCarloBarostat::new(&config, 300.0, 10.0);
        assert!((barostat.volume_scale() - 0.1).abs() < 1e-12);
        for _ in 0..10 {
            barostat.record(false, 10.0);
        }
        assert!((barostat.volume_scale() - 0.1 / 1.1).abs() < 1e-12);
        for _ in 0..10 {
            barostat.record(true, 10.0);
        }
        assert!((barostat.volume_scale() - 0.1).abs() < 1e-12);
        assert_eq!(barostat.acceptance_rate(), Some(0.5));
    }

    #[test]
    fn accepted_moves_keep_molecules_rigid() {
        let (topology, state) = WaterBoxBuilder::new(3).build().unwrap();
        let config = SystemConfig {
            nonbonded_cutoff: 0.4,
            ..Default::default()
        };
        let system = create_system(&topology, &config).unwrap();
        let mut context = Context::new(system, Platform::reference(), &state).unwrap();
        let mut state = state;
        let evaluation = context.evaluate(&state.positions, &state.periodic_box).unwrap();
        let mut forces = evaluation.forces;
        let mut energy = evaluation.energy;
        let mut barostat = MonteCarloBarostat::new(&BarostatConfig::default(), 300.0, state.periodic_box.volume());
        let mut rng = StdRng::seed_from_u64(1);

        let oh = |s: &State| (s.positions[0] - s.positions[1]).norm();
        let bond_before = oh(&state);
        let mut any_accepted = false;
        for _ in 0..20 {
            let volume_before = state.periodic_box.volume();
            let accepted = barostat
                .attempt(
                    MoveTarget {
                        context: &mut context,
                        state: &mut state,
                        forces: &mut forces,
                        energy: &mut energy,
                    },
                    &mut rng,
                )
                .unwrap();
            if accepted {
                any_accepted = true;
            } else {
                assert_eq!(state.periodic_box.volume(), volume_before);
            }
            assert!((oh(&state) - bond_before).abs() < 1e-12);
        }
        assert!(any_accepted);
        assert_eq!(barostat.acceptance_rate().map(|r| r > 0.0), Some(true));
    }
}
