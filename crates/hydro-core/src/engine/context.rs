use super::error::EngineError;
use super::neighbors::neighbor_pairs;
use super::platform::Platform;
use crate::core::forcefield::bonded::{angle_forces, bond_forces};
use crate::core::forcefield::nonbonded::{direct_space, exclusion_corrections, self_energy};
use crate::core::forcefield::pme::{PmeParameters, PmeSolver};
use crate::core::forcefield::system::ForceFieldSystem;
use crate::core::forcefield::term::EnergyTerm;
use crate::core::models::cell::PeriodicBox;
use crate::core::models::state::State;
use nalgebra::Vector3;
use tracing::debug;

/// Boltzmann constant in kJ/mol/K.
pub const BOLTZMANN: f64 = 0.008_314_462_618;
/// g/mL per amu/nm³.
const AMU_PER_NM3_IN_G_PER_ML: f64 = 1.660_539_066_60e-3;

/// Energy and forces at one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub energy: EnergyTerm,
    /// kJ/mol/nm, one per atom.
    pub forces: Vec<Vector3<f64>>,
}

/// A parameterized system bound to an execution platform.
///
/// The Ewald splitting parameter and PME grid are fixed when the context is created, from
/// the box the simulation starts with.
pub struct Context {
    system: ForceFieldSystem,
    platform: Platform,
    pme: PmeSolver,
}

impl Context {
    pub fn new(system: ForceFieldSystem, platform: Platform, state: &State) -> Result<Self, EngineError> {
        if state.atom_count() != system.atom_count() || !state.is_consistent() {
            return Err(EngineError::Initialization(format!(
                "State holds {} positions and {} velocities for a system of {} atoms",
                state.positions.len(),
                state.velocities.len(),
                system.atom_count()
            )));
        }
        check_cutoff(&system, &state.periodic_box).map_err(EngineError::Initialization)?;

        let parameters = PmeParameters::from_tolerance(
            system.nonbonded.cutoff,
            system.nonbonded.ewald_tolerance,
            &state.periodic_box,
        );
        debug!(
            alpha = parameters.alpha,
            grid = ?parameters.grid,
            platform = platform.name(),
            "Created simulation context"
        );
        Ok(Self {
            system,
            platform,
            pme: PmeSolver::new(parameters),
        })
    }

    pub fn system(&self) -> &ForceFieldSystem {
        &self.system
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn pme_parameters(&self) -> &PmeParameters {
        self.pme.parameters()
    }

    /// Computes the potential energy and forces for a configuration.
    pub fn evaluate(&mut self, positions: &[Vector3<f64>], periodic_box: &PeriodicBox) -> Result<Evaluation, EngineError> {
        check_cutoff(&self.system, periodic_box).map_err(EngineError::Internal)?;
        let n = self.system.atom_count();
        let alpha = self.pme.parameters().alpha;
        let mut forces = vec![Vector3::zeros(); n];

        let system = &self.system;
        let parallel = self.platform.is_parallel();
        let direct = self.platform.install(|| {
            let pairs = neighbor_pairs(system, positions, periodic_box, system.nonbonded.cutoff);
            let mut direct_forces = vec![Vector3::zeros(); n];
            let energies = direct_space(
                system,
                positions,
                periodic_box,
                &pairs,
                alpha,
                parallel,
                &mut direct_forces,
            );
            (energies, direct_forces)
        });
        for (f, d) in forces.iter_mut().zip(&direct.1) {
            *f += d;
        }

        let bond = bond_forces(system, positions, periodic_box, &mut forces);
        let angle = angle_forces(system, positions, periodic_box, &mut forces);
        let reciprocal = self
            .pme
            .compute(positions, &self.system.charges, periodic_box, &mut forces);
        let excluded = exclusion_corrections(&self.system, positions, periodic_box, alpha, &mut forces);
        let self_term = self_energy(&self.system, alpha);
        let dispersion = self.system.nonbonded.dispersion_energy(periodic_box.volume());

        Ok(Evaluation {
            energy: EnergyTerm::new(
                bond,
                angle,
                direct.0.vdw + dispersion,
                direct.0.coulomb + reciprocal + excluded + self_term,
            ),
            forces,
        })
    }

    pub fn potential_energy(&mut self, positions: &[Vector3<f64>], periodic_box: &PeriodicBox) -> Result<f64, EngineError> {
        Ok(self.evaluate(positions, periodic_box)?.energy.total())
    }

    /// Kinetic energy in kJ/mol.
    pub fn kinetic_energy(&self, velocities: &[Vector3<f64>]) -> f64 {
        0.5 * self
            .system
            .masses
            .iter()
            .zip(velocities)
            .map(|(m, v)| m * v.norm_squared())
            .sum::<f64>()
    }

    /// Instantaneous kinetic temperature in K.
    pub fn temperature(&self, velocities: &[Vector3<f64>]) -> f64 {
        let dof = self.system.degrees_of_freedom();
        if dof == 0 {
            return 0.0;
        }
        2.0 * self.kinetic_energy(velocities) / (dof as f64 * BOLTZMANN)
    }

    /// Mass density in g/mL.
    pub fn density(&self, periodic_box: &PeriodicBox) -> f64 {
        self.system.total_mass() * AMU_PER_NM3_IN_G_PER_ML / periodic_box.volume()
    }
}

fn check_cutoff(system: &ForceFieldSystem, periodic_box: &PeriodicBox) -> Result<(), String> {
    let half = 0.5 * periodic_box.min_length();
    if system.nonbonded.cutoff >= half {
        return Err(format!(
            "Nonbonded cutoff {} nm must be less than half the shortest box edge ({} nm)",
            system.nonbonded.cutoff, half
        ));
    }
    Ok(())
}
