use super::potentials::{ewald_exclusion_correction, ewald_real_space, ewald_self_energy, lennard_jones_12_6};
use super::system::ForceFieldSystem;
use crate::core::models::cell::PeriodicBox;
use nalgebra::Vector3;
use rayon::prelude::*;

/// Direct-space energies from a pair evaluation, in kJ/mol.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PairEnergies {
    pub vdw: f64,
    pub coulomb: f64,
}

type Accumulator = (Vec<Vector3<f64>>, PairEnergies);

#[inline]
fn pair_contribution(
    system: &ForceFieldSystem,
    positions: &[Vector3<f64>],
    periodic_box: &PeriodicBox,
    alpha: f64,
    cutoff2: f64,
    i: usize,
    j: usize,
    acc: &mut Accumulator,
) {
    let delta = periodic_box.minimum_image(positions[i] - positions[j]);
    let r2 = delta.norm_squared();
    if r2 >= cutoff2 {
        return;
    }
    let r = r2.sqrt();
    let (a, b) = system
        .lennard_jones
        .coefficients(system.lj_types[i], system.lj_types[j]);
    let mut f_over_r = 0.0;
    if a != 0.0 || b != 0.0 {
        let (energy, f) = lennard_jones_12_6(r, a, b);
        acc.1.vdw += energy;
        f_over_r += f;
    }
    let qq = system.charges[i] * system.charges[j];
    if qq != 0.0 {
        let (energy, f) = ewald_real_space(r, qq, alpha);
        acc.1.coulomb += energy;
        f_over_r += f;
    }
    let force = delta * f_over_r;
    acc.0[i] += force;
    acc.0[j] -= force;
}

/// Lennard-Jones and real-space Ewald interactions over a list of non-excluded pairs.
///
/// With `parallel` set the pairs are split across the current rayon pool, each worker
/// accumulating into its own force buffer before the buffers are summed.
pub fn direct_space(
    system: &ForceFieldSystem,
    positions: &[Vector3<f64>],
    periodic_box: &PeriodicBox,
    pairs: &[(usize, usize)],
    alpha: f64,
    parallel: bool,
    forces: &mut [Vector3<f64>],
) -> PairEnergies {
    let n = positions.len();
    let cutoff2 = system.nonbonded.cutoff * system.nonbonded.cutoff;
    let empty = || (vec![Vector3::zeros(); n], PairEnergies::default());

    let (pair_forces, energies) = if parallel {
        pairs
            .par_iter()
            .fold(empty, |mut acc, &(i, j)| {
                pair_contribution(system, positions, periodic_box, alpha, cutoff2, i, j, &mut acc);
                acc
            })
            .reduce(empty, |(mut fa, ea), (fb, eb)| {
                for (a, b) in fa.iter_mut().zip(&fb) {
                    *a += b;
                }
                (
                    fa,
                    PairEnergies {
                        vdw: ea.vdw + eb.vdw,
                        coulomb: ea.coulomb + eb.coulomb,
                    },
                )
            })
    } else {
        let mut acc = empty();
        for &(i, j) in pairs {
            pair_contribution(system, positions, periodic_box, alpha, cutoff2, i, j, &mut acc);
        }
        acc
    };

    for (f, pf) in forces.iter_mut().zip(&pair_forces) {
        *f += pf;
    }
    energies
}

/// Removes the reciprocal-space interaction between excluded pairs. Returns the energy.
pub fn exclusion_corrections(
    system: &ForceFieldSystem,
    positions: &[Vector3<f64>],
    periodic_box: &PeriodicBox,
    alpha: f64,
    forces: &mut [Vector3<f64>],
) -> f64 {
    let mut energy = 0.0;
    for (i, j) in system.excluded_pairs() {
        let qq = system.charges[i] * system.charges[j];
        if qq == 0.0 {
            continue;
        }
        let delta = periodic_box.minimum_image(positions[i] - positions[j]);
        let (e, f_over_r) = ewald_exclusion_correction(delta.norm(), qq, alpha);
        energy += e;
        let force = delta * f_over_r;
        forces[i] += force;
        forces[j] -= force;
    }
    energy
}

/// Position-independent Ewald self energy.
pub fn self_energy(system: &ForceFieldSystem, alpha: f64) -> f64 {
    ewald_self_energy(&system.charges, alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::parameterization::{SystemConfig, create_system};
    use crate::core::models::builder::WaterBoxBuilder;

    fn all_pairs(system: &ForceFieldSystem) -> Vec<(usize, usize)> {
        let n = system.atom_count();
        (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .filter(|&(i, j)| !system.is_excluded(i, j))
            .collect()
    }

    #[test]
    fn parallel_and_serial_direct_space_agree() {
        let (topology, state) = WaterBoxBuilder::new(3).build().unwrap();
        let config = SystemConfig {
            nonbonded_cutoff: 0.4,
            ..Default::default()
        };
        let system = create_system(&topology, &config).unwrap();
        let pairs = all_pairs(&system);

        let mut serial = vec![Vector3::zeros(); system.atom_count()];
        let mut parallel = vec![Vector3::zeros(); system.atom_count()];
        let e1 = direct_space(&system, &state.positions, &state.periodic_box, &pairs, 3.0, false, &mut serial);
        let e2 = direct_space(&system, &state.positions, &state.periodic_box, &pairs, 3.0, true, &mut parallel);

        assert!((e1.vdw - e2.vdw).abs() < 1e-9 * e1.vdw.abs().max(1.0));
        assert!((e1.coulomb - e2.coulomb).abs() < 1e-9 * e1.coulomb.abs().max(1.0));
        for (a, b) in serial.iter().zip(&parallel) {
            assert!((a - b).norm() < 1e-8);
        }
    }

    #[test]
    fn direct_space_forces_obey_newtons_third_law() {
        let (topology, state) = WaterBoxBuilder::new(2).build().unwrap();
        let config = SystemConfig {
            nonbonded_cutoff: 0.3,
            ..Default::default()
        };
        let system = create_system(&topology, &config).unwrap();
        let mut forces = vec![Vector3::zeros(); system.atom_count()];
        direct_space(
            &system,
            &state.positions,
            &state.periodic_box,
            &all_pairs(&system),
            3.0,
            false,
            &mut forces,
        );
        let net: Vector3<f64> = forces.iter().sum();
        assert!(net.norm() < 1e-9);
    }

    #[test]
    fn exclusion_corrections_for_water_are_dominated_by_oh_pairs() {
        let (topology, state) = WaterBoxBuilder::new(1).build().unwrap();
        let system = create_system(&topology, &SystemConfig::default()).unwrap();
        let mut forces = vec![Vector3::zeros(); 3];
        let energy = exclusion_corrections(&system, &state.positions, &state.periodic_box, 3.0, &mut forces);
        // O-H pairs dominate: -k·(q_O·q_H)·erf/r is positive
        assert!(energy > 0.0);
        let net: Vector3<f64> = forces.iter().sum();
        assert!(net.norm() < 1e-9);
    }

    #[test]
    fn self_energy_is_negative() {
        let (topology, _) = WaterBoxBuilder::new(1).build().unwrap();
        let system = create_system(&topology, &SystemConfig::default()).unwrap();
        assert!(self_energy(&system, 3.0) < 0.0);
    }
}
