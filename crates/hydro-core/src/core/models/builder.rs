use super::atom::{Atom, Element};
use super::cell::{InvalidBoxError, PeriodicBox};
use super::state::State;
use super::topology::{Topology, TopologyError};
use crate::core::forcefield::params::{AngleType, BondType, ForceFieldParameters, LennardJonesTable};
use nalgebra::Vector3;
use thiserror::Error;

// TIP3P geometry and parameters, in nm, radians, kJ/mol.
const TIP3P_OH: f64 = 0.09572;
const TIP3P_HH: f64 = 0.15136;
const TIP3P_HOH: f64 = 104.52 * std::f64::consts::PI / 180.0;
const TIP3P_SIGMA_O: f64 = 0.315_075_240_3;
const TIP3P_EPSILON_O: f64 = 0.635_968;
const TIP3P_CHARGE_O: f64 = -0.834;
const TIP3P_CHARGE_H: f64 = 0.417;
const TIP3P_BOND_K: f64 = 462_750.4;
const TIP3P_ANGLE_K: f64 = 836.8;

const MASS_O: f64 = 15.9994;
const MASS_H: f64 = 1.008;

/// Lattice spacing giving roughly 1 g/mL for a cubic arrangement of water molecules.
const DEFAULT_SPACING: f64 = 0.3104;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("A water box needs at least one molecule per side")]
    Empty,
    #[error("Lattice spacing {0} nm is too small for a water molecule")]
    SpacingTooSmall(f64),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Box(#[from] InvalidBoxError),
}

/// Builds a cubic lattice of rigid TIP3P water molecules in a periodic box.
///
/// Intended for small self-contained systems (tests, quick benchmarks); real inputs come
/// from Amber topology and coordinate files.
#[derive(Debug, Clone)]
pub struct WaterBoxBuilder {
    molecules_per_side: usize,
    spacing: f64,
    residue_name: String,
}

impl WaterBoxBuilder {
    pub fn new(molecules_per_side: usize) -> Self {
        Self {
            molecules_per_side,
            spacing: DEFAULT_SPACING,
            residue_name: "WAT".to_string(),
        }
    }

    pub fn spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn residue_name(mut self, name: &str) -> Self {
        self.residue_name = name.to_string();
        self
    }

    pub fn build(&self) -> Result<(Topology, State), BuildError> {
        let n = self.molecules_per_side;
        if n == 0 {
            return Err(BuildError::Empty);
        }
        if self.spacing <= TIP3P_HH {
            return Err(BuildError::SpacingTooSmall(self.spacing));
        }

        let parameters = ForceFieldParameters {
            bond_types: vec![
                BondType {
                    k: TIP3P_BOND_K,
                    r0: TIP3P_OH,
                },
                BondType {
                    k: TIP3P_BOND_K,
                    r0: TIP3P_HH,
                },
            ],
            angle_types: vec![AngleType {
                k: TIP3P_ANGLE_K,
                theta0: TIP3P_HOH,
            }],
            lennard_jones: LennardJonesTable::from_sigma_epsilon(&[
                (TIP3P_SIGMA_O, TIP3P_EPSILON_O),
                (0.0, 0.0),
            ]),
        };
        let mut topology = Topology::new(parameters);

        let half = 0.5 * TIP3P_HOH;
        let h1_offset = Vector3::new(TIP3P_OH * half.sin(), TIP3P_OH * half.cos(), 0.0);
        let h2_offset = Vector3::new(-TIP3P_OH * half.sin(), TIP3P_OH * half.cos(), 0.0);
        let origin = Vector3::new(0.25, 0.25, 0.25) * self.spacing;

        let mut positions = Vec::with_capacity(3 * n * n * n);
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let first = topology.atom_count();
                    topology.add_residue(&self.residue_name, water_atoms());
                    topology.add_bond(first, first + 1, 0)?;
                    topology.add_bond(first, first + 2, 0)?;
                    topology.add_bond(first + 1, first + 2, 1)?;
                    topology.add_angle(first + 1, first, first + 2, 0)?;

                    let oxygen = origin + Vector3::new(i as f64, j as f64, k as f64) * self.spacing;
                    positions.push(oxygen);
                    positions.push(oxygen + h1_offset);
                    positions.push(oxygen + h2_offset);
                }
            }
        }

        let periodic_box = PeriodicBox::cubic(n as f64 * self.spacing)?;
        Ok((topology, State::new(positions, periodic_box)))
    }
}

fn water_atoms() -> Vec<Atom> {
    let mut oxygen = Atom::new("O", 0);
    oxygen.force_field_type = "OW".to_string();
    oxygen.element = Element::Oxygen;
    oxygen.charge = TIP3P_CHARGE_O;
    oxygen.mass = MASS_O;
    oxygen.lj_type = 0;

    let hydrogen = |name: &str| {
        let mut h = Atom::new(name, 0);
        h.force_field_type = "HW".to_string();
        h.element = Element::Hydrogen;
        h.charge = TIP3P_CHARGE_H;
        h.mass = MASS_H;
        h.lj_type = 1;
        h
    };

    vec![oxygen, hydrogen("H1"), hydrogen("H2")]
}
