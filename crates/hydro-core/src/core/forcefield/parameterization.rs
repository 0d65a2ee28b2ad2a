use super::system::{
    DistanceConstraint, ForceFieldSystem, HarmonicAngle, HarmonicBond, NonbondedSettings,
};
use crate::core::models::topology::{Topology, TopologyError};
use std::collections::HashSet;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Which bonds are replaced by rigid distance constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstraintMode {
    None,
    /// Every bond involving a hydrogen atom.
    #[default]
    HBonds,
}

impl FromStr for ConstraintMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "hbonds" | "h-bonds" => Ok(Self::HBonds),
            _ => Err(format!("Unknown constraint mode '{}' (expected none or hbonds)", s)),
        }
    }
}

impl fmt::Display for ConstraintMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::HBonds => write!(f, "hbonds"),
        }
    }
}

/// Options controlling how a topology is turned into a [`ForceFieldSystem`].
#[derive(Debug, Clone, PartialEq)]
pub struct SystemConfig {
    /// Real-space cutoff in nm.
    pub nonbonded_cutoff: f64,
    pub ewald_error_tolerance: f64,
    pub constraints: ConstraintMode,
    /// Keep water molecules completely rigid, including the H-H distance.
    pub rigid_water: bool,
    pub dispersion_correction: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            nonbonded_cutoff: 1.0,
            ewald_error_tolerance: 5e-4,
            constraints: ConstraintMode::HBonds,
            rigid_water: true,
            dispersion_correction: true,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ParameterizationError {
    #[error("Cannot build a system from an empty topology")]
    EmptyTopology,
    #[error("Nonbonded cutoff must be positive and finite (got {0} nm)")]
    InvalidCutoff(f64),
    #[error("Ewald error tolerance must lie in (0, 0.5) (got {0})")]
    InvalidTolerance(f64),
    #[error("Atom {atom} ('{name}') has non-positive mass {mass} but is part of a constraint")]
    MasslessConstrainedAtom { atom: usize, name: String, mass: f64 },
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

fn pair_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Builds the force-field system for a topology: harmonic terms, constraints, exclusions
/// and the nonbonded (PME) settings.
pub fn create_system(topology: &Topology, config: &SystemConfig) -> Result<ForceFieldSystem, ParameterizationError> {
    if topology.atom_count() == 0 {
        return Err(ParameterizationError::EmptyTopology);
    }
    if !(config.nonbonded_cutoff.is_finite() && config.nonbonded_cutoff > 0.0) {
        return Err(ParameterizationError::InvalidCutoff(config.nonbonded_cutoff));
    }
    if !(config.ewald_error_tolerance > 0.0 && config.ewald_error_tolerance < 0.5) {
        return Err(ParameterizationError::InvalidTolerance(config.ewald_error_tolerance));
    }
    topology.validate()?;

    let atoms = topology.atoms();
    let params = &topology.parameters;
    let in_water = |atom: usize| topology.residue_of(atom).is_some_and(|r| r.is_water());

    let mut constraints: Vec<DistanceConstraint> = Vec::new();
    let mut constrained: HashSet<(usize, usize)> = HashSet::new();
    let mut bonds = Vec::new();

    for bond in topology.bonds() {
        let bond_type = params.bond_types[bond.type_index];
        let involves_h = atoms[bond.atom1].element.is_hydrogen() || atoms[bond.atom2].element.is_hydrogen();
        let rigid = (config.rigid_water && in_water(bond.atom1) && in_water(bond.atom2))
            || (config.constraints == ConstraintMode::HBonds && involves_h);
        if rigid {
            if constrained.insert(pair_key(bond.atom1, bond.atom2)) {
                constraints.push(DistanceConstraint {
                    atom1: bond.atom1,
                    atom2: bond.atom2,
                    distance: bond_type.r0,
                });
            }
        } else {
            bonds.push(HarmonicBond {
                atom1: bond.atom1,
                atom2: bond.atom2,
                k: bond_type.k,
                r0: bond_type.r0,
            });
        }
    }

    if config.rigid_water {
        // Three-site waters written without an H-H bond get it from the angle geometry.
        for angle in topology.angles() {
            if !(in_water(angle.atom1) && in_water(angle.atom2) && in_water(angle.atom3)) {
                continue;
            }
            let key = pair_key(angle.atom1, angle.atom3);
            if constrained.contains(&key) {
                continue;
            }
            let r1 = bond_length(topology, angle.atom1, angle.atom2);
            let r2 = bond_length(topology, angle.atom2, angle.atom3);
            if let (Some(r1), Some(r2)) = (r1, r2) {
                let theta = params.angle_types[angle.type_index].theta0;
                let distance = (r1 * r1 + r2 * r2 - 2.0 * r1 * r2 * theta.cos()).sqrt();
                constrained.insert(key);
                constraints.push(DistanceConstraint {
                    atom1: key.0,
                    atom2: key.1,
                    distance,
                });
            }
        }
    }

    for c in &constraints {
        for atom in [c.atom1, c.atom2] {
            if atoms[atom].mass <= 0.0 {
                return Err(ParameterizationError::MasslessConstrainedAtom {
                    atom,
                    name: atoms[atom].name.clone(),
                    mass: atoms[atom].mass,
                });
            }
        }
    }

    let angles: Vec<HarmonicAngle> = topology
        .angles()
        .iter()
        .filter(|a| {
            let rigid_triangle = constrained.contains(&pair_key(a.atom1, a.atom2))
                && constrained.contains(&pair_key(a.atom2, a.atom3))
                && constrained.contains(&pair_key(a.atom1, a.atom3));
            !rigid_triangle
        })
        .map(|a| {
            let angle_type = params.angle_types[a.type_index];
            HarmonicAngle {
                atom1: a.atom1,
                atom2: a.atom2,
                atom3: a.atom3,
                k: angle_type.k,
                theta0: angle_type.theta0,
            }
        })
        .collect();

    let mut exclusions = vec![Vec::new(); topology.atom_count()];
    for (i, j) in topology.excluded_pairs() {
        exclusions[i].push(j);
        exclusions[j].push(i);
    }
    for partners in exclusions.iter_mut() {
        partners.sort_unstable();
    }

    let lj_types: Vec<usize> = atoms.iter().map(|a| a.lj_type).collect();
    let dispersion_coefficient = config
        .dispersion_correction
        .then(|| dispersion_coefficient(topology, config.nonbonded_cutoff));

    debug!(
        bonds = bonds.len(),
        angles = angles.len(),
        constraints = constraints.len(),
        dropped_angles = topology.angles().len() - angles.len(),
        "Parameterized system"
    );

    Ok(ForceFieldSystem {
        masses: atoms.iter().map(|a| a.mass).collect(),
        charges: atoms.iter().map(|a| a.charge).collect(),
        lj_types,
        lennard_jones: params.lennard_jones.clone(),
        bonds,
        angles,
        constraints,
        exclusions,
        molecules: topology.molecules(),
        nonbonded: NonbondedSettings {
            cutoff: config.nonbonded_cutoff,
            ewald_tolerance: config.ewald_error_tolerance,
            dispersion_coefficient,
        },
    })
}

fn bond_length(topology: &Topology, a: usize, b: usize) -> Option<f64> {
    topology
        .bonds()
        .iter()
        .find(|bond| pair_key(bond.atom1, bond.atom2) == pair_key(a, b))
        .map(|bond| topology.parameters.bond_types[bond.type_index].r0)
}

/// Coefficient `c` of the homogeneous-fluid tail correction `E = c / V` for a plain
/// Lennard-Jones cutoff.
fn dispersion_coefficient(topology: &Topology, cutoff: f64) -> f64 {
    let lj = &topology.parameters.lennard_jones;
    let mut counts = vec![0.0f64; lj.n_types()];
    for atom in topology.atoms() {
        counts[atom.lj_type] += 1.0;
    }
    let rc3 = cutoff.powi(3);
    let rc9 = rc3 * rc3 * rc3;
    let mut sum = 0.0;
    for (i, &ni) in counts.iter().enumerate() {
        for (j, &nj) in counts.iter().enumerate() {
            let (a, b) = lj.coefficients(i, j);
            sum += ni * nj * (a / (9.0 * rc9) - b / (3.0 * rc3));
        }
    }
    2.0 * PI * sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::{AngleType, BondType, ForceFieldParameters, LennardJonesTable};
    use crate::core::models::atom::{Atom, Element};
    use crate::core::models::builder::WaterBoxBuilder;

    fn water_without_hh_bond(residue_name: &str) -> Topology {
        let parameters = ForceFieldParameters {
            bond_types: vec![BondType {
                k: 462_750.4,
                r0: 0.09572,
            }],
            angle_types: vec![AngleType {
                k: 836.8,
                theta0: 104.52f64.to_radians(),
            }],
            lennard_jones: LennardJonesTable::from_sigma_epsilon(&[(0.315, 0.636), (0.0, 0.0)]),
        };
        let mut topology = Topology::new(parameters);
        let mut o = Atom::new("O", 0);
        o.element = Element::Oxygen;
        o.mass = 16.0;
        o.charge = -0.834;
        let mut h = Atom::new("H1", 0);
        h.element = Element::Hydrogen;
        h.mass = 1.008;
        h.charge = 0.417;
        h.lj_type = 1;
        topology.add_residue(residue_name, vec![o, h.clone(), h]);
        topology.add_bond(0, 1, 0).unwrap();
        topology.add_bond(0, 2, 0).unwrap();
        topology.add_angle(1, 0, 2, 0).unwrap();
        topology
    }

    #[test]
    fn create_system_validates_config() {
        let (topology, _) = WaterBoxBuilder::new(1).build().unwrap();
        let config = SystemConfig {
            nonbonded_cutoff: 0.0,
            ..Default::default()
        };
        assert_eq!(
            create_system(&topology, &config),
            Err(ParameterizationError::InvalidCutoff(0.0))
        );
        let config = SystemConfig {
            ewald_error_tolerance: 0.7,
            ..Default::default()
        };
        assert_eq!(
            create_system(&topology, &config),
            Err(ParameterizationError::InvalidTolerance(0.7))
        );
        assert_eq!(
            create_system(&Topology::default(), &SystemConfig::default()),
            Err(ParameterizationError::EmptyTopology)
        );
    }

    #[test]
    fn rigid_water_constrains_all_bonds_and_drops_angle() {
        let (topology, _) = WaterBoxBuilder::new(2).build().unwrap();
        let system = create_system(&topology, &SystemConfig::default()).unwrap();
        assert_eq!(system.constraints.len(), 24);
        assert!(system.bonds.is_empty());
        assert!(system.angles.is_empty());
        assert_eq!(system.degrees_of_freedom(), 3 * 24 - 24 - 3);
        assert_eq!(system.molecules.len(), 8);
    }

    #[test]
    fn no_constraints_keeps_flexible_terms() {
        let (topology, _) = WaterBoxBuilder::new(1).build().unwrap();
        let config = SystemConfig {
            constraints: ConstraintMode::None,
            rigid_water: false,
            ..Default::default()
        };
        let system = create_system(&topology, &config).unwrap();
        assert!(system.constraints.is_empty());
        assert_eq!(system.bonds.len(), 3);
        assert_eq!(system.angles.len(), 1);
    }

    #[test]
    fn rigid_water_derives_hh_distance_from_angle() {
        let topology = water_without_hh_bond("HOH");
        let system = create_system(&topology, &SystemConfig::default()).unwrap();
        assert_eq!(system.constraints.len(), 3);
        let hh = system
            .constraints
            .iter()
            .find(|c| (c.atom1, c.atom2) == (1, 2))
            .unwrap();
        assert!((hh.distance - 0.15139).abs() < 1e-4);
        assert!(system.angles.is_empty());
    }

    #[test]
    fn hbonds_without_rigid_water_keeps_angle_of_non_water() {
        let topology = water_without_hh_bond("MOL");
        let system = create_system(&topology, &SystemConfig::default()).unwrap();
        assert_eq!(system.constraints.len(), 2);
        assert_eq!(system.angles.len(), 1);
    }

    #[test]
    fn exclusions_are_symmetric_and_sorted() {
        let (topology, _) = WaterBoxBuilder::new(1).build().unwrap();
        let system = create_system(&topology, &SystemConfig::default()).unwrap();
        assert_eq!(system.exclusions, vec![vec![1, 2], vec![0, 2], vec![0, 1]]);
    }

    #[test]
    fn dispersion_correction_is_attractive_for_water() {
        let (topology, _) = WaterBoxBuilder::new(2).build().unwrap();
        let system = create_system(&topology, &SystemConfig::default()).unwrap();
        let c = system.nonbonded.dispersion_coefficient.unwrap();
        assert!(c < 0.0);

        let config = SystemConfig {
            dispersion_correction: false,
            ..Default::default()
        };
        let system = create_system(&topology, &config).unwrap();
        assert!(system.nonbonded.dispersion_coefficient.is_none());
    }

    #[test]
    fn constraint_mode_parses_and_displays() {
        assert_eq!("HBonds".parse::<ConstraintMode>(), Ok(ConstraintMode::HBonds));
        assert_eq!("none".parse::<ConstraintMode>(), Ok(ConstraintMode::None));
        assert!("allbonds".parse::<ConstraintMode>().is_err());
        assert_eq!(ConstraintMode::HBonds.to_string(), "hbonds");
    }
}
