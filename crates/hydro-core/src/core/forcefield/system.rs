use super::params::LennardJonesTable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicBond {
    pub atom1: usize,
    pub atom2: usize,
    /// kJ/mol/nm².
    pub k: f64,
    /// nm.
    pub r0: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicAngle {
    pub atom1: usize,
    /// Vertex atom.
    pub atom2: usize,
    pub atom3: usize,
    /// kJ/mol/rad².
    pub k: f64,
    /// Radians.
    pub theta0: f64,
}

/// Fixed distance between two atoms, enforced by SHAKE/RATTLE.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceConstraint {
    pub atom1: usize,
    pub atom2: usize,
    /// nm.
    pub distance: f64,
}

/// Particle-mesh Ewald electrostatics with a truncated Lennard-Jones term.
#[derive(Debug, Clone, PartialEq)]
pub struct NonbondedSettings {
    /// Real-space cutoff in nm, shared by electrostatics and Lennard-Jones.
    pub cutoff: f64,
    /// Relative force error the Ewald splitting parameter and PME grid are chosen for.
    pub ewald_tolerance: f64,
    /// Long-range dispersion energy is `dispersion_coefficient / V`, or absent.
    pub dispersion_coefficient: Option<f64>,
}

impl NonbondedSettings {
    pub fn dispersion_energy(&self, volume: f64) -> f64 {
        self.dispersion_coefficient.map_or(0.0, |c| c / volume)
    }
}

/// Everything the engine needs to evaluate energies and forces, in engine units.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceFieldSystem {
    pub masses: Vec<f64>,
    pub charges: Vec<f64>,
    pub lj_types: Vec<usize>,
    pub lennard_jones: LennardJonesTable,
    pub bonds: Vec<HarmonicBond>,
    pub angles: Vec<HarmonicAngle>,
    pub constraints: Vec<DistanceConstraint>,
    /// Sorted exclusion partners of every atom (symmetric).
    pub exclusions: Vec<Vec<usize>>,
    /// Rigid units the barostat scales as a whole.
    pub molecules: Vec<Vec<usize>>,
    pub nonbonded: NonbondedSettings,
}

impl ForceFieldSystem {
    pub fn atom_count(&self) -> usize {
        self.masses.len()
    }

    pub fn total_mass(&self) -> f64 {
        self.masses.iter().sum()
    }

    /// Degrees of freedom used for the kinetic temperature: three per massive atom, minus
    /// one per constraint, minus three for the removed centre-of-mass motion.
    pub fn degrees_of_freedom(&self) -> usize {
        let massive = self.masses.iter().filter(|&&m| m > 0.0).count();
        (3 * massive).saturating_sub(self.constraints.len() + 3)
    }

    #[inline]
    pub fn is_excluded(&self, i: usize, j: usize) -> bool {
        self.exclusions[i].binary_search(&j).is_ok()
    }

    /// Excluded pairs as `(i, j)` with `i < j`.
    pub fn excluded_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.exclusions
            .iter()
            .enumerate()
            .flat_map(|(i, partners)| partners.iter().filter(move |&&j| j > i).map(move |&j| (i, j)))
    }
}
