use super::atom::{Atom, Element, ParseElementError};
use super::residue::Residue;
use crate::core::forcefield::params::ForceFieldParameters;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
    /// Index into [`ForceFieldParameters::bond_types`].
    pub type_index: usize,
}

impl Bond {
    pub fn new(atom1: usize, atom2: usize, type_index: usize) -> Self {
        Self {
            atom1,
            atom2,
            type_index,
        }
    }

    pub fn contains(&self, atom: usize) -> bool {
        self.atom1 == atom || self.atom2 == atom
    }
}

/// Harmonic angle `atom1 - atom2 - atom3`, with `atom2` at the vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Angle {
    pub atom1: usize,
    pub atom2: usize,
    pub atom3: usize,
    /// Index into [`ForceFieldParameters::angle_types`].
    pub type_index: usize,
}

impl Angle {
    pub fn new(atom1: usize, atom2: usize, atom3: usize, type_index: usize) -> Self {
        Self {
            atom1,
            atom2,
            atom3,
            type_index,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TopologyError {
    #[error("Atom index {index} is out of range for a topology with {atom_count} atoms")]
    AtomOutOfRange { index: usize, atom_count: usize },
    #[error("Atom {0} cannot be bonded to itself")]
    SelfBond(usize),
    #[error("Bond type index {index} is out of range ({count} bond types)")]
    BondTypeOutOfRange { index: usize, count: usize },
    #[error("Angle type index {index} is out of range ({count} angle types)")]
    AngleTypeOutOfRange { index: usize, count: usize },
    #[error("Atom {atom} uses Lennard-Jones type {lj_type}, but only {n_types} types exist")]
    LennardJonesTypeOutOfRange {
        atom: usize,
        lj_type: usize,
        n_types: usize,
    },
}

/// Connectivity, per-atom data and force-field parameters of a system.
///
/// Atoms are addressed by dense indices in file order; residues cover contiguous ranges.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Topology {
    atoms: Vec<Atom>,
    residues: Vec<Residue>,
    bonds: Vec<Bond>,
    angles: Vec<Angle>,
    pub parameters: ForceFieldParameters,
}

impl Topology {
    pub fn new(parameters: ForceFieldParameters) -> Self {
        Self {
            parameters,
            ..Default::default()
        }
    }

    /// Appends a residue made of `atoms` and returns its index.
    pub fn add_residue(&mut self, name: &str, atoms: Vec<Atom>) -> usize {
        let residue_index = self.residues.len();
        let start = self.atoms.len();
        self.atoms.extend(atoms.into_iter().map(|mut atom| {
            atom.residue_index = residue_index;
            atom
        }));
        let end = self.atoms.len();
        self.residues
            .push(Residue::new(name, residue_index + 1, start..end));
        residue_index
    }

    pub fn add_bond(&mut self, atom1: usize, atom2: usize, type_index: usize) -> Result<(), TopologyError> {
        self.check_atom(atom1)?;
        self.check_atom(atom2)?;
        if atom1 == atom2 {
            return Err(TopologyError::SelfBond(atom1));
        }
        let count = self.parameters.bond_types.len();
        if type_index >= count {
            return Err(TopologyError::BondTypeOutOfRange {
                index: type_index,
                count,
            });
        }
        self.bonds.push(Bond::new(atom1, atom2, type_index));
        Ok(())
    }

    pub fn add_angle(
        &mut self,
        atom1: usize,
        atom2: usize,
        atom3: usize,
        type_index: usize,
    ) -> Result<(), TopologyError> {
        for atom in [atom1, atom2, atom3] {
            self.check_atom(atom)?;
        }
        let count = self.parameters.angle_types.len();
        if type_index >= count {
            return Err(TopologyError::AngleTypeOutOfRange {
                index: type_index,
                count,
            });
        }
        self.angles.push(Angle::new(atom1, atom2, atom3, type_index));
        Ok(())
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn angles(&self) -> &[Angle] {
        &self.angles
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    pub fn residue_of(&self, atom: usize) -> Option<&Residue> {
        self.atoms
            .get(atom)
            .and_then(|a| self.residues.get(a.residue_index))
    }

    /// Total mass in amu.
    pub fn total_mass(&self) -> f64 {
        self.atoms.iter().map(|a| a.mass).sum()
    }

    pub fn total_charge(&self) -> f64 {
        self.atoms.iter().map(|a| a.charge).sum()
    }

    /// Checks that every per-atom Lennard-Jones type exists in the parameter table.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let n_types = self.parameters.lennard_jones.n_types();
        for (atom, a) in self.atoms.iter().enumerate() {
            if a.lj_type >= n_types {
                return Err(TopologyError::LennardJonesTypeOutOfRange {
                    atom,
                    lj_type: a.lj_type,
                    n_types,
                });
            }
        }
        Ok(())
    }

    /// Connected components of the bond graph, each sorted, ordered by their first atom.
    ///
    /// Unbonded atoms (ions) form single-atom molecules.
    pub fn molecules(&self) -> Vec<Vec<usize>> {
        let mut sets = DisjointSets::new(self.atoms.len());
        for bond in &self.bonds {
            sets.union(bond.atom1, bond.atom2);
        }

        let mut slot_of_root = vec![usize::MAX; self.atoms.len()];
        let mut molecules: Vec<Vec<usize>> = Vec::new();
        for atom in 0..self.atoms.len() {
            let root = sets.find(atom);
            if slot_of_root[root] == usize::MAX {
                slot_of_root[root] = molecules.len();
                molecules.push(Vec::new());
            }
            molecules[slot_of_root[root]].push(atom);
        }
        molecules
    }

    /// Directly bonded neighbours of every atom.
    pub fn bonded_neighbors(&self) -> Vec<Vec<usize>> {
        let mut neighbors = vec![Vec::new(); self.atoms.len()];
        for bond in &self.bonds {
            neighbors[bond.atom1].push(bond.atom2);
            neighbors[bond.atom2].push(bond.atom1);
        }
        neighbors
    }

    /// All 1-2 and 1-3 pairs of the bond graph as `(i, j)` with `i < j`, sorted.
    pub fn excluded_pairs(&self) -> Vec<(usize, usize)> {
        let neighbors = self.bonded_neighbors();
        let mut pairs = Vec::new();
        for (center, bonded) in neighbors.iter().enumerate() {
            for &j in bonded {
                pairs.push((center.min(j), center.max(j)));
            }
            for (a, &i) in bonded.iter().enumerate() {
                for &k in &bonded[a + 1..] {
                    if i != k {
                        pairs.push((i.min(k), i.max(k)));
                    }
                }
            }
        }
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }

    /// Indices of the atoms matching `selection`, in ascending order.
    pub fn select(&self, selection: &AtomSelection) -> Vec<usize> {
        self.atoms
            .iter()
            .enumerate()
            .filter(|(_, atom)| selection.matches(atom, &self.residues[atom.residue_index]))
            .map(|(i, _)| i)
            .collect()
    }

    fn check_atom(&self, index: usize) -> Result<(), TopologyError> {
        if index >= self.atoms.len() {
            return Err(TopologyError::AtomOutOfRange {
                index,
                atom_count: self.atoms.len(),
            });
        }
        Ok(())
    }
}

struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Smaller index becomes the root so components are keyed by their first atom.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// A simple atom selection, written as `all`, `water`, `element O`, `name OW` or
/// `resname WAT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomSelection {
    All,
    Water,
    Element(Element),
    Name(String),
    ResidueName(String),
}

impl AtomSelection {
    pub fn matches(&self, atom: &Atom, residue: &Residue) -> bool {
        match self {
            AtomSelection::All => true,
            AtomSelection::Water => residue.is_water(),
            AtomSelection::Element(element) => atom.element == *element,
            AtomSelection::Name(name) => atom.name == *name,
            AtomSelection::ResidueName(name) => residue.name == *name,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseSelectionError {
    #[error("Empty atom selection")]
    Empty,
    #[error("Unknown selection keyword '{0}' (expected all, water, element, name or resname)")]
    UnknownKeyword(String),
    #[error("Selection keyword '{0}' requires a value")]
    MissingValue(String),
    #[error(transparent)]
    Element(#[from] ParseElementError),
}

impl FromStr for AtomSelection {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let keyword = parts.next().ok_or(ParseSelectionError::Empty)?;
        let value = parts.next();
        let missing = || ParseSelectionError::MissingValue(keyword.to_string());
        match keyword.to_lowercase().as_str() {
            "all" => Ok(AtomSelection::All),
            "water" => Ok(AtomSelection::Water),
            "element" => Ok(AtomSelection::Element(value.ok_or_else(missing)?.parse()?)),
            "name" => Ok(AtomSelection::Name(value.ok_or_else(missing)?.to_string())),
            "resname" => Ok(AtomSelection::ResidueName(value.ok_or_else(missing)?.to_string())),
            other => Err(ParseSelectionError::UnknownKeyword(other.to_string())),
        }
    }
}

impl fmt::Display for AtomSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomSelection::All => write!(f, "all"),
            AtomSelection::Water => write!(f, "water"),
            AtomSelection::Element(element) => write!(f, "element {}", element),
            AtomSelection::Name(name) => write!(f, "name {}", name),
            AtomSelection::ResidueName(name) => write!(f, "resname {}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::{AngleType, BondType, LennardJonesTable};

    fn water_atoms() -> Vec<Atom> {
        let mut o = Atom::new("O", 0);
        o.element = Element::Oxygen;
        o.mass = 15.9994;
        o.charge = -0.834;
        let mut h1 = Atom::new("H1", 0);
        h1.element = Element::Hydrogen;
        h1.mass = 1.008;
        h1.charge = 0.417;
        h1.lj_type = 1;
        let mut h2 = h1.clone();
        h2.name = "H2".to_string();
        vec![o, h1, h2]
    }

    fn two_waters_and_an_ion() -> Topology {
        let parameters = ForceFieldParameters {
            bond_types: vec![BondType { k: 1.0, r0: 0.1 }],
            angle_types: vec![AngleType { k: 1.0, theta0: 1.8 }],
            lennard_jones: LennardJonesTable::new(3),
        };
        let mut topology = Topology::new(parameters);
        topology.add_residue("WAT", water_atoms());
        topology.add_residue("WAT", water_atoms());
        let mut na = Atom::new("Na+", 0);
        na.element = Element::Sodium;
        na.mass = 22.99;
        na.charge = 1.0;
        na.lj_type = 2;
        topology.add_residue("Na+", vec![na]);
        for offset in [0, 3] {
            topology.add_bond(offset, offset + 1, 0).unwrap();
            topology.add_bond(offset, offset + 2, 0).unwrap();
            topology.add_angle(offset + 1, offset, offset + 2, 0).unwrap();
        }
        topology
    }

    #[test]
    fn add_residue_assigns_residue_indices_and_ranges() {
        let topology = two_waters_and_an_ion();
        assert_eq!(topology.atom_count(), 7);
        assert_eq!(topology.residue_count(), 3);
        assert_eq!(topology.atoms()[4].residue_index, 1);
        assert_eq!(topology.residues()[1].atoms(), 3..6);
        assert_eq!(topology.residues()[2].number, 3);
        assert_eq!(topology.residue_of(6).unwrap().name, "Na+");
    }

    #[test]
    fn add_bond_validates_indices() {
        let mut topology = two_waters_and_an_ion();
        assert_eq!(
            topology.add_bond(0, 9, 0),
            Err(TopologyError::AtomOutOfRange {
                index: 9,
                atom_count: 7
            })
        );
        assert_eq!(topology.add_bond(2, 2, 0), Err(TopologyError::SelfBond(2)));
        assert_eq!(
            topology.add_bond(0, 1, 4),
            Err(TopologyError::BondTypeOutOfRange { index: 4, count: 1 })
        );
        assert!(matches!(
            topology.add_angle(0, 1, 2, 1),
            Err(TopologyError::AngleTypeOutOfRange { .. })
        ));
    }

    #[test]
    fn molecules_are_connected_components_of_the_bond_graph() {
        let topology = two_waters_and_an_ion();
        let molecules = topology.molecules();
        assert_eq!(molecules, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
    }

    #[test]
    fn excluded_pairs_cover_one_two_and_one_three_neighbours() {
        let mut topology = two_waters_and_an_ion();
        assert_eq!(
            topology.excluded_pairs(),
            vec![(0, 1), (0, 2), (1, 2), (3, 4), (3, 5), (4, 5)]
        );
        topology.add_bond(2, 6, 0).unwrap();
        let pairs = topology.excluded_pairs();
        assert!(pairs.contains(&(2, 6)));
        assert!(pairs.contains(&(0, 6)));
        assert!(!pairs.contains(&(1, 6)));
    }

    #[test]
    fn totals_sum_over_atoms() {
        let topology = two_waters_and_an_ion();
        assert!((topology.total_charge() - 1.0).abs() < 1e-12);
        let expected_mass = 2.0 * (15.9994 + 2.0 * 1.008) + 22.99;
        assert!((topology.total_mass() - expected_mass).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_unknown_lennard_jones_type() {
        let mut topology = two_waters_and_an_ion();
        assert!(topology.validate().is_ok());
        topology.parameters.lennard_jones = LennardJonesTable::new(2);
        assert_eq!(
            topology.validate(),
            Err(TopologyError::LennardJonesTypeOutOfRange {
                atom: 6,
                lj_type: 2,
                n_types: 2
            })
        );
    }

    #[test]
    fn select_filters_by_element_name_and_residue() {
        let topology = two_waters_and_an_ion();
        assert_eq!(topology.select(&"element O".parse().unwrap()), vec![0, 3]);
        assert_eq!(
            topology.select(&"element H".parse().unwrap()),
            vec![1, 2, 4, 5]
        );
        assert_eq!(topology.select(&"name H2".parse().unwrap()), vec![2, 5]);
        assert_eq!(topology.select(&"resname Na+".parse().unwrap()), vec![6]);
        assert_eq!(topology.select(&AtomSelection::Water).len(), 6);
        assert_eq!(topology.select(&AtomSelection::All).len(), 7);
    }

    #[test]
    fn selection_parsing_reports_errors() {
        assert_eq!("".parse::<AtomSelection>(), Err(ParseSelectionError::Empty));
        assert_eq!(
            "element".parse::<AtomSelection>(),
            Err(ParseSelectionError::MissingValue("element".to_string()))
        );
        for keyword in ["name", "resname"] {
            assert_eq!(
                keyword.parse::<AtomSelection>(),
                Err(ParseSelectionError::MissingValue(keyword.to_string()))
            );
        }
        assert!(matches!(
            "bynum 3".parse::<AtomSelection>(),
            Err(ParseSelectionError::UnknownKeyword(_))
        ));
        assert!(matches!(
            "element Qq".parse::<AtomSelection>(),
            Err(ParseSelectionError::Element(_))
        ));
    }

    #[test]
    fn selection_display_round_trips_through_parse() {
        for text in ["all", "water", "element O", "name OW", "resname WAT"] {
            let selection: AtomSelection = text.parse().unwrap();
            assert_eq!(selection.to_string(), text);
        }
    }
}
