use crate::core::utils::identifiers;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Chemical element of an atom, as far as the engine needs to know it.
///
/// Only the elements that show up in solvated systems are named explicitly; anything else
/// keeps its atomic number so that masses and selections still work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Element {
    Hydrogen,
    Carbon,
    Nitrogen,
    Oxygen,
    Sodium,
    Chlorine,
    Other(u8),
    /// Massless virtual sites or atoms whose element could not be determined.
    #[default]
    Unknown,
}

impl Element {
    /// Maps an atomic number to an element. Non-positive numbers mean "no element"
    /// (Amber writes `-1` for extra points).
    pub fn from_atomic_number(number: i64) -> Self {
        match number {
            1 => Element::Hydrogen,
            6 => Element::Carbon,
            7 => Element::Nitrogen,
            8 => Element::Oxygen,
            11 => Element::Sodium,
            17 => Element::Chlorine,
            n if (2..=118).contains(&n) => Element::Other(n as u8),
            _ => Element::Unknown,
        }
    }

    /// Guesses the element from an atomic mass in amu.
    ///
    /// Hydrogen masses are accepted up to 4.1 amu so that hydrogen mass repartitioning
    /// does not turn hydrogens into helium.
    pub fn from_mass(mass: f64) -> Self {
        if mass < 0.5 {
            return Element::Unknown;
        }
        if mass < 4.1 {
            return Element::Hydrogen;
        }
        identifiers::nearest_element_by_mass(mass)
            .map(Element::from_atomic_number)
            .unwrap_or(Element::Unknown)
    }

    pub fn atomic_number(&self) -> Option<u8> {
        match self {
            Element::Hydrogen => Some(1),
            Element::Carbon => Some(6),
            Element::Nitrogen => Some(7),
            Element::Oxygen => Some(8),
            Element::Sodium => Some(11),
            Element::Chlorine => Some(17),
            Element::Other(n) => Some(*n),
            Element::Unknown => None,
        }
    }

    pub fn is_hydrogen(&self) -> bool {
        matches!(self, Element::Hydrogen)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.atomic_number().and_then(identifiers::element_symbol) {
            Some(symbol) => write!(f, "{}", symbol),
            None => write!(f, "?"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown element symbol '{0}'")]
pub struct ParseElementError(pub String);

impl FromStr for Element {
    type Err = ParseElementError;

    /// Parses an element symbol, case-insensitively ("O", "na", "CL").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        identifiers::atomic_number_of(s.trim())
            .map(|n| Element::from_atomic_number(n as i64))
            .ok_or_else(|| ParseElementError(s.to_string()))
    }
}

/// An atom of the topology together with its per-atom force-field data.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Atom name as written in the topology (e.g. "O", "H1").
    pub name: String,
    /// Force-field atom type (e.g. "OW", "HW").
    pub force_field_type: String,
    pub element: Element,
    /// Partial charge in elementary charge units.
    pub charge: f64,
    /// Mass in amu.
    pub mass: f64,
    /// Zero-based index into the Lennard-Jones type table.
    pub lj_type: usize,
    /// Index of the parent residue in the topology.
    pub residue_index: usize,
}

impl Atom {
    pub fn new(name: &str, residue_index: usize) -> Self {
        Self {
            name: name.to_string(),
            force_field_type: String::new(),
            element: Element::Unknown,
            charge: 0.0,
            mass: 0.0,
            lj_type: 0,
            residue_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_atom_has_expected_default_fields() {
        let atom = Atom::new("O", 3);
        assert_eq!(atom.name, "O");
        assert_eq!(atom.residue_index, 3);
        assert_eq!(atom.element, Element::Unknown);
        assert_eq!(atom.charge, 0.0);
        assert_eq!(atom.mass, 0.0);
        assert_eq!(atom.force_field_type, "");
    }

    #[test]
    fn element_from_atomic_number_maps_common_elements() {
        assert_eq!(Element::from_atomic_number(1), Element::Hydrogen);
        assert_eq!(Element::from_atomic_number(8), Element::Oxygen);
        assert_eq!(Element::from_atomic_number(16), Element::Other(16));
        assert_eq!(Element::from_atomic_number(-1), Element::Unknown);
        assert_eq!(Element::from_atomic_number(0), Element::Unknown);
    }

    #[test]
    fn element_from_mass_recognizes_water_atoms() {
        assert_eq!(Element::from_mass(1.008), Element::Hydrogen);
        assert_eq!(Element::from_mass(3.024), Element::Hydrogen);
        assert_eq!(Element::from_mass(15.9994), Element::Oxygen);
        assert_eq!(Element::from_mass(22.99), Element::Sodium);
        assert_eq!(Element::from_mass(35.45), Element::Chlorine);
        assert_eq!(Element::from_mass(0.0), Element::Unknown);
    }

    #[test]
    fn element_from_str_is_case_insensitive() {
        assert_eq!("O".parse::<Element>(), Ok(Element::Oxygen));
        assert_eq!("h".parse::<Element>(), Ok(Element::Hydrogen));
        assert_eq!("CL".parse::<Element>(), Ok(Element::Chlorine));
        assert_eq!(" Na ".parse::<Element>(), Ok(Element::Sodium));
        assert!("Xx".parse::<Element>().is_err());
    }

    #[test]
    fn element_display_uses_symbol() {
        assert_eq!(Element::Oxygen.to_string(), "O");
        assert_eq!(Element::Chlorine.to_string(), "Cl");
        assert_eq!(Element::Unknown.to_string(), "?");
    }
}
