use crate::core::utils::identifiers;
use std::ops::Range;

/// A residue of the topology: a named, contiguous block of atoms.
///
/// Amber topologies always store residues as contiguous atom ranges
/// (`RESIDUE_POINTER`), so a range is all that is needed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Residue {
    pub name: String,
    /// One-based residue number as it appears in the input.
    pub number: usize,
    atoms: Range<usize>,
}

impl Residue {
    pub(crate) fn new(name: &str, number: usize, atoms: Range<usize>) -> Self {
        Self {
            name: name.trim().to_string(),
            number,
            atoms,
        }
    }

    pub fn atoms(&self) -> Range<usize> {
        self.atoms.clone()
    }

    pub fn first_atom(&self) -> usize {
        self.atoms.start
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn contains(&self, atom_index: usize) -> bool {
        self.atoms.contains(&atom_index)
    }

    pub fn is_water(&self) -> bool {
        identifiers::is_water_residue(&self.name)
    }
}
