//! # Core Models Module
//!
//! Plain data structures describing the simulated system.
//!
//! - [`atom`] - Atoms and chemical elements
//! - [`residue`] - Residues as contiguous atom ranges
//! - [`topology`] - Bonds, angles, molecules, force-field parameter tables and atom selections
//! - [`cell`] - The orthorhombic periodic box and minimum-image convention
//! - [`state`] - Positions, velocities, box and clock handed from stage to stage
//!
//! Lengths are in nm, velocities in nm/ps, masses in amu and charges in units of the
//! elementary charge. File formats convert at the I/O boundary.

pub mod atom;
pub mod builder;
pub mod cell;
pub mod residue;
pub mod state;
pub mod topology;
