//! Provides input/output functionality for molecular file formats.
//!
//! Amber topology (`prmtop`) and coordinate/restart (`inpcrd`/`rst7`) files go through the
//! common [`traits::MolecularFile`] interface; DCD trajectories are loaded and saved whole
//! as a [`dcd::Trajectory`] through `bio_files`. All readers convert to engine units (nm,
//! nm/ps, elementary charges) except DCD frames, which stay in Å.

pub mod dcd;
pub mod inpcrd;
pub mod prmtop;
pub mod traits;
