//! # Core Module
//!
//! Stateless building blocks of hydromd: molecular data models, force-field
//! parameterization and energy kernels, and readers/writers for the Amber and DCD file
//! formats.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atoms, residues, topology, periodic box and dynamic state
//! - **Energy Calculations** ([`forcefield`]) - Parameters, system construction, bonded/nonbonded/PME kernels
//! - **File I/O** ([`io`]) - Amber `prmtop`/`inpcrd` and CHARMM-layout DCD trajectories
//! - **Utilities** ([`utils`]) - Static element and residue-name tables
//!
//! Everything here works in engine units (nm, ps, kJ/mol, amu, e). File formats keep their
//! native units and convert at the I/O boundary.

pub mod forcefield;
pub mod io;
pub mod models;
pub mod utils;
