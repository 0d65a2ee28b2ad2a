//! # Force Field Module
//!
//! Classical molecular mechanics for periodic water systems: parameter tables, the
//! parameterized [`system::ForceFieldSystem`] and the energy/force kernels the engine
//! evaluates every step.
//!
//! ## Key Components
//!
//! - [`params`] - Bond, angle and Lennard-Jones parameter tables read from topologies
//! - [`parameterization`] - Turns a topology into a system: constraints, exclusions, PME settings
//! - [`system`] - The parameterized system in engine units
//! - [`bonded`] and [`nonbonded`] - Harmonic terms, direct-space Lennard-Jones and Ewald
//! - [`pme`] - Reciprocal-space smooth particle-mesh Ewald
//! - [`term`] - Energy decomposition reported by the engine
//!
//! ## Usage
//!
//! ```ignore
//! use hydromd::core::forcefield::parameterization::{create_system, SystemConfig};
//!
//! let system = create_system(&topology, &SystemConfig::default())?;
//! ```

pub mod bonded;
pub mod nonbonded;
pub mod parameterization;
pub mod params;
pub mod pme;
pub mod potentials;
pub mod system;
pub mod term;
