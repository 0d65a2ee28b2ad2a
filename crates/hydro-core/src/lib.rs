//! # hydromd Core Library
//!
//! Staged molecular dynamics of periodic water boxes: Amber inputs, Langevin dynamics with
//! particle-mesh Ewald electrostatics, an optional Monte Carlo barostat, DCD trajectories
//! and radial distribution functions.
//!
//! ## Architectural Philosophy
//!
//! The library keeps a strict layering so that each part can be tested on its own.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Topology`, `State`,
//!   `PeriodicBox`), the force-field description (`ForceFieldSystem`, potentials, PME) and
//!   file formats (prmtop, inpcrd/rst7, DCD).
//!
//! - **[`engine`]: The Logic Core.** The stateful side: platforms, the force-evaluating
//!   `Context`, constraints, the Langevin integrator, the barostat, the minimizer and the
//!   stage runner with its reporters.
//!
//! - **[`analysis`]: Post-processing.** Radial distribution functions over a finished
//!   trajectory, their CSV export and SVG figures.
//!
//! - **[`workflows`]: The Public API.** Complete procedures (`simulate::run`,
//!   `analyze::run`) driven by a single configuration value.

pub mod analysis;
pub mod core;
pub mod engine;
pub mod workflows;
