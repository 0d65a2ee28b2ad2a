//! # Engine Module
//!
//! The stateful simulation layer: an execution platform, a context that evaluates the
//! force field on it, and the dynamics built on top (integrator, constraints, barostat,
//! minimizer) together with the reporters that observe a running stage.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Integrator, stage, output and analysis settings with builders
//! - **Platforms** ([`platform`]) - Parallel and reference execution contexts with fallback selection
//! - **Force Evaluation** ([`context`]) - Energies, forces, temperature and density of a configuration
//! - **Dynamics** ([`simulation`]) - Langevin stages with optional Monte Carlo pressure control
//! - **Reporting** ([`reporters`], [`progress`]) - State logs, trajectories and progress callbacks
//! - **Error Handling** ([`error`]) - Engine error type shared by the workflows

pub mod barostat;
pub mod config;
pub mod constraints;
pub mod context;
pub mod error;
pub mod integrator;
pub mod minimizer;
pub(crate) mod neighbors;
pub mod platform;
pub mod progress;
pub mod reporters;
pub mod simulation;
