use super::cell::PeriodicBox;
use nalgebra::Vector3;

/// Dynamic state of a simulation: everything one stage hands to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    /// Positions in nm. Never wrapped into the box, so molecules stay whole.
    pub positions: Vec<Vector3<f64>>,
    /// Velocities in nm/ps.
    pub velocities: Vec<Vector3<f64>>,
    pub periodic_box: PeriodicBox,
    /// Simulation time in ps.
    pub time: f64,
    pub step: u64,
}

impl State {
    pub fn new(positions: Vec<Vector3<f64>>, periodic_box: PeriodicBox) -> Self {
        let velocities = vec![Vector3::zeros(); positions.len()];
        Self {
            positions,
            velocities,
            periodic_box,
            time: 0.0,
            step: 0,
        }
    }

    pub fn with_velocities(mut self, velocities: Vec<Vector3<f64>>) -> Self {
        self.velocities = velocities;
        self
    }

    pub fn atom_count(&self) -> usize {
        self.positions.len()
    }

    /// Positions and velocities describe the same set of atoms.
    pub fn is_consistent(&self) -> bool {
        self.positions.len() == self.velocities.len()
    }

    pub fn is_finite(&self) -> bool {
        self.positions
            .iter()
            .chain(self.velocities.iter())
            .all(|v| v.iter().all(|c| c.is_finite()))
    }
}
