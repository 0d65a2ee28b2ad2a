use super::error::EngineError;
use crate::core::forcefield::system::{DistanceConstraint, ForceFieldSystem};
use crate::core::models::cell::PeriodicBox;
use nalgebra::Vector3;

const MAX_ITERATIONS: usize = 1000;

/// Iterative SHAKE (positions) and RATTLE (velocities) for fixed-distance constraints.
#[derive(Debug, Clone)]
pub struct ConstraintSolver {
    constraints: Vec<DistanceConstraint>,
    inverse_masses: Vec<f64>,
    tolerance: f64,
}

impl ConstraintSolver {
    pub fn new(system: &ForceFieldSystem, tolerance: f64) -> Self {
        Self {
            constraints: system.constraints.clone(),
            inverse_masses: system
                .masses
                .iter()
                .map(|&m| if m > 0.0 { 1.0 / m } else { 0.0 })
                .collect(),
            tolerance,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Moves `positions` back onto the constraint surface along the bond directions of
    /// `reference`, the configuration before the unconstrained update.
    pub fn apply_positions(
        &self,
        reference: &[Vector3<f64>],
        positions: &mut [Vector3<f64>],
        periodic_box: &PeriodicBox,
    ) -> Result<(), EngineError> {
        if self.is_empty() {
            return Ok(());
        }
        let directions: Vec<Vector3<f64>> = self
            .constraints
            .iter()
            .map(|c| periodic_box.minimum_image(reference[c.atom1] - reference[c.atom2]))
            .collect();

        for _ in 0..MAX_ITERATIONS {
            let mut converged = true;
            for (c, r_ref) in self.constraints.iter().zip(&directions) {
                let (wi, wj) = (self.inverse_masses[c.atom1], self.inverse_masses[c.atom2]);
                let r = periodic_box.minimum_image(positions[c.atom1] - positions[c.atom2]);
                let d2 = c.distance * c.distance;
                let diff = d2 - r.norm_squared();
                if diff.abs() <= 2.0 * self.tolerance * d2 {
                    continue;
                }
                converged = false;
                let denominator = 2.0 * r.dot(r_ref) * (wi + wj);
                if denominator.abs() < f64::EPSILON {
                    return Err(EngineError::Constraints {
                        iterations: MAX_ITERATIONS,
                    });
                }
                let g = diff / denominator;
                positions[c.atom1] += r_ref * (g * wi);
                positions[c.atom2] -= r_ref * (g * wj);
            }
            if converged {
                return Ok(());
            }
        }
        Err(EngineError::Constraints {
            iterations: MAX_ITERATIONS,
        })
    }

    /// Removes the velocity components along every constrained bond.
    pub fn apply_velocities(
        &self,
        positions: &[Vector3<f64>],
        velocities: &mut [Vector3<f64>],
        periodic_box: &PeriodicBox,
    ) -> Result<(), EngineError> {
        if self.is_empty() {
            return Ok(());
        }
        let bonds: Vec<Vector3<f64>> = self
            .constraints
            .iter()
            .map(|c| periodic_box.minimum_image(positions[c.atom1] - positions[c.atom2]))
            .collect();

        for _ in 0..MAX_ITERATIONS {
            let mut converged = true;
            for (c, r) in self.constraints.iter().zip(&bonds) {
                let (wi, wj) = (self.inverse_masses[c.atom1], self.inverse_masses[c.atom2]);
                let d2 = c.distance * c.distance;
                let rv = r.dot(&(velocities[c.atom1] - velocities[c.atom2]));
                if rv.abs() <= self.tolerance * d2 {
                    continue;
                }
                converged = false;
                let k = rv / (r.norm_squared() * (wi + wj));
                velocities[c.atom1] -= r * (k * wi);
                velocities[c.atom2] += r * (k * wj);
            }
            if converged {
                return Ok(());
            }
        }
        Err(EngineError::Constraints {
            iterations: MAX_ITERATIONS,
        })
    }

    /// Largest relative deviation `|r − d| / d` over all constraints.
    pub fn max_deviation(&self, positions: &[Vector3<f64>], periodic_box: &PeriodicBox) -> f64 {
        self.constraints
            .iter()
            .map(|c| {
                let r = periodic_box
                    .minimum_image(positions[c.atom1] - positions[c.atom2])
                    .norm();
                (r - c.distance).abs() / c.distance
            })
            .fold(0.0, f64::max)
    }
}
