use super::potentials::COULOMB_CONSTANT;
use crate::core::models::cell::PeriodicBox;
use nalgebra::Vector3;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Interpolation order of the B-splines (cubic).
pub const PME_ORDER: usize = 4;
const MIN_GRID_SIZE: usize = 6;

/// Ewald splitting parameter and reciprocal-space grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmeParameters {
    /// Splitting parameter β in 1/nm.
    pub alpha: f64,
    pub grid: [usize; 3],
}

impl PmeParameters {
    /// Chooses β and the grid for a target relative force error, given the cutoff and box.
    ///
    /// `β = √(−ln(2·tol)) / rc` and `K = ⌈2βL / (3·tol^⅕)⌉`, rounded up to a size the FFT
    /// handles efficiently.
    pub fn from_tolerance(cutoff: f64, tolerance: f64, periodic_box: &PeriodicBox) -> Self {
        let alpha = (-(2.0 * tolerance).ln()).sqrt() / cutoff;
        let lengths = periodic_box.lengths();
        let grid = [0, 1, 2].map(|k| {
            let n = (2.0 * alpha * lengths[k] / (3.0 * tolerance.powf(0.2))).ceil() as usize;
            smooth_fft_size(n.max(MIN_GRID_SIZE))
        });
        Self { alpha, grid }
    }
}

/// Smallest integer `>= n` whose only prime factors are 2, 3, 5 and 7.
fn smooth_fft_size(n: usize) -> usize {
    let mut candidate = n.max(1);
    loop {
        let mut rest = candidate;
        for p in [2, 3, 5, 7] {
            while rest % p == 0 {
                rest /= p;
            }
        }
        if rest == 1 {
            return candidate;
        }
        candidate += 1;
    }
}

/// Cubic cardinal B-spline weights for the four grid points `⌊u⌋, ⌊u⌋−1, ⌊u⌋−2, ⌊u⌋−3`
/// and their derivatives with respect to `u`.
#[inline]
fn bspline_weights(t: f64) -> ([f64; PME_ORDER], [f64; PME_ORDER]) {
    let t2 = t * t;
    let t3 = t2 * t;
    let s = 1.0 - t;
    (
        [
            t3 / 6.0,
            (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) / 6.0,
            (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0,
            s * s * s / 6.0,
        ],
        [
            0.5 * t2,
            0.5 * (-3.0 * t2 + 2.0 * t + 1.0),
            0.5 * (3.0 * t2 - 4.0 * t),
            -0.5 * s * s,
        ],
    )
}

/// `|b(m)|²` for every frequency of an axis with `size` grid points.
fn bspline_moduli(size: usize) -> Vec<f64> {
    // M4 at the integer knots 1, 2, 3.
    let knots = [1.0 / 6.0, 4.0 / 6.0, 1.0 / 6.0];
    (0..size)
        .map(|m| {
            let mut sum = Complex::new(0.0, 0.0);
            for (k, &value) in knots.iter().enumerate() {
                let phase = 2.0 * PI * (m * k) as f64 / size as f64;
                sum += Complex::new(phase.cos(), phase.sin()) * value;
            }
            1.0 / sum.norm_sqr()
        })
        .collect()
}

struct SplineStencil {
    indices: [[usize; PME_ORDER]; 3],
    weights: [[f64; PME_ORDER]; 3],
    derivatives: [[f64; PME_ORDER]; 3],
}

/// Reciprocal-space part of smooth particle-mesh Ewald for an orthorhombic box.
pub struct PmeSolver {
    parameters: PmeParameters,
    forward: [Arc<dyn Fft<f64>>; 3],
    inverse: [Arc<dyn Fft<f64>>; 3],
    moduli: [Vec<f64>; 3],
    grid: Vec<Complex<f64>>,
}

impl PmeSolver {
    pub fn new(parameters: PmeParameters) -> Self {
        let mut planner = FftPlanner::new();
        let forward = parameters.grid.map(|n| planner.plan_fft_forward(n));
        let inverse = parameters.grid.map(|n| planner.plan_fft_inverse(n));
        let moduli = parameters.grid.map(bspline_moduli);
        let [k1, k2, k3] = parameters.grid;
        Self {
            parameters,
            forward,
            inverse,
            moduli,
            grid: vec![Complex::new(0.0, 0.0); k1 * k2 * k3],
        }
    }

    pub fn parameters(&self) -> &PmeParameters {
        &self.parameters
    }

    #[inline]
    fn index(&self, i: usize, j: usize, k: usize) -> usize {
        let [_, k2, k3] = self.parameters.grid;
        (i * k2 + j) * k3 + k
    }

    fn stencil(&self, position: &Vector3<f64>, periodic_box: &PeriodicBox) -> SplineStencil {
        let lengths = periodic_box.lengths();
        let mut stencil = SplineStencil {
            indices: [[0; PME_ORDER]; 3],
            weights: [[0.0; PME_ORDER]; 3],
            derivatives: [[0.0; PME_ORDER]; 3],
        };
        for axis in 0..3 {
            let size = self.parameters.grid[axis];
            let fractional = position[axis] / lengths[axis];
            let u = (fractional - fractional.floor()) * size as f64;
            let base = u.floor();
            let (weights, derivatives) = bspline_weights(u - base);
            let base = (base as usize).min(size - 1);
            for j in 0..PME_ORDER {
                stencil.indices[axis][j] = (base + size * PME_ORDER - j) % size;
            }
            stencil.weights[axis] = weights;
            stencil.derivatives[axis] = derivatives;
        }
        stencil
    }

    /// Adds reciprocal-space forces to `forces` and returns the reciprocal energy.
    pub fn compute(
        &mut self,
        positions: &[Vector3<f64>],
        charges: &[f64],
        periodic_box: &PeriodicBox,
        forces: &mut [Vector3<f64>],
    ) -> f64 {
        let stencils: Vec<SplineStencil> = positions
            .iter()
            .map(|p| self.stencil(p, periodic_box))
            .collect();

        self.grid.fill(Complex::new(0.0, 0.0));
        for (stencil, &q) in stencils.iter().zip(charges) {
            if q == 0.0 {
                continue;
            }
            for a in 0..PME_ORDER {
                let wa = q * stencil.weights[0][a];
                for b in 0..PME_ORDER {
                    let wab = wa * stencil.weights[1][b];
                    for c in 0..PME_ORDER {
                        let idx = self.index(
                            stencil.indices[0][a],
                            stencil.indices[1][b],
                            stencil.indices[2][c],
                        );
                        self.grid[idx].re += wab * stencil.weights[2][c];
                    }
                }
            }
        }

        self.transform(true);
        let energy = self.apply_influence_function(periodic_box);
        self.transform(false);

        let lengths = periodic_box.lengths();
        let scale = Vector3::new(
            self.parameters.grid[0] as f64 / lengths.x,
            self.parameters.grid[1] as f64 / lengths.y,
            self.parameters.grid[2] as f64 / lengths.z,
        );
        for ((stencil, &q), force) in stencils.iter().zip(charges).zip(forces.iter_mut()) {
            if q == 0.0 {
                continue;
            }
            let mut gradient = Vector3::zeros();
            for a in 0..PME_ORDER {
                let (wa, da) = (stencil.weights[0][a], stencil.derivatives[0][a]);
                for b in 0..PME_ORDER {
                    let (wb, db) = (stencil.weights[1][b], stencil.derivatives[1][b]);
                    for c in 0..PME_ORDER {
                        let (wc, dc) = (stencil.weights[2][c], stencil.derivatives[2][c]);
                        let phi = self.grid[self.index(
                            stencil.indices[0][a],
                            stencil.indices[1][b],
                            stencil.indices[2][c],
                        )]
                        .re;
                        gradient.x += da * wb * wc * phi;
                        gradient.y += wa * db * wc * phi;
                        gradient.z += wa * wb * dc * phi;
                    }
                }
            }
            *force -= q * gradient.component_mul(&scale);
        }

        energy
    }

    /// Multiplies the transformed charge grid by the Ewald influence function in place and
    /// returns the reciprocal energy `½·Σ G(m)·|F(Q)(m)|²`.
    fn apply_influence_function(&mut self, periodic_box: &PeriodicBox) -> f64 {
        let [k1, k2, k3] = self.parameters.grid;
        let lengths = periodic_box.lengths();
        let volume = periodic_box.volume();
        let alpha = self.parameters.alpha;
        let prefactor = COULOMB_CONSTANT / (PI * volume);
        let damping = PI * PI / (alpha * alpha);
        let frequency = |index: usize, size: usize, length: f64| {
            let shifted = if index > size / 2 {
                index as f64 - size as f64
            } else {
                index as f64
            };
            shifted / length
        };

        let mut energy = 0.0;
        for i in 0..k1 {
            let mx = frequency(i, k1, lengths.x);
            for j in 0..k2 {
                let my = frequency(j, k2, lengths.y);
                for k in 0..k3 {
                    let idx = self.index(i, j, k);
                    if i == 0 && j == 0 && k == 0 {
                        self.grid[idx] = Complex::new(0.0, 0.0);
                        continue;
                    }
                    let mz = frequency(k, k3, lengths.z);
                    let m2 = mx * mx + my * my + mz * mz;
                    let b = self.moduli[0][i] * self.moduli[1][j] * self.moduli[2][k];
                    let g = prefactor * (-damping * m2).exp() / m2 * b;
                    energy += 0.5 * g * self.grid[idx].norm_sqr();
                    self.grid[idx] *= g;
                }
            }
        }
        energy
    }

    fn transform(&mut self, forward: bool) {
        let [k1, k2, k3] = self.parameters.grid;
        let plans = if forward { &self.forward } else { &self.inverse };

        // Innermost axis is contiguous: one batched call.
        plans[2].process(&mut self.grid);

        let mut line = vec![Complex::new(0.0, 0.0); k1.max(k2)];
        for i in 0..k1 {
            for k in 0..k3 {
                for j in 0..k2 {
                    line[j] = self.grid[(i * k2 + j) * k3 + k];
                }
                plans[1].process(&mut line[..k2]);
                for j in 0..k2 {
                    self.grid[(i * k2 + j) * k3 + k] = line[j];
                }
            }
        }
        for j in 0..k2 {
            for k in 0..k3 {
                for i in 0..k1 {
                    line[i] = self.grid[(i * k2 + j) * k3 + k];
                }
                plans[0].process(&mut line[..k1]);
                for i in 0..k1 {
                    self.grid[(i * k2 + j) * k3 + k] = line[i];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reciprocal Ewald energy by explicit summation over wave vectors.
    fn direct_reciprocal_energy(positions: &[Vector3<f64>], charges: &[f64], cell: &PeriodicBox, alpha: f64) -> f64 {
        let lengths = cell.lengths();
        let volume = cell.volume();
        let kmax = 12i32;
        let mut energy = 0.0;
        for a in -kmax..=kmax {
            for b in -kmax..=kmax {
                for c in -kmax..=kmax {
                    if a == 0 && b == 0 && c == 0 {
                        continue;
                    }
                    let m = Vector3::new(a as f64 / lengths.x, b as f64 / lengths.y, c as f64 / lengths.z);
                    let m2 = m.norm_squared();
                    let mut s = Complex::new(0.0, 0.0);
                    for (p, &q) in positions.iter().zip(charges) {
                        let phase = 2.0 * PI * m.dot(p);
                        s += Complex::new(phase.cos(), phase.sin()) * q;
                    }
                    energy += (-PI * PI * m2 / (alpha * alpha)).exp() / m2 * s.norm_sqr();
                }
            }
        }
        COULOMB_CONSTANT / (2.0 * PI * volume) * energy
    }

    fn test_charges() -> (Vec<Vector3<f64>>, Vec<f64>, PeriodicBox) {
        let positions = vec![
            Vector3::new(0.1, 0.2, 0.3),
            Vector3::new(0.55, 0.35, 0.62),
            Vector3::new(1.2, 0.9, 0.15),
            Vector3::new(0.8, 1.4, 1.05),
            Vector3::new(-0.3, 0.7, 1.3),
        ];
        let charges = vec![0.8, -0.4, -0.6, 0.5, -0.3];
        (positions, charges, PeriodicBox::new(1.5, 1.6, 1.7).unwrap())
    }

    #[test]
    fn smooth_fft_size_rounds_up_to_small_primes() {
        assert_eq!(smooth_fft_size(6), 6);
        assert_eq!(smooth_fft_size(11), 12);
        assert_eq!(smooth_fft_size(13), 14);
        assert_eq!(smooth_fft_size(17), 18);
        assert_eq!(smooth_fft_size(22), 24);
    }

    #[test]
    fn bspline_weights_partition_unity_with_zero_net_derivative() {
        for &t in &[0.0, 0.25, 0.5, 0.9] {
            let (w, d) = bspline_weights(t);
            assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
            assert!(d.iter().sum::<f64>().abs() < 1e-12);
        }
    }

    #[test]
    fn from_tolerance_follows_standard_formula() {
        let cell = PeriodicBox::cubic(3.0).unwrap();
        let params = PmeParameters::from_tolerance(1.0, 5e-4, &cell);
        let expected_alpha = (-(1e-3f64).ln()).sqrt();
        assert!((params.alpha - expected_alpha).abs() < 1e-12);
        let raw = (2.0 * expected_alpha * 3.0 / (3.0 * 5e-4f64.powf(0.2))).ceil() as usize;
        assert!(params.grid[0] >= raw);
        assert_eq!(params.grid[0], smooth_fft_size(raw));
    }

    #[test]
    fn reciprocal_energy_matches_direct_ewald_sum() {
        let (positions, charges, cell) = test_charges();
        let params = PmeParameters {
            alpha: 3.0,
            grid: [32, 32, 36],
        };
        let mut solver = PmeSolver::new(params);
        let mut forces = vec![Vector3::zeros(); positions.len()];
        let pme = solver.compute(&positions, &charges, &cell, &mut forces);
        let direct = direct_reciprocal_energy(&positions, &charges, &cell, params.alpha);
        assert!(
            (pme - direct).abs() < 1e-3 * direct.abs(),
            "pme {} vs direct {}",
            pme,
            direct
        );
    }

    #[test]
    fn reciprocal_forces_are_negative_energy_gradient() {
        let (mut positions, charges, cell) = test_charges();
        let params = PmeParameters {
            alpha: 3.0,
            grid: [24, 24, 24],
        };
        let mut solver = PmeSolver::new(params);
        let mut forces = vec![Vector3::zeros(); positions.len()];
        solver.compute(&positions, &charges, &cell, &mut forces);

        let h = 1e-5;
        let mut scratch = vec![Vector3::zeros(); positions.len()];
        for axis in 0..3 {
            positions[2][axis] += h;
            let plus = solver.compute(&positions, &charges, &cell, &mut scratch);
            positions[2][axis] -= 2.0 * h;
            let minus = solver.compute(&positions, &charges, &cell, &mut scratch);
            positions[2][axis] += h;
            let numeric = -(plus - minus) / (2.0 * h);
            assert!(
                (forces[2][axis] - numeric).abs() < 1e-3 * numeric.abs().max(1.0),
                "axis {}: analytic {} numeric {}",
                axis,
                forces[2][axis],
                numeric
            );
        }
    }

    #[test]
    fn reciprocal_forces_sum_to_nearly_zero() {
        let (positions, charges, cell) = test_charges();
        // Smooth PME only conserves momentum up to the interpolation error, which is a few
        // percent of the largest force on the automatic grid for this sparse system.
        let params = PmeParameters {
            grid: [32, 32, 36],
            ..PmeParameters::from_tolerance(0.7, 5e-4, &cell)
        };
        let mut solver = PmeSolver::new(params);
        let mut forces = vec![Vector3::zeros(); positions.len()];
        solver.compute(&positions, &charges, &cell, &mut forces);
        let net: Vector3<f64> = forces.iter().sum();
        let largest = forces.iter().map(|f| f.norm()).fold(0.0, f64::max);
        assert!(net.norm() < 1e-2 * largest);
    }
}
