use std::f64::consts::PI;

/// Coulomb constant in kJ·nm/(mol·e²).
pub const COULOMB_CONSTANT: f64 = 138.935_456;

const FRAC_2_SQRT_PI: f64 = std::f64::consts::FRAC_2_SQRT_PI;

/// Complementary error function, Abramowitz & Stegun 7.1.26 (|error| < 1.5e-7).
#[inline]
pub fn erfc(x: f64) -> f64 {
    const P: f64 = 0.327_591_1;
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;

    let z = x.abs();
    let t = 1.0 / (1.0 + P * z);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    let value = poly * (-z * z).exp();
    if x >= 0.0 { value } else { 2.0 - value }
}

#[inline]
pub fn erf(x: f64) -> f64 {
    1.0 - erfc(x)
}

/// Lennard-Jones in `A/r¹² − B/r⁶` form.
///
/// Returns `(energy, f_over_r)`, where the force on the first atom is `f_over_r · (r₁ − r₂)`.
#[inline]
pub fn lennard_jones_12_6(dist: f64, a: f64, b: f64) -> (f64, f64) {
    let inv_r2 = 1.0 / (dist * dist);
    let inv_r6 = inv_r2 * inv_r2 * inv_r2;
    let repulsive = a * inv_r6 * inv_r6;
    let attractive = b * inv_r6;
    (
        repulsive - attractive,
        (12.0 * repulsive - 6.0 * attractive) * inv_r2,
    )
}

/// Plain Coulomb energy in vacuum, `k·q₁·q₂ / r`.
#[inline]
pub fn coulomb(dist: f64, q1: f64, q2: f64) -> f64 {
    COULOMB_CONSTANT * q1 * q2 / dist
}

/// Real-space Ewald term `k·q₁q₂·erfc(βr)/r`, returned as `(energy, f_over_r)`.
#[inline]
pub fn ewald_real_space(dist: f64, qq: f64, beta: f64) -> (f64, f64) {
    let beta_r = beta * dist;
    let prefactor = COULOMB_CONSTANT * qq / dist;
    let energy = prefactor * erfc(beta_r);
    let gaussian = FRAC_2_SQRT_PI * beta_r * (-beta_r * beta_r).exp();
    (energy, (energy + prefactor * gaussian) / (dist * dist))
}

/// Removes the reciprocal-space interaction of an excluded pair, `−k·q₁q₂·erf(βr)/r`.
#[inline]
pub fn ewald_exclusion_correction(dist: f64, qq: f64, beta: f64) -> (f64, f64) {
    let beta_r = beta * dist;
    let prefactor = COULOMB_CONSTANT * qq / dist;
    let energy = -prefactor * erf(beta_r);
    let gaussian = FRAC_2_SQRT_PI * beta_r * (-beta_r * beta_r).exp();
    (energy, (energy + prefactor * gaussian) / (dist * dist))
}

/// Ewald self energy of a set of charges, `−k·β/√π·Σq²`.
pub fn ewald_self_energy(charges: &[f64], beta: f64) -> f64 {
    let sum_q2: f64 = charges.iter().map(|q| q * q).sum();
    -COULOMB_CONSTANT * beta / PI.sqrt() * sum_q2
}

/// Harmonic `½·k·(x − x0)²`, returned as `(energy, dE/dx)`.
#[inline]
pub fn harmonic(x: f64, x0: f64, k: f64) -> (f64, f64) {
    let dx = x - x0;
    (0.5 * k * dx * dx, k * dx)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn erfc_matches_reference_values() {
        assert!((erfc(0.0) - 1.0).abs() < 2e-7);
        assert!((erfc(0.5) - 0.479_500_122).abs() < 2e-7);
        assert!((erfc(1.0) - 0.157_299_207).abs() < 2e-7);
        assert!((erfc(2.0) - 0.004_677_735).abs() < 2e-7);
        assert!((erfc(-1.0) - 1.842_700_793).abs() < 2e-7);
        assert!((erf(1.0) - 0.842_700_793).abs() < 2e-7);
    }

    #[test]
    fn lennard_jones_at_minimum_distance_returns_negative_well_depth_and_no_force() {
        let sigma: f64 = 0.3;
        let epsilon = 0.5;
        let a = 4.0 * epsilon * sigma.powi(12);
        let b = 4.0 * epsilon * sigma.powi(6);
        let r_min = 2f64.powf(1.0 / 6.0) * sigma;
        let (energy, f_over_r) = lennard_jones_12_6(r_min, a, b);
        assert!(f64_approx_equal(energy, -epsilon));
        assert!(f_over_r.abs() < 1e-6);
    }

    #[test]
    fn lennard_jones_force_is_negative_energy_derivative() {
        let (a, b) = (1e-6, 2e-3);
        let r = 0.35;
        let h = 1e-6;
        let (_, f_over_r) = lennard_jones_12_6(r, a, b);
        let numeric = -(lennard_jones_12_6(r + h, a, b).0 - lennard_jones_12_6(r - h, a, b).0) / (2.0 * h);
        assert!((f_over_r * r - numeric).abs() < 1e-5);
    }

    #[test]
    fn coulomb_calculates_repulsive_and_attractive_energy() {
        assert!(f64_approx_equal(coulomb(1.0, 1.0, 1.0), COULOMB_CONSTANT));
        assert!(f64_approx_equal(coulomb(2.0, 1.0, -1.0), -COULOMB_CONSTANT / 2.0));
    }

    #[test]
    fn ewald_real_space_minus_exclusion_recovers_plain_coulomb() {
        let (r, qq, beta) = (0.25, -0.3, 3.12);
        let (real, real_f) = ewald_real_space(r, qq, beta);
        let (excl, excl_f) = ewald_exclusion_correction(r, qq, beta);
        assert!(f64_approx_equal(real - excl, coulomb(r, qq, 1.0)));
        let coulomb_f_over_r = COULOMB_CONSTANT * qq / (r * r * r);
        assert!((real_f - excl_f - coulomb_f_over_r).abs() < 1e-9 * coulomb_f_over_r.abs());
    }

    #[test]
    fn ewald_real_space_force_is_negative_energy_derivative() {
        let (qq, beta) = (0.417 * -0.834, 3.12);
        let r = 0.28;
        let h = 1e-6;
        let (_, f_over_r) = ewald_real_space(r, qq, beta);
        let numeric = -(ewald_real_space(r + h, qq, beta).0 - ewald_real_space(r - h, qq, beta).0) / (2.0 * h);
        assert!((f_over_r * r - numeric).abs() < 1e-3 * numeric.abs().max(1.0));
    }

    #[test]
    fn ewald_self_energy_scales_with_sum_of_squared_charges() {
        let energy = ewald_self_energy(&[-0.834, 0.417, 0.417], 3.0);
        let expected = -COULOMB_CONSTANT * 3.0 / PI.sqrt() * (0.834 * 0.834 + 2.0 * 0.417 * 0.417);
        assert!(f64_approx_equal(energy, expected));
    }

    #[test]
    fn harmonic_returns_energy_and_derivative() {
        let (energy, derivative) = harmonic(0.11, 0.1, 1000.0);
        assert!(f64_approx_equal(energy, 0.05));
        assert!(f64_approx_equal(derivative, 10.0));
    }
}
