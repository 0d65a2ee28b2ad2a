use super::potentials::harmonic;
use super::system::ForceFieldSystem;
use crate::core::models::cell::PeriodicBox;
use nalgebra::Vector3;

/// Harmonic bond stretching. Returns the energy and adds forces.
pub fn bond_forces(
    system: &ForceFieldSystem,
    positions: &[Vector3<f64>],
    periodic_box: &PeriodicBox,
    forces: &mut [Vector3<f64>],
) -> f64 {
    let mut energy = 0.0;
    for bond in &system.bonds {
        let delta = periodic_box.minimum_image(positions[bond.atom1] - positions[bond.atom2]);
        let r = delta.norm();
        let (e, de_dr) = harmonic(r, bond.r0, bond.k);
        energy += e;
        if r > 0.0 {
            let force = delta * (-de_dr / r);
            forces[bond.atom1] += force;
            forces[bond.atom2] -= force;
        }
    }
    energy
}

/// Harmonic angle bending. Returns the energy and adds forces.
pub fn angle_forces(
    system: &ForceFieldSystem,
    positions: &[Vector3<f64>],
    periodic_box: &PeriodicBox,
    forces: &mut [Vector3<f64>],
) -> f64 {
    let mut energy = 0.0;
    for angle in &system.angles {
        let a = periodic_box.minimum_image(positions[angle.atom1] - positions[angle.atom2]);
        let b = periodic_box.minimum_image(positions[angle.atom3] - positions[angle.atom2]);
        let (ra, rb) = (a.norm(), b.norm());
        if ra == 0.0 || rb == 0.0 {
            continue;
        }
        let cos_theta = (a.dot(&b) / (ra * rb)).clamp(-1.0, 1.0);
        let theta = cos_theta.acos();
        let (e, de_dtheta) = harmonic(theta, angle.theta0, angle.k);
        energy += e;

        let sin_theta = (1.0 - cos_theta * cos_theta).sqrt().max(1e-8);
        // dθ/da = -(b̂ - cosθ·â) / (ra·sinθ), same for b with roles swapped.
        let a_hat = a / ra;
        let b_hat = b / rb;
        let da = (b_hat - a_hat * cos_theta) * (-1.0 / (ra * sin_theta));
        let db = (a_hat - b_hat * cos_theta) * (-1.0 / (rb * sin_theta));
        let f1 = da * (-de_dtheta);
        let f3 = db * (-de_dtheta);
        forces[angle.atom1] += f1;
        forces[angle.atom3] += f3;
        forces[angle.atom2] -= f1 + f3;
    }
    energy
}
