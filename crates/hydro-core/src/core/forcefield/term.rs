use std::ops::{Add, AddAssign};

/// Potential energy split by interaction type, in kJ/mol.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyTerm {
    pub bond: f64,
    pub angle: f64,
    /// Lennard-Jones, including the long-range dispersion correction.
    pub vdw: f64,
    /// Electrostatics: real space, reciprocal space, exclusion and self terms.
    pub coulomb: f64,
}

impl EnergyTerm {
    pub fn new(bond: f64, angle: f64, vdw: f64, coulomb: f64) -> Self {
        Self {
            bond,
            angle,
            vdw,
            coulomb,
        }
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.bond + self.angle + self.vdw + self.coulomb
    }

    pub fn is_finite(&self) -> bool {
        self.total().is_finite()
    }
}

impl Add for EnergyTerm {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            bond: self.bond + rhs.bond,
            angle: self.angle + rhs.angle,
            vdw: self.vdw + rhs.vdw,
            coulomb: self.coulomb + rhs.coulomb,
        }
    }
}

impl AddAssign for EnergyTerm {
    fn add_assign(&mut self, rhs: Self) {
        self.bond += rhs.bond;
        self.angle += rhs.angle;
        self.vdw += rhs.vdw;
        self.coulomb += rhs.coulomb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_energy_term_with_specified_values() {
        let term = EnergyTerm::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(term.bond, 1.0);
        assert_eq!(term.angle, 2.0);
        assert_eq!(term.vdw, 3.0);
        assert_eq!(term.coulomb, 4.0);
    }

    #[test]
    fn total_returns_sum_of_all_terms() {
        let term = EnergyTerm::new(1.5, 0.5, -2.0, 0.25);
        assert_eq!(term.total(), 0.25);
    }

    #[test]
    fn add_and_add_assign_sum_each_field() {
        let a = EnergyTerm::new(1.0, 2.0, 3.0, 4.0);
        let b = EnergyTerm::new(4.0, 5.0, 6.0, -7.0);
        assert_eq!(a + b, EnergyTerm::new(5.0, 7.0, 9.0, -3.0));
        let mut c = a;
        c += b;
        assert_eq!(c, a + b);
    }

    #[test]
    fn is_finite_detects_blow_up() {
        assert!(EnergyTerm::default().is_finite());
        assert!(!EnergyTerm::new(0.0, 0.0, f64::INFINITY, 0.0).is_finite());
        assert!(!EnergyTerm::new(f64::NAN, 0.0, 0.0, 0.0).is_finite());
    }
}
