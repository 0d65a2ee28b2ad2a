use thiserror::Error;

/// Harmonic bond type, `E = ½·k·(r − r0)²`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondType {
    /// Force constant in kJ/mol/nm².
    pub k: f64,
    /// Equilibrium length in nm.
    pub r0: f64,
}

/// Harmonic angle type, `E = ½·k·(θ − θ0)²`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleType {
    /// Force constant in kJ/mol/rad².
    pub k: f64,
    /// Equilibrium angle in radians.
    pub theta0: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("Lennard-Jones table for {n_types} types needs {expected} coefficients, got {found}")]
    TableSize {
        n_types: usize,
        expected: usize,
        found: usize,
    },
    #[error("Lennard-Jones type index {index} is out of range for {n_types} types")]
    TypeOutOfRange { index: usize, n_types: usize },
}

/// Pairwise Lennard-Jones coefficients in the `A/r¹² − B/r⁶` form.
///
/// `A` is stored in kJ/mol·nm¹² and `B` in kJ/mol·nm⁶. The table is symmetric and dense;
/// water models have two or three types, so there is no point in anything cleverer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LennardJonesTable {
    n_types: usize,
    acoef: Vec<f64>,
    bcoef: Vec<f64>,
}

impl LennardJonesTable {
    pub fn new(n_types: usize) -> Self {
        Self {
            n_types,
            acoef: vec![0.0; n_types * n_types],
            bcoef: vec![0.0; n_types * n_types],
        }
    }

    /// Builds a table from full row-major `n_types × n_types` coefficient matrices.
    pub fn from_matrices(n_types: usize, acoef: Vec<f64>, bcoef: Vec<f64>) -> Result<Self, ParamError> {
        let expected = n_types * n_types;
        for found in [acoef.len(), bcoef.len()] {
            if found != expected {
                return Err(ParamError::TableSize {
                    n_types,
                    expected,
                    found,
                });
            }
        }
        Ok(Self {
            n_types,
            acoef,
            bcoef,
        })
    }

    /// Builds a table from per-type `(σ [nm], ε [kJ/mol])` using Lorentz-Berthelot rules.
    pub fn from_sigma_epsilon(types: &[(f64, f64)]) -> Self {
        let mut table = Self::new(types.len());
        for (i, &(sigma_i, eps_i)) in types.iter().enumerate() {
            for (j, &(sigma_j, eps_j)) in types.iter().enumerate() {
                let sigma = 0.5 * (sigma_i + sigma_j);
                let epsilon = (eps_i * eps_j).sqrt();
                let s6 = sigma.powi(6);
                table.acoef[i * table.n_types + j] = 4.0 * epsilon * s6 * s6;
                table.bcoef[i * table.n_types + j] = 4.0 * epsilon * s6;
            }
        }
        table
    }

    pub fn n_types(&self) -> usize {
        self.n_types
    }

    pub fn set(&mut self, i: usize, j: usize, a: f64, b: f64) -> Result<(), ParamError> {
        self.check_index(i)?;
        self.check_index(j)?;
        self.acoef[i * self.n_types + j] = a;
        self.acoef[j * self.n_types + i] = a;
        self.bcoef[i * self.n_types + j] = b;
        self.bcoef[j * self.n_types + i] = b;
        Ok(())
    }

    /// Returns `(A, B)` for a pair of type indices.
    #[inline]
    pub fn coefficients(&self, i: usize, j: usize) -> (f64, f64) {
        let idx = i * self.n_types + j;
        (self.acoef[idx], self.bcoef[idx])
    }

    fn check_index(&self, index: usize) -> Result<(), ParamError> {
        if index >= self.n_types {
            return Err(ParamError::TypeOutOfRange {
                index,
                n_types: self.n_types,
            });
        }
        Ok(())
    }
}

/// Force-field parameter tables referenced by index from the topology.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForceFieldParameters {
    pub bond_types: Vec<BondType>,
    pub angle_types: Vec<AngleType>,
    pub lennard_jones: LennardJonesTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn from_matrices_rejects_wrong_size() {
        let err = LennardJonesTable::from_matrices(2, vec![0.0; 4], vec![0.0; 3]).unwrap_err();
        assert_eq!(
            err,
            ParamError::TableSize {
                n_types: 2,
                expected: 4,
                found: 3
            }
        );
    }

    #[test]
    fn from_sigma_epsilon_reproduces_minimum_at_two_to_one_sixth_sigma() {
        let sigma = 0.315;
        let epsilon = 0.636;
        let table = LennardJonesTable::from_sigma_epsilon(&[(sigma, epsilon)]);
        let (a, b) = table.coefficients(0, 0);
        let r_min = 2f64.powf(1.0 / 6.0) * sigma;
        let energy = a / r_min.powi(12) - b / r_min.powi(6);
        assert!(f64_approx_equal(energy, -epsilon));
    }

    #[test]
    fn from_sigma_epsilon_gives_zero_for_massless_type() {
        let table = LennardJonesTable::from_sigma_epsilon(&[(0.315, 0.636), (0.0, 0.0)]);
        assert_eq!(table.coefficients(0, 1), (0.0, 0.0));
        assert_eq!(table.coefficients(1, 1), (0.0, 0.0));
    }

    #[test]
    fn set_is_symmetric_and_checks_bounds() {
        let mut table = LennardJonesTable::new(2);
        table.set(0, 1, 3.0, 4.0).unwrap();
        assert_eq!(table.coefficients(1, 0), (3.0, 4.0));
        assert!(matches!(
            table.set(0, 2, 1.0, 1.0),
            Err(ParamError::TypeOutOfRange { index: 2, .. })
        ));
    }
}
