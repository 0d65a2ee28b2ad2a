use nalgebra::Vector3;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("Invalid periodic box edge lengths: {0:?} (all must be finite and positive)")]
pub struct InvalidBoxError(pub [f64; 3]);

/// Orthorhombic periodic box, edge lengths in nm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicBox {
    lengths: Vector3<f64>,
}

impl PeriodicBox {
    pub fn new(a: f64, b: f64, c: f64) -> Result<Self, InvalidBoxError> {
        let valid = [a, b, c].iter().all(|l| l.is_finite() && *l > 0.0);
        if !valid {
            return Err(InvalidBoxError([a, b, c]));
        }
        Ok(Self {
            lengths: Vector3::new(a, b, c),
        })
    }

    pub fn cubic(edge: f64) -> Result<Self, InvalidBoxError> {
        Self::new(edge, edge, edge)
    }

    pub fn lengths(&self) -> Vector3<f64> {
        self.lengths
    }

    pub fn volume(&self) -> f64 {
        self.lengths.x * self.lengths.y * self.lengths.z
    }

    pub fn min_length(&self) -> f64 {
        self.lengths.min()
    }

    /// Returns the shortest periodic image of a displacement vector.
    #[inline]
    pub fn minimum_image(&self, mut delta: Vector3<f64>) -> Vector3<f64> {
        for k in 0..3 {
            let l = self.lengths[k];
            delta[k] -= l * (delta[k] / l).round();
        }
        delta
    }

    /// Maps a position into the primary cell `[0, L)`.
    #[inline]
    pub fn wrap(&self, mut position: Vector3<f64>) -> Vector3<f64> {
        for k in 0..3 {
            let l = self.lengths[k];
            position[k] -= l * (position[k] / l).floor();
        }
        position
    }

    /// Returns a box whose volume is scaled by `volume_factor`, keeping the aspect ratio.
    pub fn scaled_by_volume(&self, volume_factor: f64) -> Result<Self, InvalidBoxError> {
        let s = volume_factor.cbrt();
        Self::new(
            self.lengths.x * s,
            self.lengths.y * s,
            self.lengths.z * s,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn new_rejects_non_positive_or_non_finite_edges() {
        assert!(PeriodicBox::new(1.0, 0.0, 1.0).is_err());
        assert!(PeriodicBox::new(1.0, -2.0, 1.0).is_err());
        assert!(PeriodicBox::new(f64::NAN, 1.0, 1.0).is_err());
        assert!(PeriodicBox::new(1.0, 2.0, 3.0).is_ok());
    }

    #[test]
    fn volume_is_product_of_edges() {
        let cell = PeriodicBox::new(1.0, 2.0, 3.0).unwrap();
        assert!((cell.volume() - 6.0).abs() < TOLERANCE);
        assert_eq!(cell.min_length(), 1.0);
    }

    #[test]
    fn minimum_image_folds_displacements_into_half_box() {
        let cell = PeriodicBox::cubic(2.0).unwrap();
        let d = cell.minimum_image(Vector3::new(1.5, -1.7, 0.3));
        assert!((d.x - -0.5).abs() < TOLERANCE);
        assert!((d.y - 0.3).abs() < TOLERANCE);
        assert!((d.z - 0.3).abs() < TOLERANCE);
    }

    #[test]
    fn wrap_places_positions_inside_primary_cell() {
        let cell = PeriodicBox::new(2.0, 3.0, 4.0).unwrap();
        let p = cell.wrap(Vector3::new(-0.5, 7.0, 4.0));
        assert!((p.x - 1.5).abs() < TOLERANCE);
        assert!((p.y - 1.0).abs() < TOLERANCE);
        assert!(p.z.abs() < TOLERANCE);
    }

    #[test]
    fn scaled_by_volume_preserves_aspect_ratio() {
        let cell = PeriodicBox::new(1.0, 2.0, 4.0).unwrap();
        let scaled = cell.scaled_by_volume(8.0).unwrap();
        assert!((scaled.volume() - 64.0).abs() < 1e-9);
        assert!((scaled.lengths().y / scaled.lengths().x - 2.0).abs() < 1e-12);
    }
}
