//! DCD trajectories through `bio_files`, with a conversion layer between its frames and
//! the [`Frame`] the analysis code works on.

use bio_files::dcd::{DcdFrame, DcdTrajectory, DcdUnitCell};
use lin_alg::f32::Vec3;
use nalgebra::Vector3;
use std::path::Path;
use thiserror::Error;

const PS_TO_FS: f64 = 1000.0;

#[derive(Debug, Error)]
pub enum DcdError {
    #[error("Failed to read trajectory '{path}': {message}")]
    Read { path: String, message: String },
    #[error("Failed to write trajectory '{path}': {message}")]
    Write { path: String, message: String },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
}

/// Orthorhombic unit cell of a frame, edge lengths in Å.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitCell {
    pub lengths: [f64; 3],
}

impl UnitCell {
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Self {
        Self { lengths: [a, b, c] }
    }

    pub fn volume(&self) -> f64 {
        self.lengths.iter().product()
    }

    fn is_valid(&self) -> bool {
        self.lengths.iter().all(|l| l.is_finite() && *l > 0.0)
    }
}

/// One trajectory frame. Positions are in Å, the trajectory file's native unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Simulation time in ps.
    pub time: f64,
    pub positions: Vec<Vector3<f64>>,
    pub unit_cell: Option<UnitCell>,
}

fn to_dcd_frame(frame: &Frame) -> DcdFrame {
    let [a, b, c] = frame.unit_cell.map_or([0.0; 3], |cell| cell.lengths);
    DcdFrame {
        time: frame.time * PS_TO_FS,
        atom_posits: frame
            .positions
            .iter()
            .map(|p| Vec3::new(p.x as f32, p.y as f32, p.z as f32))
            .collect(),
        unit_cell: DcdUnitCell {
            bounds_low: Vec3::new(0.0, 0.0, 0.0),
            bounds_high: Vec3::new(a as f32, b as f32, c as f32),
        },
    }
}

fn from_dcd_frame(frame: &DcdFrame) -> Frame {
    let low = &frame.unit_cell.bounds_low;
    let high = &frame.unit_cell.bounds_high;
    let cell = UnitCell::orthorhombic(
        (high.x - low.x) as f64,
        (high.y - low.y) as f64,
        (high.z - low.z) as f64,
    );
    Frame {
        time: frame.time / PS_TO_FS,
        positions: frame
            .atom_posits
            .iter()
            .map(|p| Vector3::new(p.x as f64, p.y as f64, p.z as f64))
            .collect(),
        unit_cell: cell.is_valid().then_some(cell),
    }
}

/// An in-memory trajectory. Every frame has the same atom count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    frames: Vec<Frame>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn atom_count(&self) -> Option<usize> {
        self.frames.first().map(|f| f.positions.len())
    }

    pub fn push(&mut self, frame: Frame) -> Result<(), DcdError> {
        if let Some(expected) = self.atom_count() {
            if frame.positions.len() != expected {
                return Err(DcdError::Inconsistency(format!(
                    "frame {} has {} atoms, expected {}",
                    self.frames.len(),
                    frame.positions.len(),
                    expected
                )));
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DcdError> {
        let path = path.as_ref();
        let dcd = DcdTrajectory::load(path).map_err(|e| DcdError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut trajectory = Self::new();
        for frame in &dcd.frames {
            trajectory.push(from_dcd_frame(frame))?;
        }
        Ok(trajectory)
    }

    /// Writes every frame, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), DcdError> {
        let path = path.as_ref();
        let dcd = DcdTrajectory {
            frames: self.frames.iter().map(to_dcd_frame).collect(),
        };
        dcd.save(path).map_err(|e| DcdError::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

impl IntoIterator for Trajectory {
    type Item = Frame;
    type IntoIter = std::vec::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn frame(offset: f64, edge: f64) -> Frame {
        Frame {
            time: offset,
            positions: vec![
                Vector3::new(offset, 1.0, 2.0),
                Vector3::new(3.0, offset, 5.0),
                Vector3::new(6.0, 7.0, offset),
            ],
            unit_cell: Some(UnitCell::orthorhombic(edge, edge + 1.0, edge + 2.0)),
        }
    }

    #[test]
    fn save_then_load_preserves_frames_and_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("traj.dcd");
        let mut trajectory = Trajectory::new();
        for k in 0..4 {
            trajectory.push(frame(k as f64 * 0.5, 20.0 + k as f64)).unwrap();
        }
        trajectory.save(&path).unwrap();

        let loaded = Trajectory::load(&path).unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.atom_count(), Some(3));
        for (read, written) in loaded.frames().iter().zip(trajectory.frames()) {
            for (a, b) in read.positions.iter().zip(&written.positions) {
                assert!((a - b).norm() < 1e-4);
            }
            let (ra, wa) = (read.unit_cell.unwrap(), written.unit_cell.unwrap());
            for k in 0..3 {
                assert!((ra.lengths[k] - wa.lengths[k]).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn push_rejects_frames_with_a_different_atom_count() {
        let mut trajectory = Trajectory::new();
        trajectory.push(frame(0.0, 20.0)).unwrap();
        let mut short = frame(1.0, 20.0);
        short.positions.pop();
        assert!(matches!(trajectory.push(short), Err(DcdError::Inconsistency(_))));
        assert_eq!(trajectory.len(), 1);
    }

    #[test]
    fn missing_cell_converts_to_empty_bounds_and_back() {
        let bare = Frame {
            unit_cell: None,
            ..frame(0.0, 10.0)
        };
        assert_eq!(from_dcd_frame(&to_dcd_frame(&bare)).unit_cell, None);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Trajectory::load(dir.path().join("absent.dcd")),
            Err(DcdError::Read { .. })
        ));
    }

    #[test]
    fn unit_cell_volume_is_product_of_edges() {
        assert!((UnitCell::orthorhombic(2.0, 3.0, 4.0).volume() - 24.0).abs() < 1e-12);
    }
}
