use crate::core::io::traits::MolecularFile;
use crate::core::models::cell::{InvalidBoxError, PeriodicBox};
use crate::core::models::state::State;
use nalgebra::Vector3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const ANGSTROM_TO_NM: f64 = 0.1;
/// Amber time unit: velocities are stored in Å per (1/20.455) ps.
const AMBER_VELOCITY_SCALE: f64 = 20.455;
const FIELD_WIDTH: usize = 12;
const FIELDS_PER_LINE: usize = 6;

/// Coordinates (and optionally velocities and box) of an Amber coordinate/restart file,
/// converted to nm and nm/ps.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinates {
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Option<Vec<Vector3<f64>>>,
    pub periodic_box: Option<PeriodicBox>,
}

impl Coordinates {
    pub fn atom_count(&self) -> usize {
        self.positions.len()
    }

    pub fn check_atom_count(&self, expected: usize) -> Result<(), InpcrdError> {
        if self.atom_count() != expected {
            return Err(InpcrdError::Inconsistency(format!(
                "Coordinate file holds {} atoms but the topology has {}",
                self.atom_count(),
                expected
            )));
        }
        Ok(())
    }

    /// Turns the coordinates into a simulation state.
    ///
    /// The box recorded in the coordinate file wins over `fallback_box` (usually the
    /// topology's `BOX_DIMENSIONS`). A box is mandatory for periodic simulations.
    pub fn into_state(self, fallback_box: Option<PeriodicBox>) -> Result<State, InpcrdError> {
        let periodic_box = self
            .periodic_box
            .or(fallback_box)
            .ok_or_else(|| InpcrdError::MissingRecord("periodic box dimensions".to_string()))?;
        let state = State::new(self.positions, periodic_box);
        Ok(match self.velocities {
            Some(velocities) => state.with_velocities(velocities),
            None => state,
        })
    }

    pub fn from_state(state: &State) -> Self {
        Self {
            positions: state.positions.clone(),
            velocities: Some(state.velocities.clone()),
            periodic_box: Some(state.periodic_box),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InpcrdMetadata {
    pub title: String,
    /// Simulation time in ps, present in restart files.
    pub time: Option<f64>,
}

#[derive(Debug, Error)]
pub enum InpcrdError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: InpcrdParseErrorKind },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Missing required record: {0}")]
    MissingRecord(String),
    #[error(transparent)]
    Box(#[from] InvalidBoxError),
}

#[derive(Debug, Error)]
pub enum InpcrdParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidAtomCount(String),
    #[error("Invalid time '{0}'")]
    InvalidTime(String),
    #[error("Invalid float in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
}

/// Amber ASCII coordinate (`.inpcrd`) and restart (`.rst7`) files.
pub struct InpcrdFile;

fn parse_fixed_width(line: &str, line_num: usize, values: &mut Vec<f64>) -> Result<(), InpcrdError> {
    for k in 0..FIELDS_PER_LINE {
        let start = k * FIELD_WIDTH;
        if start >= line.len() {
            break;
        }
        let end = (start + FIELD_WIDTH).min(line.len());
        let field = line.get(start..end).unwrap_or("").trim();
        if field.is_empty() {
            continue;
        }
        let value = field.parse::<f64>().map_err(|_| InpcrdError::Parse {
            line: line_num,
            kind: InpcrdParseErrorKind::InvalidFloat {
                columns: format!("{}-{}", start + 1, end),
                value: field.to_string(),
            },
        })?;
        values.push(value);
    }
    Ok(())
}

fn to_vectors(values: &[f64], scale: f64) -> Vec<Vector3<f64>> {
    values
        .chunks_exact(3)
        .map(|c| Vector3::new(c[0], c[1], c[2]) * scale)
        .collect()
}

impl MolecularFile for InpcrdFile {
    type Content = Coordinates;
    type Metadata = InpcrdMetadata;
    type Error = InpcrdError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Coordinates, InpcrdMetadata), InpcrdError> {
        let mut lines = reader.lines();

        let title = lines
            .next()
            .ok_or_else(|| InpcrdError::MissingRecord("title line".to_string()))??;
        let header = lines
            .next()
            .ok_or_else(|| InpcrdError::MissingRecord("atom count line".to_string()))??;

        let mut header_fields = header.split_whitespace();
        let count_str = header_fields.next().unwrap_or("");
        let natom: usize = count_str.parse().map_err(|_| InpcrdError::Parse {
            line: 2,
            kind: InpcrdParseErrorKind::InvalidAtomCount(count_str.to_string()),
        })?;
        let time = header_fields
            .next()
            .map(|t| {
                t.parse::<f64>().map_err(|_| InpcrdError::Parse {
                    line: 2,
                    kind: InpcrdParseErrorKind::InvalidTime(t.to_string()),
                })
            })
            .transpose()?;

        // Coordinates and velocities each fill ceil(natom / 2) lines; the box is one line.
        let mut data_lines: Vec<Vec<f64>> = Vec::new();
        for (offset, line_res) in lines.enumerate() {
            let line = line_res?;
            if line.trim().is_empty() {
                continue;
            }
            let mut values = Vec::with_capacity(FIELDS_PER_LINE);
            parse_fixed_width(&line, offset + 3, &mut values)?;
            data_lines.push(values);
        }

        let n = 3 * natom;
        let lines_per_set = n.div_ceil(FIELDS_PER_LINE);
        let block = |lines: &[Vec<f64>], what: &str| -> Result<Vec<f64>, InpcrdError> {
            let values: Vec<f64> = lines.iter().flatten().copied().collect();
            if values.len() != n {
                return Err(InpcrdError::Inconsistency(format!(
                    "Expected {} {} values for {} atoms, found {}",
                    n,
                    what,
                    natom,
                    values.len()
                )));
            }
            Ok(values)
        };

        let split = lines_per_set.min(data_lines.len());
        let (coordinate_lines, trailing) = data_lines.split_at(split);
        let positions = to_vectors(&block(coordinate_lines, "coordinate")?, ANGSTROM_TO_NM);

        // A single trailing line is read as the box, also for one- or two-atom systems
        // where it could hold velocities.
        let (velocities, box_values) = match trailing.len() {
            0 => (None, None),
            1 => (None, Some(&trailing[0])),
            len if len == lines_per_set => (Some(block(trailing, "velocity")?), None),
            len if len == lines_per_set + 1 => (
                Some(block(&trailing[..lines_per_set], "velocity")?),
                Some(&trailing[lines_per_set]),
            ),
            len => {
                return Err(InpcrdError::Inconsistency(format!(
                    "{} trailing lines after coordinates; expected velocities and/or a box",
                    len
                )));
            }
        };
        if let Some(b) = box_values {
            if b.len() != 3 && b.len() != 6 {
                return Err(InpcrdError::Inconsistency(format!(
                    "Box line holds {} values; expected 3 or 6",
                    b.len()
                )));
            }
        }

        let velocities = velocities.map(|v| to_vectors(&v, AMBER_VELOCITY_SCALE * ANGSTROM_TO_NM));
        let periodic_box = match box_values {
            Some(b) => {
                if b.len() == 6 && b[3..].iter().any(|angle| (angle - 90.0).abs() > 1e-3) {
                    return Err(InpcrdError::Inconsistency(format!(
                        "Only orthorhombic boxes are supported (angles {:?})",
                        &b[3..]
                    )));
                }
                Some(PeriodicBox::new(
                    b[0] * ANGSTROM_TO_NM,
                    b[1] * ANGSTROM_TO_NM,
                    b[2] * ANGSTROM_TO_NM,
                )?)
            }
            None => None,
        };

        Ok((
            Coordinates {
                positions,
                velocities,
                periodic_box,
            },
            InpcrdMetadata {
                title: title.trim_end().to_string(),
                time,
            },
        ))
    }

    fn write_to(
        coordinates: &Coordinates,
        metadata: &InpcrdMetadata,
        writer: &mut impl Write,
    ) -> Result<(), InpcrdError> {
        writeln!(writer, "{}", metadata.title)?;
        match metadata.time {
            Some(time) => writeln!(writer, "{:6}{:15.7}", coordinates.atom_count(), time)?,
            None => writeln!(writer, "{:6}", coordinates.atom_count())?,
        }

        let mut write_block = |vectors: &[Vector3<f64>], scale: f64| -> io::Result<()> {
            let flat: Vec<f64> = vectors.iter().flat_map(|v| [v.x, v.y, v.z]).collect();
            for chunk in flat.chunks(FIELDS_PER_LINE) {
                let line: String = chunk.iter().map(|x| format!("{:12.7}", x * scale)).collect();
                writeln!(writer, "{}", line)?;
            }
            Ok(())
        };

        write_block(&coordinates.positions, 1.0 / ANGSTROM_TO_NM)?;
        if let Some(velocities) = &coordinates.velocities {
            write_block(velocities, 1.0 / (AMBER_VELOCITY_SCALE * ANGSTROM_TO_NM))?;
        }
        if let Some(periodic_box) = &coordinates.periodic_box {
            let l = periodic_box.lengths() / ANGSTROM_TO_NM;
            writeln!(
                writer,
                "{:12.7}{:12.7}{:12.7}{:12.7}{:12.7}{:12.7}",
                l.x, l.y, l.z, 90.0, 90.0, 90.0
            )?;
        }
        Ok(())
    }
}
