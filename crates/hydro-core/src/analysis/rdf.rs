use super::AnalysisError;
use crate::core::io::dcd::{Frame, Trajectory};
use crate::core::models::cell::PeriodicBox;
use crate::core::models::topology::Topology;
use crate::engine::config::{RdfConfig, RdfPairConfig};
use rayon::prelude::*;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// A finished radial distribution function. Distances are in Å.
#[derive(Debug, Clone, PartialEq)]
pub struct RdfResult {
    pub label: String,
    /// Bin centres, one per bin.
    pub bins: Vec<f64>,
    /// Bin edges, one more than `bins`.
    pub edges: Vec<f64>,
    /// Raw pair counts summed over all frames.
    pub counts: Vec<f64>,
    pub rdf: Vec<f64>,
    pub frames: usize,
}

/// Histogram of distances between two atom groups, accumulated frame by frame.
///
/// Normalisation follows the usual intermolecular convention: the ideal-gas reference
/// uses the number of pairs that can actually be counted, so pairs inside one residue
/// are removed from the pair total when they are excluded from the histogram.
#[derive(Debug, Clone)]
pub struct InterRdf {
    label: String,
    reference: Vec<usize>,
    target: Vec<usize>,
    residue_of: Vec<usize>,
    exclude_same_residue: bool,
    atom_count: usize,
    edges: Vec<f64>,
    counts: Vec<u64>,
    volume_sum: f64,
    frames: usize,
    pair_count: f64,
}

impl InterRdf {
    pub fn new(topology: &Topology, pair: &RdfPairConfig, config: &RdfConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        let reference = topology.select(&pair.reference);
        if reference.is_empty() {
            return Err(AnalysisError::EmptySelection {
                selection: pair.reference.to_string(),
            });
        }
        let target = topology.select(&pair.target);
        if target.is_empty() {
            return Err(AnalysisError::EmptySelection {
                selection: pair.target.to_string(),
            });
        }
        let residue_of: Vec<usize> = topology.atoms().iter().map(|a| a.residue_index).collect();

        let width = (config.r_max - config.r_min) / config.bins as f64;
        let edges = (0..=config.bins)
            .map(|k| config.r_min + width * k as f64)
            .collect();
        let pair_count = countable_pairs(&reference, &target, &residue_of, config.exclude_same_residue);
        debug!(
            label = %pair.label,
            reference = reference.len(),
            target = target.len(),
            pair_count,
            "Prepared RDF"
        );

        Ok(Self {
            label: pair.label.clone(),
            reference,
            target,
            residue_of,
            exclude_same_residue: config.exclude_same_residue,
            atom_count: topology.atom_count(),
            edges,
            counts: vec![0; config.bins],
            volume_sum: 0.0,
            frames: 0,
            pair_count,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Adds the pair distances of one frame to the histogram.
    pub fn accumulate(&mut self, frame: &Frame) -> Result<(), AnalysisError> {
        let index = self.frames;
        if frame.positions.len() != self.atom_count {
            return Err(AnalysisError::AtomCountMismatch {
                frame: index,
                expected: self.atom_count,
                found: frame.positions.len(),
            });
        }
        let cell = frame
            .unit_cell
            .ok_or(AnalysisError::InvalidUnitCell { frame: index })?;
        let [a, b, c] = cell.lengths;
        let periodic_box = PeriodicBox::new(a, b, c).map_err(|_| AnalysisError::InvalidUnitCell { frame: index })?;

        let bins = self.counts.len();
        let r_min = self.edges[0];
        let r_max = self.edges[bins];
        let width = (r_max - r_min) / bins as f64;
        let positions = &frame.positions;

        let frame_counts = self
            .reference
            .par_iter()
            .fold(
                || vec![0u64; bins],
                |mut counts, &i| {
                    for &j in &self.target {
                        if i == j || (self.exclude_same_residue && self.residue_of[i] == self.residue_of[j]) {
                            continue;
                        }
                        let r = periodic_box.minimum_image(positions[j] - positions[i]).norm();
                        if r >= r_min && r < r_max {
                            let bin = (((r - r_min) / width) as usize).min(bins - 1);
                            counts[bin] += 1;
                        }
                    }
                    counts
                },
            )
            .reduce(
                || vec![0u64; bins],
                |mut a, b| {
                    a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                    a
                },
            );

        self.counts.iter_mut().zip(frame_counts).for_each(|(x, y)| *x += y);
        self.volume_sum += periodic_box.volume();
        self.frames += 1;
        Ok(())
    }

    /// Normalises the histogram by the ideal-gas pair density of the mean box.
    pub fn finish(self) -> Result<RdfResult, AnalysisError> {
        if self.frames == 0 {
            return Err(AnalysisError::NoFrames);
        }
        let frames = self.frames as f64;
        let density = self.pair_count / (self.volume_sum / frames);
        let bins: Vec<f64> = self.edges.windows(2).map(|e| 0.5 * (e[0] + e[1])).collect();
        let counts: Vec<f64> = self.counts.iter().map(|&c| c as f64).collect();
        let rdf = self
            .edges
            .windows(2)
            .zip(&counts)
            .map(|(e, &count)| {
                let shell = 4.0 / 3.0 * PI * (e[1].powi(3) - e[0].powi(3));
                let ideal = density * shell * frames;
                if ideal > 0.0 { count / ideal } else { 0.0 }
            })
            .collect();
        Ok(RdfResult {
            label: self.label,
            bins,
            edges: self.edges,
            counts,
            rdf,
            frames: self.frames,
        })
    }
}

/// Number of distinct ordered pairs the histogram can see.
fn countable_pairs(reference: &[usize], target: &[usize], residue_of: &[usize], exclude_same_residue: bool) -> f64 {
    let total = reference.len() as f64 * target.len() as f64;
    if exclude_same_residue {
        let mut per_residue: HashMap<usize, (usize, usize)> = HashMap::new();
        for &i in reference {
            per_residue.entry(residue_of[i]).or_default().0 += 1;
        }
        for &j in target {
            per_residue.entry(residue_of[j]).or_default().1 += 1;
        }
        let excluded: usize = per_residue.values().map(|(a, b)| a * b).sum();
        total - excluded as f64
    } else {
        let shared = reference.iter().filter(|&&i| target.binary_search(&i).is_ok()).count();
        total - shared as f64
    }
}

/// Computes one RDF per configured pair from every frame of a trajectory.
pub fn compute_rdfs(
    topology: &Topology,
    trajectory: &Trajectory,
    config: &RdfConfig,
) -> Result<Vec<RdfResult>, AnalysisError> {
    let mut rdfs = config
        .pairs
        .iter()
        .map(|pair| InterRdf::new(topology, pair, config))
        .collect::<Result<Vec<_>, _>>()?;

    for frame in trajectory.frames() {
        for rdf in &mut rdfs {
            rdf.accumulate(frame)?;
        }
    }

    let results = rdfs.into_iter().map(InterRdf::finish).collect::<Result<Vec<_>, _>>()?;
    if let Some(first) = results.first() {
        info!(
            pairs = results.len(),
            frames = first.frames,
            bins = first.bins.len(),
            "Computed radial distribution functions"
        );
    }
    Ok(results)
}

/// Writes `r` followed by one `g(r)` column per result.
pub fn write_rdf_table_to<W: Write>(writer: W, results: &[RdfResult]) -> Result<(), AnalysisError> {
    let export = |e: csv::Error| AnalysisError::Export {
        path: "<rdf table>".to_string(),
        message: e.to_string(),
    };
    let Some(first) = results.first() else {
        return Err(AnalysisError::InvalidRange("no RDF results to write".to_string()));
    };
    if results.iter().any(|r| r.bins != first.bins) {
        return Err(AnalysisError::InvalidRange(
            "RDF results use different bins and cannot share a table".to_string(),
        ));
    }

    let mut csv = csv::Writer::from_writer(writer);
    let mut header = vec!["r (Angstrom)".to_string()];
    header.extend(results.iter().map(|r| format!("g(r) {}", r.label)));
    csv.write_record(&header).map_err(export)?;
    for (k, r) in first.bins.iter().enumerate() {
        let mut row = vec![r.to_string()];
        row.extend(results.iter().map(|result| result.rdf[k].to_string()));
        csv.write_record(&row).map_err(export)?;
    }
    csv.flush().map_err(|e| AnalysisError::Export {
        path: "<rdf table>".to_string(),
        message: e.to_string(),
    })
}

pub fn write_rdf_table<P: AsRef<Path>>(path: P, results: &[RdfResult]) -> Result<(), AnalysisError> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).map_err(|e| AnalysisError::Export {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    write_rdf_table_to(std::io::BufWriter::new(file), results).map_err(|e| match e {
        AnalysisError::Export { message, .. } => AnalysisError::Export {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })
}
