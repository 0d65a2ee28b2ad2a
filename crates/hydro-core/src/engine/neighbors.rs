use crate::core::forcefield::system::ForceFieldSystem;
use crate::core::models::cell::PeriodicBox;
use nalgebra::Vector3;

/// Below this many cells along an axis the 27-cell stencil would visit the same cell twice.
const MIN_CELLS_PER_AXIS: usize = 3;

/// Non-excluded atom pairs `(i, j)`, `i < j`, closer than `cutoff` under minimum image.
///
/// Uses a cell list with cells at least `cutoff` wide; small boxes fall back to checking
/// every pair.
pub fn neighbor_pairs(
    system: &ForceFieldSystem,
    positions: &[Vector3<f64>],
    periodic_box: &PeriodicBox,
    cutoff: f64,
) -> Vec<(usize, usize)> {
    let lengths = periodic_box.lengths();
    let cells = [0, 1, 2].map(|k| (lengths[k] / cutoff).floor() as usize);
    if cells.iter().any(|&n| n < MIN_CELLS_PER_AXIS) {
        all_pairs(system, positions, periodic_box, cutoff)
    } else {
        cell_list_pairs(system, positions, periodic_box, cutoff, cells)
    }
}

fn within_cutoff(
    system: &ForceFieldSystem,
    positions: &[Vector3<f64>],
    periodic_box: &PeriodicBox,
    cutoff2: f64,
    i: usize,
    j: usize,
) -> bool {
    !system.is_excluded(i, j)
        && periodic_box
            .minimum_image(positions[i] - positions[j])
            .norm_squared()
            < cutoff2
}

fn all_pairs(
    system: &ForceFieldSystem,
    positions: &[Vector3<f64>],
    periodic_box: &PeriodicBox,
    cutoff: f64,
) -> Vec<(usize, usize)> {
    let cutoff2 = cutoff * cutoff;
    let n = positions.len();
    let mut pairs = Vec::new();
    for i in 0..n {
        for j in i + 1..n {
            if within_cutoff(system, positions, periodic_box, cutoff2, i, j) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

fn cell_list_pairs(
    system: &ForceFieldSystem,
    positions: &[Vector3<f64>],
    periodic_box: &PeriodicBox,
    cutoff: f64,
    cells: [usize; 3],
) -> Vec<(usize, usize)> {
    let cutoff2 = cutoff * cutoff;
    let lengths = periodic_box.lengths();
    let cell_index = |c: [usize; 3]| (c[0] * cells[1] + c[1]) * cells[2] + c[2];

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); cells[0] * cells[1] * cells[2]];
    let mut atom_cells = Vec::with_capacity(positions.len());
    for (atom, position) in positions.iter().enumerate() {
        let wrapped = periodic_box.wrap(*position);
        let c = [0, 1, 2].map(|k| ((wrapped[k] / lengths[k] * cells[k] as f64) as usize).min(cells[k] - 1));
        members[cell_index(c)].push(atom);
        atom_cells.push(c);
    }

    let mut pairs = Vec::new();
    for (i, c) in atom_cells.iter().enumerate() {
        for dx in [cells[0] - 1, 0, 1] {
            for dy in [cells[1] - 1, 0, 1] {
                for dz in [cells[2] - 1, 0, 1] {
                    let neighbor = [
                        (c[0] + dx) % cells[0],
                        (c[1] + dy) % cells[1],
                        (c[2] + dz) % cells[2],
                    ];
                    for &j in &members[cell_index(neighbor)] {
                        if j > i && within_cutoff(system, positions, periodic_box, cutoff2, i, j) {
                            pairs.push((i, j));
                        }
                    }
                }
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::parameterization::{SystemConfig, create_system};
    use crate::core::models::builder::WaterBoxBuilder;

    #[test]
    fn cell_list_matches_all_pairs_search() {
        let (topology, mut state) = WaterBoxBuilder::new(4).build().unwrap();
        // Shift a molecule across the boundary so wrapping is exercised.
        for position in state.positions.iter_mut().take(3) {
            position.x -= 0.2;
        }
        let system = create_system(&topology, &SystemConfig::default()).unwrap();
        let cutoff = 0.35;
        let lengths = state.periodic_box.lengths();
        assert!(lengths.x / cutoff >= 3.0);

        let mut fast = neighbor_pairs(&system, &state.positions, &state.periodic_box, cutoff);
        let mut slow = all_pairs(&system, &state.positions, &state.periodic_box, cutoff);
        fast.sort_unstable();
        slow.sort_unstable();
        assert!(!fast.is_empty());
        assert_eq!(fast, slow);
    }

    #[test]
    fn excluded_pairs_never_appear() {
        let (topology, state) = WaterBoxBuilder::new(2).build().unwrap();
        let system = create_system(&topology, &SystemConfig::default()).unwrap();
        let pairs = neighbor_pairs(&system, &state.positions, &state.periodic_box, 0.3);
        assert!(pairs.iter().all(|&(i, j)| i < j && !system.is_excluded(i, j)));
        assert!(!pairs.contains(&(0, 1)));
    }
}
