// sort stage: hash, sort, gather into cell order, rebuild cell ranges
use crate::cpu::transform::CpuTransform;
use crate::grid::hash_position;
use crate::params::SimulationParameters;
use crate::sort::KeyIndexSorter;
use crate::store::{CellRange, ParticleStore};

/// Fill `hashes` from the current positions and reset `indices` to identity.
pub fn calc_hash(store: &mut ParticleStore, params: &SimulationParameters, exec: CpuTransform) {
    let positions = store.positions.current();
    exec.map2(&mut store.hashes, &mut store.indices, |i| {
        (hash_position(positions[i].truncate(), params), i as u32)
    });
}

/// Half-open ranges from hash transitions in an ascending hash array.
/// `ranges` is cleared first so untouched cells stay `{0, 0}`.
pub fn derive_cell_ranges(hashes: &[u32], ranges: &mut [CellRange]) {
    ranges.fill(CellRange::EMPTY);
    let n = hashes.len();

    for (i, &hash) in hashes.iter().enumerate() {
        // hash[-1] acts as an invalid sentinel
        let prev = if i == 0 { None } else { Some(hashes[i - 1]) };
        if prev != Some(hash) {
            ranges[hash as usize].start = i as u32;
            if let Some(prev) = prev {
                ranges[prev as usize].end = i as u32;
            }
        }
        if i == n - 1 {
            ranges[hash as usize].end = n as u32;
        }
    }
}

/// Gather positions and velocities into sorted order, derive the cell
/// table and flip both buffer pairs so "current" is the ordered data.
pub fn reorder(store: &mut ParticleStore, exec: CpuTransform) {
    let gather = &store.indices;
    let (pos_in, pos_out) = store.positions.split();
    let (vel_in, vel_out) = store.velocities.split();

    exec.map2(pos_out, vel_out, |i| {
        let src = gather[i] as usize;
        (pos_in[src], vel_in[src])
    });

    derive_cell_ranges(&store.hashes, &mut store.cell_ranges);

    store.positions.swap();
    store.velocities.swap();
}

/// Whole sort stage.
pub fn sort_particles(
    store: &mut ParticleStore,
    params: &SimulationParameters,
    sorter: &dyn KeyIndexSorter,
    exec: CpuTransform,
) {
    store.ensure_cells(params.num_cells());
    if store.is_empty() {
        store.cell_ranges.fill(CellRange::EMPTY);
        return;
    }

    calc_hash(store, params, exec);
    sorter.sort(&mut store.hashes, &mut store.indices);
    reorder(store, exec);
}
