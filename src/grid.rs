// uniform grid hashing
use glam::{IVec3, Vec3};

use crate::params::SimulationParameters;

/// Cell containing `p`. Not clamped: a particle that strayed outside the
/// box before the integrator clamped it lands in an out-of-range cell.
#[inline]
pub fn calc_grid_pos(p: Vec3, params: &SimulationParameters) -> IVec3 {
    ((p - params.world_min()) / params.cell_size())
        .floor()
        .as_ivec3()
}

/// Clamp a (possibly out-of-range) cell into the grid.
#[inline]
pub fn clamp_cell(cell: IVec3, params: &SimulationParameters) -> IVec3 {
    cell.clamp(IVec3::ZERO, params.grid_size() - IVec3::ONE)
}

/// Linear cell id in `[0, num_cells)`.
#[inline]
pub fn hash_grid_pos(cell: IVec3, params: &SimulationParameters) -> u32 {
    let g = params.grid_size();
    let c = clamp_cell(cell, params);
    (c.x + g.x * (c.y + g.y * c.z)) as u32
}

/// Hash of the cell containing `p`.
#[inline]
pub fn hash_position(p: Vec3, params: &SimulationParameters) -> u32 {
    hash_grid_pos(calc_grid_pos(p, params), params)
}

/// Cells of the 3x3x3 block around `cell`, clipped to the grid, so edge
/// cells yield fewer than 27 hashes and none twice.
pub fn neighbor_hashes(
    cell: IVec3,
    params: &SimulationParameters,
) -> impl Iterator<Item = u32> + '_ {
    let c = clamp_cell(cell, params);
    let lo = clamp_cell(c - IVec3::ONE, params);
    let hi = clamp_cell(c + IVec3::ONE, params);
    (lo.z..=hi.z).flat_map(move |z| {
        (lo.y..=hi.y).flat_map(move |y| {
            (lo.x..=hi.x).map(move |x| hash_grid_pos(IVec3::new(x, y, z), params))
        })
    })
}
