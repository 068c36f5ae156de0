use bytemuck::{Pod, Zeroable};

use crate::params::{SimulationParameters, TangentialMode};

// plain arrays instead of glam so the layout matches WGSL exactly
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuSimParams {
    pub world_min: [f32; 4],
    pub world_max: [f32; 4],
    pub cell_size: [f32; 4],
    pub grid_size: [i32; 4],
    pub gravity: [f32; 4],
    pub collider: [f32; 4], // xyz centre, w radius (0 = none)
    pub particle_radius: f32,
    pub delta_time: f32,
    pub global_damping: f32,
    pub spring: f32,
    pub damping: f32,
    pub shear: f32,
    pub attraction: f32,
    pub boundary_damping: f32,
    pub num_bodies: u32,
    pub num_cells: u32,
    pub padded_len: u32,
    pub tangential_mode: u32, // 0 observed, 1 projected
}

impl GpuSimParams {
    pub fn new(params: &SimulationParameters, num_bodies: u32, padded_len: u32) -> Self {
        let collider = params
            .collider
            .map(|c| c.center.extend(c.radius).to_array())
            .unwrap_or([0.0; 4]);
        Self {
            world_min: params.world_min().extend(0.0).to_array(),
            world_max: params.world_max().extend(0.0).to_array(),
            cell_size: params.cell_size().extend(0.0).to_array(),
            grid_size: params.grid_size().extend(0).to_array(),
            gravity: params.gravity.extend(0.0).to_array(),
            collider,
            particle_radius: params.particle_radius(),
            delta_time: params.delta_time,
            global_damping: params.global_damping,
            spring: params.spring,
            damping: params.damping,
            shear: params.shear,
            attraction: params.attraction,
            boundary_damping: params.boundary_damping,
            num_bodies,
            num_cells: params.num_cells() as u32,
            padded_len,
            tangential_mode: match params.tangential_mode {
                TangentialMode::Observed => 0,
                TangentialMode::Projected => 1,
            },
        }
    }
}

/// One bitonic compare-exchange pass, bound with a dynamic offset.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuSortStep {
    pub j: u32,
    pub k: u32,
    pub _pad: [u32; 2],
}
