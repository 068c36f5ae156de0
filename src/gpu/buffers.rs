use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use bevy::log::debug;
use bevy::render::render_resource::{
    BindGroup, BindGroupEntry, BindGroupLayout, BindingResource, Buffer, BufferAsyncError,
    BufferBinding, BufferDescriptor, BufferSize, BufferUsages, Maintain, MapMode,
};
use bevy::render::renderer::RenderDevice;
use bytemuck::Pod;

use crate::error::SimError;
use crate::gpu::context::GpuContext;
use crate::gpu::ffi::GpuSimParams;
use crate::store::CellRange;

// ==================== sizes ==========================================

pub const VEC4_BYTES: u64 = 16;
pub const U32_BYTES: u64 = 4;
pub const CELL_BYTES: u64 = std::mem::size_of::<CellRange>() as u64;
/// Stride between bitonic step uniforms (default min uniform offset alignment).
pub const SORT_STEP_STRIDE: u64 = 256;

// ==================== resources ======================================

/// Storage for one particle count / cell count. Reallocated by
/// `ensure_buffers` whenever either grows.
pub struct ParticleBuffers {
    pub params: Buffer,
    pub pos_in: Buffer,
    pub vel_in: Buffer,
    pub pos_out: Buffer,
    pub vel_out: Buffer,
    pub hashes: Buffer,
    pub indices: Buffer,
    pub cells: Buffer,
    pub sort_steps: Buffer,
    pub staging: Buffer,
    pub particle_bind_group: BindGroup,
    pub sort_bind_group: BindGroup,
    /// power-of-two particle capacity
    pub capacity: u32,
    pub cell_capacity: u32,
    pub sort_step_capacity: u32,
}

fn storage(device: &RenderDevice, label: &str, size: u64) -> Buffer {
    device.create_buffer(&BufferDescriptor {
        label: Some(label),
        size: size.max(16),
        usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    })
}

/// Largest single storage binding (the cell table or one particle array)
/// and the staging buffer size for a particle / cell count.
pub fn required_bytes(num_bodies: u32, num_cells: u32) -> (u64, u64) {
    let n = u64::from(num_bodies.max(1).next_power_of_two());
    let cells = u64::from(num_cells.max(1)) * CELL_BYTES;
    let binding = (n * VEC4_BYTES).max(cells);
    let staging = 2 * n * VEC4_BYTES + 2 * n * U32_BYTES + cells;
    (binding, staging)
}

/// Bitonic passes for `padded` elements: sum over k = 2..=padded of log2(k).
pub fn sort_step_count(padded: u32) -> u32 {
    let m = padded.max(1).trailing_zeros();
    m * (m + 1) / 2
}

impl ParticleBuffers {
    pub fn new(
        ctx: &GpuContext,
        particle_layout: &BindGroupLayout,
        sort_layout: &BindGroupLayout,
        capacity: u32,
        cell_capacity: u32,
    ) -> Self {
        let device = &ctx.device;
        let capacity = capacity.max(1).next_power_of_two();
        let cell_capacity = cell_capacity.max(1);
        let sort_step_capacity = sort_step_count(capacity).max(1);

        let n = capacity as u64;
        let cells_bytes = cell_capacity as u64 * CELL_BYTES;

        let params = device.create_buffer(&BufferDescriptor {
            label: Some("particle_sim_params"),
            size: std::mem::size_of::<GpuSimParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let pos_in = storage(device, "particle_pos_in", n * VEC4_BYTES);
        let vel_in = storage(device, "particle_vel_in", n * VEC4_BYTES);
        let pos_out = storage(device, "particle_pos_out", n * VEC4_BYTES);
        let vel_out = storage(device, "particle_vel_out", n * VEC4_BYTES);
        let hashes = storage(device, "particle_hashes", n * U32_BYTES);
        let indices = storage(device, "particle_indices", n * U32_BYTES);
        let cells = storage(device, "particle_cell_ranges", cells_bytes);
        let sort_steps = device.create_buffer(&BufferDescriptor {
            label: Some("particle_sort_steps"),
            size: sort_step_capacity as u64 * SORT_STEP_STRIDE,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // big enough for the widest readback (sort stage)
        let (_, staging_bytes) = required_bytes(capacity, cell_capacity);
        let staging = device.create_buffer(&BufferDescriptor {
            label: Some("particle_readback"),
            size: staging_bytes,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let particle_bind_group = device.create_bind_group(
            "particle_bind_group",
            particle_layout,
            &[
                BindGroupEntry { binding: 0, resource: params.as_entire_binding() },
                BindGroupEntry { binding: 1, resource: pos_in.as_entire_binding() },
                BindGroupEntry { binding: 2, resource: vel_in.as_entire_binding() },
                BindGroupEntry { binding: 3, resource: pos_out.as_entire_binding() },
                BindGroupEntry { binding: 4, resource: vel_out.as_entire_binding() },
                BindGroupEntry { binding: 5, resource: hashes.as_entire_binding() },
                BindGroupEntry { binding: 6, resource: indices.as_entire_binding() },
                BindGroupEntry { binding: 7, resource: cells.as_entire_binding() },
            ],
        );

        let sort_bind_group = device.create_bind_group(
            "particle_sort_bind_group",
            sort_layout,
            &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(BufferBinding {
                    buffer: &sort_steps,
                    offset: 0,
                    size: BufferSize::new(SORT_STEP_STRIDE),
                }),
            }],
        );

        debug!(
            "particle buffers allocated: capacity {} cells {} sort steps {}",
            capacity, cell_capacity, sort_step_capacity
        );

        Self {
            params,
            pos_in,
            vel_in,
            pos_out,
            vel_out,
            hashes,
            indices,
            cells,
            sort_steps,
            staging,
            particle_bind_group,
            sort_bind_group,
            capacity,
            cell_capacity,
            sort_step_capacity,
        }
    }

    pub fn fits(&self, num_bodies: u32, num_cells: u32) -> bool {
        num_bodies <= self.capacity && num_cells <= self.cell_capacity
    }
}

// ==================== readback =======================================

/// One region of the staging buffer and where its bytes go.
pub struct Readback<'a> {
    pub offset: u64,
    pub dst: &'a mut [u8],
}

/// Block until the staging buffer is mapped, then copy every region out.
pub fn read_staging(
    ctx: &GpuContext,
    staging: &Buffer,
    regions: &mut [Readback<'_>],
) -> Result<(), SimError> {
    let end = regions
        .iter()
        .map(|r| r.offset + r.dst.len() as u64)
        .max()
        .unwrap_or(0);
    if end == 0 {
        return Ok(());
    }

    let slice = staging.slice(..end);
    let status = Arc::new(AtomicU8::new(0));
    let error = Arc::new(std::sync::Mutex::new(None));
    {
        let status = status.clone();
        let error = error.clone();
        slice.map_async(MapMode::Read, move |r| {
            let code = match r {
                Ok(()) => 1,
                Err(e) => {
                    if let Ok(mut slot) = error.lock() {
                        *slot = Some(e);
                    }
                    2
                }
            };
            status.store(code, Ordering::SeqCst);
        });
    }

    // fence: the stage's dispatches and copies have all completed after this
    ctx.device.poll(Maintain::Wait);

    if status.load(Ordering::SeqCst) != 1 {
        let err = error.lock().ok().and_then(|mut slot| slot.take());
        return Err(SimError::BufferMap(err.unwrap_or(BufferAsyncError)));
    }

    {
        let data = slice.get_mapped_range();
        for region in regions.iter_mut() {
            let start = region.offset as usize;
            let len = region.dst.len();
            region.dst.copy_from_slice(&data[start..start + len]);
        }
    }
    staging.unmap();
    Ok(())
}

/// Byte view of a Pod slice for readback targets.
#[inline]
pub fn bytes_mut<T: Pod>(slice: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(slice)
}
