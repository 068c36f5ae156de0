//! GPU substrate: one WGSL module, one compute pipeline per kernel.
//!
//! | group | binding | buffer |
//! |-------|---------|--------|
//! | 0 | 0 | `SimParams` uniform |
//! | 0 | 1-4 | pos_in, vel_in, pos_out, vel_out |
//! | 0 | 5-6 | hashes, indices |
//! | 0 | 7 | cell ranges |
//! | 1 | 0 | bitonic step uniform (dynamic offset) |
//!
//! Every stage uploads the store's current buffers, records its dispatches
//! (one compute pass each, so writes of one are visible to the next),
//! submits, and blocks on the readback. Nothing stays resident between
//! stages, which is what lets CPU and GPU stages mix freely.

use bevy::log::debug;
use bevy::render::render_resource::{
    BindGroupLayout, BindGroupLayoutEntry, BindingType, BufferBindingType, BufferSize,
    CommandEncoder, CommandEncoderDescriptor, ComputePassDescriptor, ComputePipeline,
    PipelineLayout, PipelineLayoutDescriptor, RawComputePipelineDescriptor, ShaderModuleDescriptor,
    ShaderSource, ShaderStages,
};
use bevy::render::renderer::RenderDevice;

use crate::error::SimError;
use crate::gpu::buffers::{
    ParticleBuffers, Readback, SORT_STEP_STRIDE, U32_BYTES, VEC4_BYTES, bytes_mut, read_staging,
    required_bytes, sort_step_count,
};
use crate::gpu::context::GpuContext;
use crate::gpu::ffi::{GpuSimParams, GpuSortStep};
use crate::params::SimulationParameters;
use crate::store::{CellRange, ParticleStore};

pub const WORKGROUP_SIZE: u32 = 256;

/// Workgroup grid `(x, y)` covering `items` invocations when no dimension
/// may exceed `max_per_dim` groups. Kernels rebuild the flat index from
/// `num_workgroups`; the surplus of the last row is bounds-checked away.
pub fn dispatch_size(items: u32, max_per_dim: u32) -> (u32, u32) {
    let groups = items.div_ceil(WORKGROUP_SIZE).max(1);
    let x = groups.min(max_per_dim.max(1));
    (x, groups.div_ceil(x))
}

fn check_limits(ctx: &GpuContext, num_bodies: u32, num_cells: u32) -> Result<(), SimError> {
    let limits = ctx.device.limits();
    let (binding, staging) = required_bytes(num_bodies, num_cells);
    let max_binding = u64::from(limits.max_storage_buffer_binding_size);
    if binding > max_binding {
        return Err(SimError::GpuLimit {
            what: "largest storage binding",
            needed: binding,
            limit: max_binding,
        });
    }
    if staging > limits.max_buffer_size {
        return Err(SimError::GpuLimit {
            what: "readback buffer",
            needed: staging,
            limit: limits.max_buffer_size,
        });
    }
    Ok(())
}

#[inline]
fn max_groups(ctx: &GpuContext) -> u32 {
    ctx.device.limits().max_compute_workgroups_per_dimension
}

fn ensure_buffers<'a>(
    slot: &'a mut Option<ParticleBuffers>,
    ctx: &GpuContext,
    pipelines: &ParticlePipelines,
    num_bodies: u32,
    num_cells: u32,
) -> Result<&'a ParticleBuffers, SimError> {
    if slot.as_ref().is_some_and(|b| !b.fits(num_bodies, num_cells)) {
        *slot = None;
    }
    if slot.is_none() {
        check_limits(ctx, num_bodies, num_cells)?;
    }
    Ok(slot.get_or_insert_with(|| {
        ParticleBuffers::new(
            ctx,
            &pipelines.particle_layout,
            &pipelines.sort_layout,
            num_bodies,
            num_cells,
        )
    }))
}

fn upload_particles(
    ctx: &GpuContext,
    buffers: &ParticleBuffers,
    store: &ParticleStore,
    params: &GpuSimParams,
) {
    let positions = bytemuck::cast_slice(store.positions.current());
    let velocities = bytemuck::cast_slice(store.velocities.current());
    ctx.queue.write_buffer(&buffers.params, 0, bytemuck::bytes_of(params));
    ctx.queue.write_buffer(&buffers.pos_in, 0, positions);
    ctx.queue.write_buffer(&buffers.vel_in, 0, velocities);
}

pub struct ParticlePipelines {
    pub calc_hash: ComputePipeline,
    pub bitonic_step: ComputePipeline,
    pub clear_cells: ComputePipeline,
    pub reorder: ComputePipeline,
    pub collide: ComputePipeline,
    pub integrate: ComputePipeline,
    pub particle_layout: BindGroupLayout,
    pub sort_layout: BindGroupLayout,
}

fn buffer_entry(
    binding: u32,
    ty: BufferBindingType,
    has_dynamic_offset: bool,
    min_binding_size: Option<BufferSize>,
) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Buffer { ty, has_dynamic_offset, min_binding_size },
        count: None,
    }
}

impl ParticlePipelines {
    pub fn new(device: &RenderDevice) -> Self {
        let shader = device.create_and_validate_shader_module(ShaderModuleDescriptor {
            label: Some("particles.wgsl"),
            source: ShaderSource::Wgsl(include_str!("shaders/particles.wgsl").into()),
        });

        let mut entries = vec![buffer_entry(0, BufferBindingType::Uniform, false, None)];
        entries.extend((1..=7).map(|binding| {
            buffer_entry(binding, BufferBindingType::Storage { read_only: false }, false, None)
        }));
        let particle_layout =
            device.create_bind_group_layout("particle_bind_group_layout", &entries);

        let step_size = BufferSize::new(std::mem::size_of::<GpuSortStep>() as u64);
        let sort_layout = device.create_bind_group_layout(
            "particle_sort_bind_group_layout",
            &[buffer_entry(0, BufferBindingType::Uniform, true, step_size)],
        );

        let main_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("particle_pipeline_layout"),
            bind_group_layouts: &[particle_layout.value()],
            push_constant_ranges: &[],
        });
        let sort_pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("particle_sort_pipeline_layout"),
            bind_group_layouts: &[particle_layout.value(), sort_layout.value()],
            push_constant_ranges: &[],
        });

        let make = |entry_point: &str, layout: &PipelineLayout| {
            device.create_compute_pipeline(&RawComputePipelineDescriptor {
                label: Some(entry_point),
                layout: Some(layout),
                module: &shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        Self {
            calc_hash: make("calc_hash", &main_layout),
            bitonic_step: make("bitonic_step", &sort_pipeline_layout),
            clear_cells: make("clear_cells", &main_layout),
            reorder: make("reorder", &main_layout),
            collide: make("collide", &main_layout),
            integrate: make("integrate", &main_layout),
            particle_layout,
            sort_layout,
        }
    }
}

/// Runs sort / collide / integrate stages on the GPU.
pub struct GpuSimulator {
    ctx: GpuContext,
    pipelines: ParticlePipelines,
    buffers: Option<ParticleBuffers>,
}

impl GpuSimulator {
    pub fn new(ctx: GpuContext) -> Self {
        let pipelines = ParticlePipelines::new(&ctx.device);
        Self { ctx, pipelines, buffers: None }
    }

    fn dispatch(
        encoder: &mut CommandEncoder,
        pipeline: &ComputePipeline,
        buffers: &ParticleBuffers,
        sort_offset: Option<u32>,
        (x, y): (u32, u32),
    ) {
        let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor::default());
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &buffers.particle_bind_group, &[]);
        if let Some(offset) = sort_offset {
            pass.set_bind_group(1, &buffers.sort_bind_group, &[offset]);
        }
        pass.dispatch_workgroups(x, y, 1);
    }

    /// Hash, bitonic sort, gather and cell ranges in one submission.
    pub fn sort_stage(
        &mut self,
        store: &mut ParticleStore,
        params: &SimulationParameters,
    ) -> Result<(), SimError> {
        let n = store.len();
        if n == 0 {
            store.ensure_cells(params.num_cells());
            store.cell_ranges.fill(CellRange::EMPTY);
            return Ok(());
        }

        let n32 = n as u32;
        let num_cells = params.num_cells() as u32;
        let padded = n32.next_power_of_two();
        let Self { ctx, pipelines, buffers } = self;
        // device limits are checked before the host table grows
        let buffers = ensure_buffers(buffers, ctx, pipelines, n32, num_cells)?;
        store.ensure_cells(params.num_cells());

        let gpu_params = GpuSimParams::new(params, n32, padded);
        upload_particles(ctx, buffers, store, &gpu_params);

        // every (k, j) pair of the network at its own aligned offset
        let steps = sort_step_count(padded);
        let mut step_bytes = vec![0u8; (steps as u64 * SORT_STEP_STRIDE) as usize];
        let mut s = 0usize;
        let mut k = 2u32;
        while k <= padded {
            let mut j = k / 2;
            while j > 0 {
                let step = GpuSortStep { j, k, _pad: [0; 2] };
                let at = s * SORT_STEP_STRIDE as usize;
                step_bytes[at..at + std::mem::size_of::<GpuSortStep>()]
                    .copy_from_slice(bytemuck::bytes_of(&step));
                s += 1;
                j /= 2;
            }
            k *= 2;
        }
        if !step_bytes.is_empty() {
            ctx.queue.write_buffer(&buffers.sort_steps, 0, &step_bytes);
        }

        let mut encoder = ctx.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("particle_sort_stage"),
        });
        let max = max_groups(ctx);
        let over_padded = dispatch_size(padded, max);
        Self::dispatch(&mut encoder, &pipelines.calc_hash, buffers, None, over_padded);
        for step in 0..steps {
            let offset = Some((step as u64 * SORT_STEP_STRIDE) as u32);
            Self::dispatch(&mut encoder, &pipelines.bitonic_step, buffers, offset, over_padded);
        }
        let over_cells = dispatch_size(num_cells, max);
        Self::dispatch(&mut encoder, &pipelines.clear_cells, buffers, None, over_cells);
        let over_bodies = dispatch_size(n32, max);
        Self::dispatch(&mut encoder, &pipelines.reorder, buffers, None, over_bodies);

        let n64 = n as u64;
        let vec_bytes = n64 * VEC4_BYTES;
        let key_bytes = n64 * U32_BYTES;
        let cell_bytes = num_cells as u64 * std::mem::size_of::<CellRange>() as u64;
        let vel_at = vec_bytes;
        let hash_at = 2 * vec_bytes;
        let index_at = hash_at + key_bytes;
        let cell_at = index_at + key_bytes;
        encoder.copy_buffer_to_buffer(&buffers.pos_out, 0, &buffers.staging, 0, vec_bytes);
        encoder.copy_buffer_to_buffer(&buffers.vel_out, 0, &buffers.staging, vel_at, vec_bytes);
        encoder.copy_buffer_to_buffer(&buffers.hashes, 0, &buffers.staging, hash_at, key_bytes);
        encoder.copy_buffer_to_buffer(&buffers.indices, 0, &buffers.staging, index_at, key_bytes);
        encoder.copy_buffer_to_buffer(&buffers.cells, 0, &buffers.staging, cell_at, cell_bytes);
        ctx.queue.submit(Some(encoder.finish()));

        let ParticleStore { positions, velocities, hashes, indices, cell_ranges } = store;
        read_staging(
            ctx,
            &buffers.staging,
            &mut [
                Readback { offset: 0, dst: bytes_mut(positions.other_mut()) },
                Readback { offset: vel_at, dst: bytes_mut(velocities.other_mut()) },
                Readback { offset: hash_at, dst: bytes_mut(hashes) },
                Readback { offset: index_at, dst: bytes_mut(indices) },
                Readback { offset: cell_at, dst: bytes_mut(cell_ranges) },
            ],
        )?;
        positions.swap();
        velocities.swap();

        debug!("gpu sort stage: {} particles, {} bitonic passes", n, steps);
        Ok(())
    }

    /// New velocities into the alternate buffer, which becomes current.
    pub fn collide_stage(
        &mut self,
        store: &mut ParticleStore,
        params: &SimulationParameters,
    ) -> Result<(), SimError> {
        let n = store.len();
        if n == 0 {
            return Ok(());
        }

        let n32 = n as u32;
        let num_cells = params.num_cells() as u32;
        let Self { ctx, pipelines, buffers } = self;
        let buffers = ensure_buffers(buffers, ctx, pipelines, n32, num_cells)?;

        let gpu_params = GpuSimParams::new(params, n32, n32.next_power_of_two());
        upload_particles(ctx, buffers, store, &gpu_params);
        let cells = bytemuck::cast_slice(&store.cell_ranges);
        ctx.queue.write_buffer(&buffers.cells, 0, cells);

        let mut encoder = ctx.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("particle_collide_stage"),
        });
        let groups = dispatch_size(n32, max_groups(ctx));
        Self::dispatch(&mut encoder, &pipelines.collide, buffers, None, groups);
        let vec_bytes = n as u64 * VEC4_BYTES;
        encoder.copy_buffer_to_buffer(&buffers.vel_out, 0, &buffers.staging, 0, vec_bytes);
        ctx.queue.submit(Some(encoder.finish()));

        read_staging(
            ctx,
            &buffers.staging,
            &mut [Readback { offset: 0, dst: bytes_mut(store.velocities.other_mut()) }],
        )?;
        store.velocities.swap();
        Ok(())
    }

    /// Gravity, damping and wall reflection, in place.
    pub fn integrate_stage(
        &mut self,
        store: &mut ParticleStore,
        params: &SimulationParameters,
    ) -> Result<(), SimError> {
        let n = store.len();
        if n == 0 {
            return Ok(());
        }

        let n32 = n as u32;
        let Self { ctx, pipelines, buffers } = self;
        let num_cells = params.num_cells() as u32;
        let buffers = ensure_buffers(buffers, ctx, pipelines, n32, num_cells)?;

        let gpu_params = GpuSimParams::new(params, n32, n32.next_power_of_two());
        upload_particles(ctx, buffers, store, &gpu_params);

        let mut encoder = ctx.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("particle_integrate_stage"),
        });
        let groups = dispatch_size(n32, max_groups(ctx));
        Self::dispatch(&mut encoder, &pipelines.integrate, buffers, None, groups);
        let vec_bytes = n as u64 * VEC4_BYTES;
        encoder.copy_buffer_to_buffer(&buffers.pos_in, 0, &buffers.staging, 0, vec_bytes);
        encoder.copy_buffer_to_buffer(&buffers.vel_in, 0, &buffers.staging, vec_bytes, vec_bytes);
        ctx.queue.submit(Some(encoder.finish()));

        read_staging(
            ctx,
            &buffers.staging,
            &mut [
                Readback { offset: 0, dst: bytes_mut(store.positions.current_mut()) },
                Readback { offset: vec_bytes, dst: bytes_mut(store.velocities.current_mut()) },
            ],
        )?;
        Ok(())
    }
}
