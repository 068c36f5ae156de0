//! The per-frame pipeline: sort, collide, integrate.
//!
//! Each stage finishes completely before the next begins. CPU stages
//! return only after their transform has joined, GPU stages only after
//! their readback fence, so every stage boundary is a full barrier.

use bevy::log::{debug, info, warn};
use bevy::prelude::Resource;
use glam::{Vec3, Vec4};
use rand::Rng;

use crate::cpu::transform::CpuTransform;
use crate::error::SimError;
use crate::executor::StageExecutor;
use crate::gpu::context::GpuContext;
use crate::gpu::pipeline::GpuSimulator;
use crate::params::SimulationParameters;
use crate::sort::SortAlgorithm;
use crate::store::{CellRange, ParticleStore, ResetConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Sort,
    Collide,
    Integrate,
}

/// Where a stage runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Substrate {
    #[default]
    Serial,
    Parallel,
    Gpu,
}

/// Backend choices, read once per stage. `sort_algorithm` picks the CPU
/// sorter; the GPU sort stage always runs its bitonic network.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutionConfig {
    pub sort_algorithm: SortAlgorithm,
    pub sort_backend: Substrate,
    pub collide_backend: Substrate,
    pub integrate_backend: Substrate,
}

impl ExecutionConfig {
    /// Same substrate for every stage.
    pub fn uniform(substrate: Substrate) -> Self {
        Self {
            sort_algorithm: SortAlgorithm::default(),
            sort_backend: substrate,
            collide_backend: substrate,
            integrate_backend: substrate,
        }
    }

    fn backend(&self, stage: Stage) -> Substrate {
        match stage {
            Stage::Sort => self.sort_backend,
            Stage::Collide => self.collide_backend,
            Stage::Integrate => self.integrate_backend,
        }
    }
}

fn cpu_transform(substrate: Substrate) -> CpuTransform {
    match substrate {
        Substrate::Parallel => CpuTransform::Parallel,
        _ => CpuTransform::Serial,
    }
}

#[derive(Resource)]
pub struct ParticleSystem {
    params: SimulationParameters,
    store: ParticleStore,
    pub execution: ExecutionConfig,
    gpu: Option<GpuSimulator>,
    frame: u64,
}

impl ParticleSystem {
    pub fn new<R: Rng>(params: SimulationParameters, layout: ResetConfig, rng: &mut R) -> Self {
        let mut store = ParticleStore::new(params.num_bodies, params.num_cells());
        store.seed(layout, &params, rng);
        info!(
            "particle system: {} bodies, grid {:?} ({} cells)",
            params.num_bodies,
            params.grid_size(),
            params.num_cells()
        );
        Self {
            params,
            store,
            execution: ExecutionConfig::default(),
            gpu: None,
            frame: 0,
        }
    }

    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    /// Enable `Substrate::Gpu` stages on this device.
    pub fn attach_gpu(&mut self, ctx: GpuContext) {
        self.gpu = Some(GpuSimulator::new(ctx));
    }

    pub fn has_gpu(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    /// Coefficients and geometry may change between frames; the grid is
    /// rebuilt at the next sort stage. Use `resize` to change the count.
    pub fn params_mut(&mut self) -> &mut SimulationParameters {
        &mut self.params
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // ==================== renderer / inspection ==========================

    /// Frame-scoped read-only view for drawing: xyz position, w colour value.
    pub fn positions_view(&self) -> &[Vec4] {
        self.store.positions.current()
    }

    pub fn velocities_view(&self) -> &[Vec4] {
        self.store.velocities.current()
    }

    pub fn cell_ranges(&self) -> &[CellRange] {
        &self.store.cell_ranges
    }

    pub fn hashes(&self) -> &[u32] {
        &self.store.hashes
    }

    pub fn sorted_indices(&self) -> &[u32] {
        &self.store.indices
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    /// Direct access for seeding custom layouts between frames.
    pub fn store_mut(&mut self) -> &mut ParticleStore {
        &mut self.store
    }

    // ==================== reset / resize ===============================

    pub fn reset<R: Rng>(&mut self, layout: ResetConfig, rng: &mut R) {
        self.store.ensure_cells(self.params.num_cells());
        self.store.seed(layout, &self.params, rng);
        info!("particle system reset ({:?})", layout);
    }

    pub fn resize<R: Rng>(&mut self, num_bodies: usize, layout: ResetConfig, rng: &mut R) {
        self.params.num_bodies = num_bodies;
        self.store = ParticleStore::new(num_bodies, self.params.num_cells());
        self.store.seed(layout, &self.params, rng);
        info!("particle system resized to {} bodies", num_bodies);
    }

    /// Drop a ball of particles into slots `start..`; returns how many were placed.
    pub fn add_sphere<R: Rng>(
        &mut self,
        start: usize,
        center: Vec3,
        radius: i32,
        velocity: Vec3,
        rng: &mut R,
    ) -> usize {
        self.store.add_sphere(start, center, radius, velocity, &self.params, rng)
    }

    // ==================== stages =======================================

    fn check_gpu(&self, stage: Stage) -> Result<(), SimError> {
        if self.execution.backend(stage) == Substrate::Gpu && self.gpu.is_none() {
            warn!("{:?} stage wants the GPU but none is attached", stage);
            return Err(SimError::GpuUnavailable { stage });
        }
        Ok(())
    }

    /// Run `f` with the executor `stage` is configured for.
    fn run_stage<F>(&mut self, stage: Stage, f: F) -> Result<(), SimError>
    where
        F: FnOnce(
            &mut dyn StageExecutor,
            &mut ParticleStore,
            &SimulationParameters,
        ) -> Result<(), SimError>,
    {
        self.check_gpu(stage)?;
        let Self { params, store, execution, gpu, .. } = self;
        let mut cpu = cpu_transform(execution.backend(stage));
        let executor: &mut dyn StageExecutor = match (execution.backend(stage), gpu.as_mut()) {
            (Substrate::Gpu, Some(gpu)) => gpu,
            _ => &mut cpu,
        };
        debug!("{:?} stage on {}", stage, executor.name());
        f(executor, store, params)
    }

    /// Hash, sort, gather into cell order, rebuild cell ranges, flip buffers.
    pub fn sort_stage(&mut self) -> Result<(), SimError> {
        let sorter = self.execution.sort_algorithm.sorter();
        self.run_stage(Stage::Sort, |exec, store, params| exec.sort(store, params, sorter))
    }

    /// Contact forces into new velocities. Needs a completed sort stage.
    pub fn collide(&mut self) -> Result<(), SimError> {
        self.run_stage(Stage::Collide, |exec, store, params| exec.collide(store, params))
    }

    pub fn integrate(&mut self) -> Result<(), SimError> {
        self.run_stage(Stage::Integrate, |exec, store, params| exec.integrate(store, params))
    }

    /// Advance one step of `dt`. A misconfigured GPU stage is reported
    /// before anything runs, leaving the buffers untouched.
    pub fn update(&mut self, dt: f32) -> Result<(), SimError> {
        for stage in [Stage::Sort, Stage::Collide, Stage::Integrate] {
            self.check_gpu(stage)?;
        }
        self.params.delta_time = dt;

        debug!(
            "frame {}: sort {:?}/{:?}, collide {:?}, integrate {:?}",
            self.frame,
            self.execution.sort_backend,
            self.execution.sort_algorithm,
            self.execution.collide_backend,
            self.execution.integrate_backend
        );

        self.sort_stage()?;
        self.collide()?;
        self.integrate()?;
        self.frame += 1;
        Ok(())
    }
}
