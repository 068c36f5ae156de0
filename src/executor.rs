//! One interface over the places a stage can run.
//!
//! `ParticleSystem` picks an executor per stage from its
//! `ExecutionConfig` and hands it the store; the executor owns how the
//! per-particle work is spread out (a plain loop, rayon, or compute
//! dispatches) and returns once the stage is complete.

use crate::cpu::collide::collide;
use crate::cpu::integrate::integrate;
use crate::cpu::reorder::sort_particles;
use crate::cpu::transform::CpuTransform;
use crate::error::SimError;
use crate::gpu::pipeline::GpuSimulator;
use crate::params::SimulationParameters;
use crate::sort::KeyIndexSorter;
use crate::store::ParticleStore;

pub trait StageExecutor {
    fn name(&self) -> &'static str;

    /// Hash, sort with `sorter`, gather into cell order and rebuild the
    /// cell ranges. Executors with their own sort network may ignore it.
    fn sort(
        &mut self,
        store: &mut ParticleStore,
        params: &SimulationParameters,
        sorter: &dyn KeyIndexSorter,
    ) -> Result<(), SimError>;

    fn collide(
        &mut self,
        store: &mut ParticleStore,
        params: &SimulationParameters,
    ) -> Result<(), SimError>;

    fn integrate(
        &mut self,
        store: &mut ParticleStore,
        params: &SimulationParameters,
    ) -> Result<(), SimError>;
}

impl StageExecutor for CpuTransform {
    fn name(&self) -> &'static str {
        match self {
            CpuTransform::Serial => "serial",
            CpuTransform::Parallel => "parallel",
        }
    }

    fn sort(
        &mut self,
        store: &mut ParticleStore,
        params: &SimulationParameters,
        sorter: &dyn KeyIndexSorter,
    ) -> Result<(), SimError> {
        sort_particles(store, params, sorter, *self);
        Ok(())
    }

    fn collide(
        &mut self,
        store: &mut ParticleStore,
        params: &SimulationParameters,
    ) -> Result<(), SimError> {
        store.ensure_cells(params.num_cells());
        collide(store, params, *self);
        Ok(())
    }

    fn integrate(
        &mut self,
        store: &mut ParticleStore,
        params: &SimulationParameters,
    ) -> Result<(), SimError> {
        integrate(store, params, *self);
        Ok(())
    }
}

/// The GPU always sorts with its bitonic kernels.
impl StageExecutor for GpuSimulator {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn sort(
        &mut self,
        store: &mut ParticleStore,
        params: &SimulationParameters,
        _sorter: &dyn KeyIndexSorter,
    ) -> Result<(), SimError> {
        self.sort_stage(store, params)
    }

    fn collide(
        &mut self,
        store: &mut ParticleStore,
        params: &SimulationParameters,
    ) -> Result<(), SimError> {
        store.ensure_cells(params.num_cells());
        self.collide_stage(store, params)
    }

    fn integrate(
        &mut self,
        store: &mut ParticleStore,
        params: &SimulationParameters,
    ) -> Result<(), SimError> {
        self.integrate_stage(store, params)
    }
}
