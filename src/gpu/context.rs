use std::sync::Arc;

use bevy::log::info;
use bevy::render::renderer::{RenderDevice, RenderQueue, WgpuWrapper};

use crate::error::SimError;

/// Device and queue the GPU substrate dispatches on.
///
/// Inside a bevy app this wraps the renderer's own `RenderDevice` and
/// `RenderQueue`; tests and benches without a window use `new_headless`.
#[derive(Clone)]
pub struct GpuContext {
    pub device: RenderDevice,
    pub queue: RenderQueue,
}

impl GpuContext {
    pub fn new(device: RenderDevice, queue: RenderQueue) -> Self {
        Self { device, queue }
    }

    /// Windowless device for compute only.
    pub fn new_headless() -> Result<Self, SimError> {
        // bevy re-exports no Instance/adapter types, so raw wgpu here
        let instance = wgpu::Instance::default();

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(SimError::NoAdapter)?;

        info!("particle compute adapter: {:?}", adapter.get_info());

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("grid_particles_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))?;

        Ok(Self {
            device: RenderDevice::from(device),
            queue: RenderQueue(Arc::new(WgpuWrapper::new(queue))),
        })
    }
}
