use bevy::render::render_resource::BufferAsyncError;
use thiserror::Error;

use crate::system::Stage;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("{stage:?} stage is configured for the GPU but no GPU context is attached")]
    GpuUnavailable { stage: Stage },
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("failed to map GPU readback buffer: {0}")]
    BufferMap(#[from] BufferAsyncError),
    #[error("{what} needs {needed} but the device allows {limit}")]
    GpuLimit { what: &'static str, needed: u64, limit: u64 },
}
