//! Uniform-grid particle collisions: hash particles into cells, sort them
//! into cell order, derive per-cell ranges, resolve contact forces against
//! the 3x3x3 neighbourhood and integrate under gravity with box walls.
//!
//! Every stage runs on a serial loop, a rayon loop or a wgpu compute
//! dispatch, chosen per stage through [`system::ExecutionConfig`] and run
//! through a [`executor::StageExecutor`].

pub mod error;
pub mod executor;
pub mod grid;
pub mod params;
pub mod plugin;
pub mod sort;
pub mod store;
pub mod system;

pub mod cpu {
    pub mod collide;
    pub mod integrate;
    pub mod reorder;
    pub mod transform;
}

pub mod gpu {
    pub mod buffers;
    pub mod context;
    pub mod ffi;
    pub mod pipeline;
}

pub use error::SimError;
pub use executor::StageExecutor;
pub use params::{Collider, SimulationParameters, TangentialMode};
pub use plugin::ParticleSystemPlugin;
pub use sort::{BitonicSorter, KeyIndexSorter, RadixSorter, SortAlgorithm};
pub use store::{CellRange, ParticleStore, ResetConfig};
pub use system::{ExecutionConfig, ParticleSystem, Stage, Substrate};
