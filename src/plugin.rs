use bevy::log::error;
use bevy::prelude::*;

use crate::system::ParticleSystem;

/// Whether the fixed-step system advances the simulation.
#[derive(Resource, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimulationRunning(pub bool);

/// Step size handed to `ParticleSystem::update` each fixed tick.
#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub struct SimulationTimestep(pub f32);

/// Steps an inserted `ParticleSystem` once per `FixedUpdate`.
pub struct ParticleSystemPlugin {
    pub timestep: f32,
}

impl Default for ParticleSystemPlugin {
    fn default() -> Self {
        Self { timestep: 0.5 }
    }
}

impl Plugin for ParticleSystemPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SimulationRunning(true))
            .insert_resource(SimulationTimestep(self.timestep))
            .add_systems(FixedUpdate, step_particles);
    }
}

fn step_particles(
    system: Option<ResMut<ParticleSystem>>,
    running: Res<SimulationRunning>,
    timestep: Res<SimulationTimestep>,
) {
    let Some(mut system) = system else {
        return; // nothing inserted yet
    };
    if !running.0 {
        return;
    }
    if let Err(e) = system.update(timestep.0) {
        error!("particle update skipped: {e}");
    }
}
