use bevy::prelude::*;
use bevy::render::renderer::{RenderDevice, RenderQueue};
use grid_particles::gpu::context::GpuContext;
use grid_particles::plugin::SimulationRunning;
use grid_particles::{
    ExecutionConfig, ParticleSystem, ParticleSystemPlugin, ResetConfig, SimulationParameters,
    Substrate,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

const NUM_BODIES: usize = 4096;

#[derive(Resource)]
struct DemoRng(StdRng);

fn main() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut params = SimulationParameters::default();
    params.num_bodies = NUM_BODIES;
    params.set_particle_radius(1.0 / 32.0);

    let system = ParticleSystem::new(params, ResetConfig::Grid, &mut rng)
        .with_execution(ExecutionConfig::uniform(Substrate::Parallel));

    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(ParticleSystemPlugin::default())
        .insert_resource(system)
        .insert_resource(DemoRng(rng))
        .add_systems(Startup, (attach_render_device, setup).chain())
        .add_systems(Update, (keyboard, draw_particles))
        .run();
}

// compute stages share the renderer's device and queue
fn attach_render_device(
    device: Option<Res<RenderDevice>>,
    queue: Option<Res<RenderQueue>>,
    mut system: ResMut<ParticleSystem>,
) {
    match (device, queue) {
        (Some(device), Some(queue)) => {
            system.attach_gpu(GpuContext::new(device.clone(), queue.clone()));
        }
        _ => warn!("no render device, GPU substrate disabled"),
    }
}

fn setup(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 0.6, 3.2).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    info!("space: pause, r: reset, s: drop sphere, g: cycle substrate");
}

fn keyboard(
    keys: Res<ButtonInput<KeyCode>>,
    mut system: ResMut<ParticleSystem>,
    mut running: ResMut<SimulationRunning>,
    mut rng: ResMut<DemoRng>,
) {
    if keys.just_pressed(KeyCode::Space) {
        running.0 = !running.0;
    }
    if keys.just_pressed(KeyCode::KeyR) {
        system.reset(ResetConfig::Grid, &mut rng.0);
    }
    if keys.just_pressed(KeyCode::KeyS) {
        let velocity = bevy_to_glam(Vec3::new(0.0, -0.01, 0.0));
        let center = glam::Vec3::new(0.0, 0.6, 0.0);
        let placed = system.add_sphere(0, center, 6, velocity, &mut rng.0);
        info!("dropped {placed} particles");
    }
    if keys.just_pressed(KeyCode::KeyG) {
        let next = match system.execution.collide_backend {
            Substrate::Serial => Substrate::Parallel,
            Substrate::Parallel if system.has_gpu() => Substrate::Gpu,
            _ => Substrate::Serial,
        };
        system.execution = ExecutionConfig::uniform(next);
        info!("substrate: {next:?}");
    }
}

fn draw_particles(system: Res<ParticleSystem>, mut gizmos: Gizmos) {
    let params = system.params();
    let size = glam_to_bevy(params.world_size());
    gizmos.cuboid(Transform::from_scale(size), Color::srgb(0.5, 0.5, 0.5));

    let radius = params.particle_radius();
    for p in system.positions_view() {
        let pos = glam_to_bevy(p.truncate());
        // w runs 0..1 over the particle slots
        let color = Color::hsl(240.0 * (1.0 - p.w), 0.8, 0.55);
        gizmos.sphere(Isometry3d::from_translation(pos), radius, color);
    }
}

// bevy re-exports an older glam
fn glam_to_bevy(v: glam::Vec3) -> Vec3 {
    Vec3::from_array(v.to_array())
}

fn bevy_to_glam(v: Vec3) -> glam::Vec3 {
    glam::Vec3::from_array(v.to_array())
}
