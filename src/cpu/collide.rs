// neighbour collision: spring-damper-shear contact forces over the 3x3x3 block
use glam::{Vec3, Vec4};

use crate::cpu::transform::CpuTransform;
use crate::grid::{calc_grid_pos, neighbor_hashes};
use crate::params::{SimulationParameters, TangentialMode};
use crate::store::{CellRange, ParticleStore};

/// Force on sphere A from sphere B. Zero unless they overlap strictly
/// (`dist < rA + rB`; touching spheres don't interact).
#[inline]
#[allow(clippy::too_many_arguments)]
pub fn collide_spheres(
    pos_a: Vec3,
    pos_b: Vec3,
    vel_a: Vec3,
    vel_b: Vec3,
    radius_a: f32,
    radius_b: f32,
    attraction: f32,
    params: &SimulationParameters,
) -> Vec3 {
    let rel_pos = pos_b - pos_a;
    let dist = rel_pos.length();
    let collide_dist = radius_a + radius_b;

    if dist >= collide_dist || dist == 0.0 {
        return Vec3::ZERO;
    }

    let normal = rel_pos / dist;
    let rel_vel = vel_b - vel_a;
    let along = match params.tangential_mode {
        // dimensionally odd, but it is what the demo computes
        TangentialMode::Observed => rel_vel.dot(rel_vel),
        TangentialMode::Projected => rel_vel.dot(normal),
    };
    let tang_vel = rel_vel - along * normal;

    -params.spring * (collide_dist - dist) * normal
        + params.damping * rel_vel
        + params.shear * tang_vel
        + attraction * rel_pos
}

/// Summed contact force on hash-ordered particle `i`.
pub fn particle_force(
    i: usize,
    positions: &[Vec4],
    velocities: &[Vec4],
    cell_ranges: &[CellRange],
    params: &SimulationParameters,
) -> Vec3 {
    let pos = positions[i].truncate();
    let vel = velocities[i].truncate();
    let radius = params.particle_radius();
    let mut force = Vec3::ZERO;

    for hash in neighbor_hashes(calc_grid_pos(pos, params), params) {
        let range = cell_ranges[hash as usize];
        for j in range.indices() {
            if j == i {
                continue;
            }
            force += collide_spheres(
                pos,
                positions[j].truncate(),
                vel,
                velocities[j].truncate(),
                radius,
                radius,
                params.attraction,
                params,
            );
        }
    }

    if let Some(collider) = params.collider.filter(|c| c.radius > 0.0) {
        force += collide_spheres(
            pos,
            collider.center,
            vel,
            Vec3::ZERO,
            radius,
            collider.radius,
            0.0,
            params,
        );
    }

    force
}

/// Velocity-only update: `vel_out[i] = vel_in[i] + force(i)`, written to the
/// alternate velocity buffer, which then becomes current.
pub fn collide(store: &mut ParticleStore, params: &SimulationParameters, exec: CpuTransform) {
    if store.is_empty() {
        return;
    }

    let positions = store.positions.current();
    let cell_ranges = &store.cell_ranges;
    let (vel_in, vel_out) = store.velocities.split();

    exec.map(vel_out, |i| {
        let force = particle_force(i, positions, vel_in, cell_ranges, params);
        vel_in[i] + force.extend(0.0)
    });

    store.velocities.swap();
}
