// semi-implicit Euler with box-boundary reflection
use glam::{Vec3, Vec4};

use crate::cpu::transform::CpuTransform;
use crate::params::SimulationParameters;
use crate::store::ParticleStore;

/// Advance one particle in place. Position moves first, then any
/// coordinate past a wall is clamped onto it and that velocity component
/// is scaled by `boundary_damping`.
#[inline]
pub fn integrate_particle(pos: &mut Vec4, vel: &mut Vec4, params: &SimulationParameters) {
    let mut v = vel.truncate();
    let mut p = pos.truncate();

    v += params.gravity;
    v *= params.global_damping;
    p += v * params.delta_time;

    let r = Vec3::splat(params.particle_radius());
    let lo = params.world_min() + r;
    let hi = params.world_max() - r;
    for axis in 0..3 {
        if p[axis] > hi[axis] {
            p[axis] = hi[axis];
            v[axis] *= params.boundary_damping;
        }
        if p[axis] < lo[axis] {
            p[axis] = lo[axis];
            v[axis] *= params.boundary_damping;
        }
    }

    // w is the renderer's, leave it alone
    *pos = p.extend(pos.w);
    *vel = v.extend(vel.w);
}

pub fn integrate(store: &mut ParticleStore, params: &SimulationParameters, exec: CpuTransform) {
    if store.is_empty() {
        return;
    }
    let positions = store.positions.current_mut();
    let velocities = store.velocities.current_mut();
    exec.update2(positions, velocities, |p, v| integrate_particle(p, v, params));
}
