// simulation parameters shared by every stage and substrate
use glam::{IVec3, Vec3};

/// How the shear term derives the tangential velocity.
///
/// `Observed` keeps the demo's `relVel - dot(relVel, relVel) * normal`,
/// `Projected` uses the textbook `relVel - dot(relVel, normal) * normal`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TangentialMode {
    #[default]
    Observed,
    Projected,
}

/// Static sphere the particles collide against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Collider {
    pub center: Vec3,
    pub radius: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationParameters {
    // geometry, private so the derived grid can't go stale
    world_size: Vec3,
    particle_radius: f32,
    grid_size: IVec3,
    cell_size: Vec3,

    pub gravity: Vec3,
    pub delta_time: f32,
    pub global_damping: f32,
    pub spring: f32,
    pub damping: f32,
    pub shear: f32,
    pub attraction: f32,
    pub boundary_damping: f32,
    pub num_bodies: usize,
    pub tangential_mode: TangentialMode,
    pub collider: Option<Collider>,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self::new(Vec3::splat(2.0), 1.0 / 64.0, 16384)
    }
}

impl SimulationParameters {
    pub fn new(world_size: Vec3, particle_radius: f32, num_bodies: usize) -> Self {
        let mut params = Self {
            world_size,
            particle_radius,
            grid_size: IVec3::ONE,
            cell_size: world_size,
            gravity: Vec3::new(0.0, -0.0003, 0.0),
            delta_time: 0.5,
            global_damping: 1.0,
            spring: 0.5,
            damping: 0.02,
            shear: 0.1,
            attraction: 0.0,
            boundary_damping: -0.5,
            num_bodies,
            tangential_mode: TangentialMode::Observed,
            collider: None,
        };
        params.recompute_grid();
        params
    }

    #[inline]
    pub fn world_size(&self) -> Vec3 {
        self.world_size
    }

    #[inline]
    pub fn particle_radius(&self) -> f32 {
        self.particle_radius
    }

    #[inline]
    pub fn grid_size(&self) -> IVec3 {
        self.grid_size
    }

    #[inline]
    pub fn cell_size(&self) -> Vec3 {
        self.cell_size
    }

    /// Box is centred at the origin.
    #[inline]
    pub fn world_min(&self) -> Vec3 {
        -0.5 * self.world_size
    }

    #[inline]
    pub fn world_max(&self) -> Vec3 {
        0.5 * self.world_size
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        let g = self.grid_size;
        g.x as usize * g.y as usize * g.z as usize
    }

    pub fn set_world_size(&mut self, world_size: Vec3) {
        self.world_size = world_size;
        self.recompute_grid();
    }

    pub fn set_particle_radius(&mut self, particle_radius: f32) {
        self.particle_radius = particle_radius;
        self.recompute_grid();
    }

    // gridSize = max(1, floor(worldSize / diameter)), cellSize = worldSize / gridSize
    fn recompute_grid(&mut self) {
        let diameter = 2.0 * self.particle_radius;
        let cells = if diameter > 0.0 {
            (self.world_size / diameter).floor()
        } else {
            Vec3::ONE
        };
        // NaN and negatives fall through max() to 1
        self.grid_size = IVec3::new(
            (cells.x as i32).max(1),
            (cells.y as i32).max(1),
            (cells.z as i32).max(1),
        );
        self.cell_size = self.world_size / self.grid_size.as_vec3();
    }
}
