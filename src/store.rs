// particle storage: ping-pong position/velocity pairs plus per-frame scratch
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use rand::Rng;

use crate::params::SimulationParameters;

/// Half-open `[start, end)` slice of the hash-ordered particles in one cell.
/// `{0, 0}` marks an empty cell.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct CellRange {
    pub start: u32,
    pub end: u32,
}

impl CellRange {
    pub const EMPTY: Self = Self { start: 0, end: 0 };

    #[inline]
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn indices(&self) -> std::ops::Range<usize> {
        self.start as usize..self.end as usize
    }
}

/// Two buffers with one active index. Stages read `current()` and write
/// `other_mut()`, then `swap()`; the two never alias.
#[derive(Clone, Debug, Default)]
pub struct PingPong<T> {
    bufs: [Vec<T>; 2],
    active: usize,
}

impl<T: Clone + Default> PingPong<T> {
    pub fn new(len: usize) -> Self {
        Self {
            bufs: [vec![T::default(); len], vec![T::default(); len]],
            active: 0,
        }
    }

    #[inline]
    pub fn current(&self) -> &[T] {
        &self.bufs[self.active]
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut [T] {
        &mut self.bufs[self.active]
    }

    #[inline]
    pub fn other_mut(&mut self) -> &mut [T] {
        &mut self.bufs[1 - self.active]
    }

    /// Read the active buffer while writing the other one.
    #[inline]
    pub fn split(&mut self) -> (&[T], &mut [T]) {
        let (a, b) = self.bufs.split_at_mut(1);
        if self.active == 0 {
            (a[0].as_slice(), b[0].as_mut_slice())
        } else {
            (b[0].as_slice(), a[0].as_mut_slice())
        }
    }

    #[inline]
    pub fn swap(&mut self) {
        self.active = 1 - self.active;
    }

    #[inline]
    pub fn active_index(&self) -> usize {
        self.active
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bufs[0].len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bufs[0].is_empty()
    }
}

/// How `reset` lays particles out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResetConfig {
    /// jittered cubic lattice packed from the lower corner of the box
    #[default]
    Grid,
    /// uniform inside the box
    Random,
}

/// Positions carry the renderer's colour value in `w`; velocities keep
/// `w = 0` so both cast straight to GPU `vec4<f32>`.
#[derive(Clone, Debug, Default)]
pub struct ParticleStore {
    pub positions: PingPong<Vec4>,
    pub velocities: PingPong<Vec4>,
    pub hashes: Vec<u32>,
    pub indices: Vec<u32>,
    pub cell_ranges: Vec<CellRange>,
}

impl ParticleStore {
    pub fn new(num_bodies: usize, num_cells: usize) -> Self {
        Self {
            positions: PingPong::new(num_bodies),
            velocities: PingPong::new(num_bodies),
            hashes: vec![0; num_bodies],
            indices: (0..num_bodies as u32).collect(),
            cell_ranges: vec![CellRange::EMPTY; num_cells],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Resize the cell table after the grid changed; contents are rebuilt
    /// by the next sort stage.
    pub fn ensure_cells(&mut self, num_cells: usize) {
        if self.cell_ranges.len() != num_cells {
            self.cell_ranges = vec![CellRange::EMPTY; num_cells];
        }
    }

    /// Overwrite the active buffers with a fresh layout; velocities are zeroed.
    pub fn seed<R: Rng>(
        &mut self,
        config: ResetConfig,
        params: &SimulationParameters,
        rng: &mut R,
    ) {
        let n = self.len();
        let min = params.world_min();
        let size = params.world_size();
        let r = params.particle_radius();

        match config {
            ResetConfig::Grid => {
                let spacing = 2.0 * r;
                let jitter = 0.01 * r;
                let side = (n as f32).cbrt().ceil().max(1.0) as usize;
                for (i, p) in self.positions.current_mut().iter_mut().enumerate() {
                    let x = i % side;
                    let y = (i / side) % side;
                    let z = i / (side * side);
                    let lattice = Vec3::new(x as f32, y as f32, z as f32) * spacing;
                    let pos = min + Vec3::splat(r) + lattice + jitter * random_signed(rng);
                    *p = pos.extend(color_ramp(i, n));
                }
            }
            ResetConfig::Random => {
                for (i, p) in self.positions.current_mut().iter_mut().enumerate() {
                    let unit = Vec3::new(rng.r#gen(), rng.r#gen(), rng.r#gen());
                    *p = (min + unit * size).extend(color_ramp(i, n));
                }
            }
        }
        self.velocities.current_mut().fill(Vec4::ZERO);
    }

    /// Place a jittered ball of particles, `radius` lattice steps across its
    /// half-width, into consecutive slots from `start`. Slots past the end
    /// of the store are skipped. Returns how many slots were written.
    pub fn add_sphere<R: Rng>(
        &mut self,
        start: usize,
        center: Vec3,
        radius: i32,
        velocity: Vec3,
        params: &SimulationParameters,
        rng: &mut R,
    ) -> usize {
        let n = self.len();
        let r = params.particle_radius();
        let spacing = 2.0 * r;
        let jitter = 0.01 * r;
        let mut slot = start;

        for z in -radius..=radius {
            for y in -radius..=radius {
                for x in -radius..=radius {
                    let offset = Vec3::new(x as f32, y as f32, z as f32) * spacing;
                    let dist = offset.length();
                    if dist > radius as f32 * spacing || slot >= n {
                        continue;
                    }
                    let pos = center + offset + jitter * random_signed(rng);
                    self.positions.current_mut()[slot] = pos.extend(color_ramp(slot, n));
                    self.velocities.current_mut()[slot] = velocity.extend(0.0);
                    slot += 1;
                }
            }
        }
        slot - start
    }
}

fn random_signed<R: Rng>(rng: &mut R) -> Vec3 {
    Vec3::new(
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
    )
}

#[inline]
fn color_ramp(i: usize, n: usize) -> f32 {
    if n == 0 { 0.0 } else { i as f32 / n as f32 }
}
