use glam::{Vec3, Vec4};
use grid_particles::cpu::reorder::{derive_cell_ranges, sort_particles};
use grid_particles::cpu::transform::CpuTransform;
use grid_particles::grid::hash_position;
use grid_particles::store::PingPong;
use grid_particles::{CellRange, ParticleStore, ResetConfig, SimulationParameters, SortAlgorithm};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn seeded_store(n: usize, layout: ResetConfig, seed: u64) -> (ParticleStore, SimulationParameters) {
    let params = SimulationParameters::new(Vec3::splat(2.0), 1.0 / 16.0, n);
    let mut store = ParticleStore::new(n, params.num_cells());
    let mut rng = StdRng::seed_from_u64(seed);
    store.seed(layout, &params, &mut rng);
    (store, params)
}

#[test]
fn cell_ranges_cover_every_particle_once() {
    for layout in [ResetConfig::Grid, ResetConfig::Random] {
        for algo in [SortAlgorithm::Radix, SortAlgorithm::Bitonic] {
            let (mut store, params) = seeded_store(1500, layout, 11);
            sort_particles(&mut store, &params, algo.sorter(), CpuTransform::Serial);

            let total: u32 = store.cell_ranges.iter().map(|r| r.len()).sum();
            assert_eq!(total as usize, store.len(), "{layout:?}/{algo:?}");

            // each non-empty range holds exactly the particles hashed to it
            for (cell, range) in store.cell_ranges.iter().enumerate() {
                for i in range.indices() {
                    assert_eq!(store.hashes[i] as usize, cell);
                }
            }
        }
    }
}

#[test]
fn reordered_particles_sit_in_their_cells() {
    let (mut store, params) = seeded_store(800, ResetConfig::Random, 5);
    let before: Vec<Vec4> = store.positions.current().to_vec();
    let active_before = store.positions.active_index();

    sort_particles(&mut store, &params, SortAlgorithm::Radix.sorter(), CpuTransform::Parallel);

    assert_ne!(store.positions.active_index(), active_before, "buffers not flipped");
    let positions = store.positions.current();
    for i in 0..store.len() {
        let src = store.indices[i] as usize;
        assert_eq!(positions[i], before[src]);
        assert_eq!(hash_position(positions[i].truncate(), &params), store.hashes[i]);
    }
    assert!(store.hashes.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn derive_ranges_from_transitions() {
    let hashes = [1, 1, 3, 3, 3, 4];
    let mut ranges = vec![CellRange { start: 9, end: 9 }; 6];
    derive_cell_ranges(&hashes, &mut ranges);

    assert_eq!(ranges[0], CellRange::EMPTY);
    assert_eq!(ranges[1], CellRange { start: 0, end: 2 });
    assert_eq!(ranges[2], CellRange::EMPTY);
    assert_eq!(ranges[3], CellRange { start: 2, end: 5 });
    assert_eq!(ranges[4], CellRange { start: 5, end: 6 });
    assert_eq!(ranges[5], CellRange::EMPTY);
}

#[test]
fn single_cell_range_closes_at_n() {
    let hashes = [2, 2, 2];
    let mut ranges = vec![CellRange::EMPTY; 4];
    derive_cell_ranges(&hashes, &mut ranges);
    assert_eq!(ranges[2], CellRange { start: 0, end: 3 });
}

#[test]
fn empty_store_sorts_to_empty_table() {
    let (mut store, params) = seeded_store(0, ResetConfig::Grid, 0);
    store.cell_ranges[0] = CellRange { start: 1, end: 2 };
    sort_particles(&mut store, &params, SortAlgorithm::Bitonic.sorter(), CpuTransform::Serial);
    assert!(store.cell_ranges.iter().all(|r| r.is_empty()));
}

#[test]
fn ping_pong_halves_never_alias() {
    let mut pair: PingPong<u32> = PingPong::new(4);
    pair.current_mut().copy_from_slice(&[1, 2, 3, 4]);
    {
        let (src, dst) = pair.split();
        for (d, s) in dst.iter_mut().zip(src) {
            *d = s * 10;
        }
    }
    assert_eq!(pair.current(), &[1, 2, 3, 4]);
    pair.swap();
    assert_eq!(pair.current(), &[10, 20, 30, 40]);
    assert_eq!(pair.active_index(), 1);
}

#[test]
fn grid_seed_is_jittered_lattice_inside_box() {
    let (store, params) = seeded_store(1000, ResetConfig::Grid, 3);
    let r = params.particle_radius();
    let spacing = 2.0 * r;
    let min = params.world_min();

    // particle 1 sits one lattice step from particle 0 along x
    let p0 = store.positions.current()[0];
    let p1 = store.positions.current()[1];
    assert!((p0.x - (min.x + r)).abs() <= 0.01 * r + 1e-6);
    assert!(((p1.x - p0.x) - spacing).abs() <= 0.02 * r + 1e-6);

    for (i, p) in store.positions.current().iter().enumerate() {
        assert_eq!(p.w, i as f32 / 1000.0);
    }
    assert!(store.velocities.current().iter().all(|v| *v == Vec4::ZERO));
}

#[test]
fn random_seed_stays_in_box() {
    let (store, params) = seeded_store(2000, ResetConfig::Random, 8);
    let (min, max) = (params.world_min(), params.world_max());
    for p in store.positions.current() {
        let p = p.truncate();
        assert!(p.cmpge(min).all() && p.cmple(max).all(), "{p:?} outside box");
    }
}

#[test]
fn add_sphere_fills_consecutive_slots() {
    let (mut store, params) = seeded_store(500, ResetConfig::Grid, 1);
    let mut rng = StdRng::seed_from_u64(2);
    let velocity = Vec3::new(0.0, -0.01, 0.0);
    let placed = store.add_sphere(10, Vec3::ZERO, 2, velocity, &params, &mut rng);

    // lattice points within 2 steps of the centre
    assert_eq!(placed, 33);
    for slot in 10..10 + placed {
        assert_eq!(store.velocities.current()[slot].truncate(), velocity);
        let reach = 4.0 * params.particle_radius() + 0.01;
        assert!(store.positions.current()[slot].truncate().length() <= reach);
    }
    assert_eq!(store.velocities.current()[10 + placed], Vec4::ZERO);

    // slots past the end are skipped
    let tail = store.add_sphere(495, Vec3::ZERO, 2, velocity, &params, &mut rng);
    assert_eq!(tail, 5);
}
