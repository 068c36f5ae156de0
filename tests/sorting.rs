use grid_particles::{BitonicSorter, KeyIndexSorter, RadixSorter, SortAlgorithm};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn identity(n: usize) -> Vec<u32> {
    (0..n as u32).collect()
}

fn random_keys(n: usize, max: u32, seed: u64) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0..max)).collect()
}

/// keys ascending, values a permutation, and each value points back at
/// the original key now sitting at that position
fn assert_sorted_permutation(original: &[u32], keys: &[u32], values: &[u32]) {
    assert_eq!(keys.len(), original.len());
    assert!(keys.windows(2).all(|w| w[0] <= w[1]), "keys not ascending");

    let mut seen = vec![false; original.len()];
    for (i, &v) in values.iter().enumerate() {
        assert_eq!(original[v as usize], keys[i], "value {v} at {i} does not match its key");
        assert!(!seen[v as usize], "value {v} appears twice");
        seen[v as usize] = true;
    }
}

fn check_sorter(sorter: &dyn KeyIndexSorter) {
    let cases = [
        (0, 1, 0),
        (1, 10, 1),
        (2, 10, 2),
        (37, 5, 3),
        (1000, 64, 4),
        (4096, 1 << 30, 5),
        (3001, 262_144, 6),
    ];
    for (n, max, seed) in cases {
        let original = random_keys(n, max, seed);
        let mut keys = original.clone();
        let mut values = identity(n);
        sorter.sort(&mut keys, &mut values);
        assert_sorted_permutation(&original, &keys, &values);
    }
}

#[test]
fn radix_sorts_keys_and_tracks_indices() {
    check_sorter(&RadixSorter::default());
}

#[test]
fn bitonic_sorts_keys_and_tracks_indices() {
    check_sorter(&BitonicSorter);
}

/// Keys drawn from {0, 1, 2, u32::MAX}, so real keys tie with the
/// bitonic padding value.
fn keys_with_max(n: usize, seed: u64) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| match rng.gen_range(0..4) {
            3 => u32::MAX,
            k => k,
        })
        .collect()
}

#[test]
fn max_keys_never_mix_with_padding() {
    for algo in [SortAlgorithm::Radix, SortAlgorithm::Bitonic] {
        for n in 2..40 {
            for seed in 0..8 {
                let original = keys_with_max(n, seed);
                let mut keys = original.clone();
                let mut values = identity(n);
                algo.sorter().sort(&mut keys, &mut values);
                assert_sorted_permutation(&original, &keys, &values);
            }
        }

        let original = vec![u32::MAX, 0, 0];
        let mut keys = original.clone();
        let mut values = identity(3);
        algo.sorter().sort(&mut keys, &mut values);
        assert_eq!(keys, vec![0, 0, u32::MAX], "{algo:?}");
        assert_eq!(values[2], 0, "{algo:?}");
    }
}

#[test]
fn radix_covers_keys_wider_than_one_digit() {
    let original = vec![0x10000, 1, 0x200, 5, 0xdead_beef, 0x0100_0000];
    let mut keys = original.clone();
    let mut values = identity(original.len());
    RadixSorter::default().sort(&mut keys, &mut values);
    assert_eq!(keys, vec![1, 5, 0x200, 0x10000, 0x0100_0000, 0xdead_beef]);
    assert_eq!(values, vec![1, 3, 2, 0, 5, 4]);
}

#[test]
fn empty_input_is_a_no_op() {
    for algo in [SortAlgorithm::Radix, SortAlgorithm::Bitonic] {
        let mut keys: Vec<u32> = Vec::new();
        let mut values: Vec<u32> = Vec::new();
        algo.sorter().sort(&mut keys, &mut values);
        assert!(keys.is_empty() && values.is_empty());
    }
}

#[test]
fn radix_keeps_ties_in_index_order() {
    let original = vec![3, 1, 3, 0, 1, 3];
    let mut keys = original.clone();
    let mut values = identity(original.len());
    RadixSorter::default().sort(&mut keys, &mut values);
    assert_eq!(keys, vec![0, 1, 1, 3, 3, 3]);
    assert_eq!(values, vec![3, 1, 4, 0, 2, 5]);
}

#[test]
fn all_zero_keys_leave_identity() {
    let mut keys = vec![0u32; 17];
    let mut values = identity(17);
    RadixSorter::default().sort(&mut keys, &mut values);
    assert_eq!(values, identity(17));
}

#[test]
fn backends_agree_on_key_order() {
    let original = random_keys(5000, 4096, 42);

    let mut radix_keys = original.clone();
    let mut radix_values = identity(original.len());
    SortAlgorithm::Radix.sorter().sort(&mut radix_keys, &mut radix_values);

    let mut bitonic_keys = original.clone();
    let mut bitonic_values = identity(original.len());
    SortAlgorithm::Bitonic.sorter().sort(&mut bitonic_keys, &mut bitonic_values);

    // tie order may differ, key order may not
    assert_eq!(radix_keys, bitonic_keys);
}

#[test]
fn sorter_names() {
    assert_eq!(SortAlgorithm::Radix.sorter().name(), "radix");
    assert_eq!(SortAlgorithm::Bitonic.sorter().name(), "bitonic");
}
