//! Key/index sorting behind one interface.
//!
//! `sort(keys, values)` expects `values` to hold the identity permutation.
//! Afterwards `keys` is ascending and `values[i]` is the original index of
//! the element now at `i`. Equal keys may come out in any order.
//!
//! Scratch storage is allocated with plain `Vec`s; running out of memory
//! aborts the process, there is no recovery path.

use rayon::prelude::*;

pub trait KeyIndexSorter: Send + Sync {
    fn name(&self) -> &'static str;
    fn sort(&self, keys: &mut [u32], values: &mut [u32]);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortAlgorithm {
    #[default]
    Radix,
    Bitonic,
}

impl SortAlgorithm {
    pub fn sorter(self) -> &'static dyn KeyIndexSorter {
        static RADIX: RadixSorter = RadixSorter;
        static BITONIC: BitonicSorter = BitonicSorter;
        match self {
            SortAlgorithm::Radix => &RADIX,
            SortAlgorithm::Bitonic => &BITONIC,
        }
    }
}

// ========================== radix ====================================

const RADIX_BITS: u32 = 8;
const RADIX_BUCKETS: usize = 1 << RADIX_BITS;

/// LSD radix sort, 8 bits per pass. Stable, so ties keep index order.
/// The pass count follows the widest key present, up to all 32 bits.
#[derive(Clone, Copy, Debug, Default)]
pub struct RadixSorter;

impl KeyIndexSorter for RadixSorter {
    fn name(&self) -> &'static str {
        "radix"
    }

    fn sort(&self, keys: &mut [u32], values: &mut [u32]) {
        debug_assert_eq!(keys.len(), values.len());
        let n = keys.len();
        if n < 2 {
            return;
        }

        let max_key = keys.iter().copied().max().unwrap_or(0);
        let used_bits = u32::BITS - max_key.leading_zeros();
        let passes = used_bits.div_ceil(RADIX_BITS);
        if passes == 0 {
            return; // all keys zero
        }

        let mut key_tmp = vec![0u32; n];
        let mut val_tmp = vec![0u32; n];
        let mut in_scratch = false;

        for pass in 0..passes {
            let shift = pass * RADIX_BITS;
            let (src_k, src_v, dst_k, dst_v): (&[u32], &[u32], &mut [u32], &mut [u32]) =
                if in_scratch {
                    (&key_tmp[..], &val_tmp[..], &mut keys[..], &mut values[..])
                } else {
                    (&keys[..], &values[..], &mut key_tmp[..], &mut val_tmp[..])
                };

            let mut offsets = [0usize; RADIX_BUCKETS];
            for &k in src_k {
                offsets[digit(k, shift)] += 1;
            }
            let mut sum = 0;
            for slot in offsets.iter_mut() {
                let count = *slot;
                *slot = sum;
                sum += count;
            }
            for (&k, &v) in src_k.iter().zip(src_v) {
                let d = digit(k, shift);
                dst_k[offsets[d]] = k;
                dst_v[offsets[d]] = v;
                offsets[d] += 1;
            }
            in_scratch = !in_scratch;
        }

        if in_scratch {
            keys.copy_from_slice(&key_tmp);
            values.copy_from_slice(&val_tmp);
        }
    }
}

#[inline]
fn digit(key: u32, shift: u32) -> usize {
    ((key >> shift) as usize) & (RADIX_BUCKETS - 1)
}

// ========================== bitonic ==================================

/// Bitonic merge network over a power-of-two padded copy. Each
/// compare-exchange pass runs in parallel over disjoint blocks.
///
/// Keys are widened to `key << 1 | pad`, so padding orders strictly after
/// every real element, `u32::MAX` keys included. The GPU kernel compares
/// the same `(key, pad)` pairs.
#[derive(Clone, Copy, Debug, Default)]
pub struct BitonicSorter;

impl KeyIndexSorter for BitonicSorter {
    fn name(&self) -> &'static str {
        "bitonic"
    }

    fn sort(&self, keys: &mut [u32], values: &mut [u32]) {
        debug_assert_eq!(keys.len(), values.len());
        let n = keys.len();
        if n < 2 {
            return;
        }

        let padded = n.next_power_of_two();
        let mut k_buf: Vec<u64> = Vec::with_capacity(padded);
        k_buf.extend(keys.iter().map(|&k| u64::from(k) << 1));
        k_buf.resize(padded, PAD_KEY);
        let mut v_buf = Vec::with_capacity(padded);
        v_buf.extend_from_slice(values);
        v_buf.resize(padded, 0);

        let mut k = 2;
        while k <= padded {
            let mut j = k / 2;
            while j > 0 {
                bitonic_pass(&mut k_buf, &mut v_buf, j, k);
                j /= 2;
            }
            k *= 2;
        }

        // padding sorts to the tail
        for (dst, &wide) in keys.iter_mut().zip(&k_buf[..n]) {
            *dst = (wide >> 1) as u32;
        }
        values.copy_from_slice(&v_buf[..n]);
    }
}

// (u32::MAX, pad = 1)
const PAD_KEY: u64 = u64::MAX;

// element i pairs with i ^ j; inside a block of 2j that is l <-> l + j,
// and the direction bit (i & k) is constant across the block since k >= 2j
fn bitonic_pass(keys: &mut [u64], values: &mut [u32], j: usize, k: usize) {
    let block = 2 * j;
    keys.par_chunks_mut(block)
        .zip(values.par_chunks_mut(block))
        .enumerate()
        .for_each(|(b, (kc, vc))| {
            let ascending = (b * block) & k == 0;
            let (k_lo, k_hi) = kc.split_at_mut(j);
            let (v_lo, v_hi) = vc.split_at_mut(j);
            for l in 0..j {
                let out_of_order = if ascending {
                    k_lo[l] > k_hi[l]
                } else {
                    k_lo[l] < k_hi[l]
                };
                if out_of_order {
                    std::mem::swap(&mut k_lo[l], &mut k_hi[l]);
                    std::mem::swap(&mut v_lo[l], &mut v_hi[l]);
                }
            }
        });
}
