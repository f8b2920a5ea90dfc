//! Salsa20 core: scalar block function and lane-parallel variants.
//!
//! The lane kernels hold the 16-word state as structure-of-arrays — one
//! vector per state word, one lane per block — so that four or eight
//! counters advance through a single permutation. Lane output is
//! bit-identical to the scalar path; callers pick the width from the CPU
//! feature record.

use core::simd::Simd;

/// Keystream block size in bytes.
pub const BLOCK_SIZE: usize = 64;

/// Working-state words: constants, key, and nonce; the two counter words are
/// supplied per block.
pub const STATE_WORDS: usize = 14;

/// Assemble the 16-word Salsa20 matrix: working words 0..8, the little-endian
/// counter pair at 8 and 9, then working words 8..14.
#[inline]
fn build_state(wrk: &[u32; STATE_WORDS], counter: u64) -> [u32; 16] {
    let mut s = [0u32; 16];
    s[..8].copy_from_slice(&wrk[..8]);
    s[8] = counter as u32;
    s[9] = (counter >> 32) as u32;
    s[10..].copy_from_slice(&wrk[8..]);
    s
}

#[inline]
fn quarter(s: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    s[b] ^= s[a].wrapping_add(s[d]).rotate_left(7);
    s[c] ^= s[b].wrapping_add(s[a]).rotate_left(9);
    s[d] ^= s[c].wrapping_add(s[b]).rotate_left(13);
    s[a] ^= s[d].wrapping_add(s[c]).rotate_left(18);
}

/// Produce one 64-byte keystream block at `counter`.
///
/// `rounds` must be even; the caller validates it at initialization.
pub fn block(wrk: &[u32; STATE_WORDS], counter: u64, rounds: usize, out: &mut [u8; BLOCK_SIZE]) {
    let input = build_state(wrk, counter);
    let mut s = input;

    for _ in 0..rounds / 2 {
        // column round
        quarter(&mut s, 0, 4, 8, 12);
        quarter(&mut s, 5, 9, 13, 1);
        quarter(&mut s, 10, 14, 2, 6);
        quarter(&mut s, 15, 3, 7, 11);
        // row round
        quarter(&mut s, 0, 1, 2, 3);
        quarter(&mut s, 5, 6, 7, 4);
        quarter(&mut s, 10, 11, 8, 9);
        quarter(&mut s, 15, 12, 13, 14);
    }

    for (chunk, (word, orig)) in out.chunks_exact_mut(4).zip(s.iter().zip(input.iter())) {
        chunk.copy_from_slice(&word.wrapping_add(*orig).to_le_bytes());
    }
}

#[inline]
fn rotl_v<const L: usize>(x: Simd<u32, L>, n: u32) -> Simd<u32, L> {
    (x << Simd::splat(n)) | (x >> Simd::splat(32 - n))
}

#[inline]
fn quarter_v<const L: usize>(s: &mut [Simd<u32, L>; 16], a: usize, b: usize, c: usize, d: usize) {
    s[b] ^= rotl_v(s[a] + s[d], 7);
    s[c] ^= rotl_v(s[b] + s[a], 9);
    s[d] ^= rotl_v(s[c] + s[b], 13);
    s[a] ^= rotl_v(s[d] + s[c], 18);
}

/// Produce `L` consecutive keystream blocks (counters `counter .. counter+L`)
/// into `out`, which must hold exactly `L * BLOCK_SIZE` bytes.
pub fn block_wide<const L: usize>(
    wrk: &[u32; STATE_WORDS],
    counter: u64,
    rounds: usize,
    out: &mut [u8],
) {
    debug_assert_eq!(out.len(), L * BLOCK_SIZE);

    let scalar = build_state(wrk, counter);
    let mut input: [Simd<u32, L>; 16] = core::array::from_fn(|w| Simd::splat(scalar[w]));

    let mut lo = [0u32; L];
    let mut hi = [0u32; L];
    for lane in 0..L {
        let c = counter.wrapping_add(lane as u64);
        lo[lane] = c as u32;
        hi[lane] = (c >> 32) as u32;
    }
    input[8] = Simd::from_array(lo);
    input[9] = Simd::from_array(hi);

    let mut s = input;
    for _ in 0..rounds / 2 {
        quarter_v(&mut s, 0, 4, 8, 12);
        quarter_v(&mut s, 5, 9, 13, 1);
        quarter_v(&mut s, 10, 14, 2, 6);
        quarter_v(&mut s, 15, 3, 7, 11);
        quarter_v(&mut s, 0, 1, 2, 3);
        quarter_v(&mut s, 5, 6, 7, 4);
        quarter_v(&mut s, 10, 11, 8, 9);
        quarter_v(&mut s, 15, 12, 13, 14);
    }

    for w in 0..16 {
        let sum = (s[w] + input[w]).to_array();
        for (lane, value) in sum.iter().enumerate() {
            let off = lane * BLOCK_SIZE + w * 4;
            out[off..off + 4].copy_from_slice(&value.to_le_bytes());
        }
    }
}
