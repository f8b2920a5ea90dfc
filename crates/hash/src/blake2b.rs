//! BLAKE2b-512 digest with sequential and tree-parallel (BLAKE2bp) modes.
//!
//! The two modes produce different digests for the same input: the tree
//! parameter block is mixed into every leaf's initial chain value, which is
//! exactly the domain separation the construction intends. Leaf `i` is
//! created with `node_offset = i` at depth 0; the root node re-digests the
//! concatenated leaf outputs at depth 1 with the last-node flag set.

use rayon::prelude::*;
use symx_core::blake2b::{self, BLOCK_SIZE, CHAIN_WORDS, IV};
use symx_core::{CryptoError, ParallelOptions};
use zeroize::Zeroize;

use crate::digest::Digest;

/// Output size in bytes.
pub const DIGEST_SIZE: usize = 64;

/// Default tree width in the parallel mode.
const DEF_FANOUT: usize = 4;

/// Tree configuration mixed into the chain value at initialization.
///
/// Serialized as the eight little-endian words of the BLAKE2b parameter
/// block; changing any field changes every digest produced under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blake2bParams {
    digest_len: u8,
    key_len: u8,
    fanout: u8,
    depth: u8,
    leaf_length: u32,
    node_offset: u64,
    node_depth: u8,
    inner_length: u8,
}

impl Blake2bParams {
    fn sequential() -> Self {
        Self {
            digest_len: DIGEST_SIZE as u8,
            key_len: 0,
            fanout: 1,
            depth: 1,
            leaf_length: 0,
            node_offset: 0,
            node_depth: 0,
            inner_length: 0,
        }
    }

    fn leaf(fanout: u8, node_offset: u64, leaf_length: u32) -> Self {
        Self {
            digest_len: DIGEST_SIZE as u8,
            key_len: 0,
            fanout,
            depth: 2,
            leaf_length,
            node_offset,
            node_depth: 0,
            inner_length: DIGEST_SIZE as u8,
        }
    }

    fn root(fanout: u8, leaf_length: u32) -> Self {
        Self {
            node_offset: 0,
            node_depth: 1,
            ..Self::leaf(fanout, 0, leaf_length)
        }
    }

    fn to_words(&self) -> [u64; CHAIN_WORDS] {
        let mut w = [0u64; CHAIN_WORDS];
        w[0] = u64::from(self.digest_len)
            | u64::from(self.key_len) << 8
            | u64::from(self.fanout) << 16
            | u64::from(self.depth) << 24
            | u64::from(self.leaf_length) << 32;
        w[1] = self.node_offset;
        w[2] = u64::from(self.node_depth) | u64::from(self.inner_length) << 8;
        w
    }
}

/// Per-node chain state.
#[derive(Clone)]
struct Blake2bState {
    h: [u64; CHAIN_WORDS],
    t: [u64; 2],
}

impl Blake2bState {
    fn new(params: &Blake2bParams) -> Self {
        let words = params.to_words();
        let mut h = IV;
        for (chain, word) in h.iter_mut().zip(words.iter()) {
            *chain ^= word;
        }
        Self { h, t: [0, 0] }
    }

    fn increase(&mut self, bytes: u64) {
        self.t[0] = self.t[0].wrapping_add(bytes);
        if self.t[0] < bytes {
            self.t[1] = self.t[1].wrapping_add(1);
        }
    }

    /// Compress one interior block.
    fn process(&mut self, block: &[u8]) {
        self.increase(BLOCK_SIZE as u64);
        let block: &[u8; BLOCK_SIZE] = block.try_into().expect("one compression block");
        blake2b::compress(&mut self.h, block, &self.t, &[0, 0]);
    }

    /// Compress the final block: `len` valid bytes, zero padding beyond.
    fn finish(&mut self, block: &[u8], len: usize, last_node: bool) {
        self.increase(len as u64);
        let mut last = [0u8; BLOCK_SIZE];
        last[..block.len().min(BLOCK_SIZE)].copy_from_slice(&block[..block.len().min(BLOCK_SIZE)]);
        let f = [u64::MAX, if last_node { u64::MAX } else { 0 }];
        blake2b::compress(&mut self.h, &last, &self.t, &f);
    }

    fn digest_bytes(&self) -> [u8; DIGEST_SIZE] {
        let mut out = [0u8; DIGEST_SIZE];
        for (chunk, word) in out.chunks_exact_mut(8).zip(self.h.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }
}

/// BLAKE2b-512 digest; sequential, or tree-parallel over `fanout` leaves.
pub struct Blake2b512 {
    buffer: Vec<u8>,
    buffer_len: usize,
    fanout: usize,
    leaf_length: u32,
    profile: ParallelOptions,
    states: Vec<Blake2bState>,
}

impl Blake2b512 {
    /// Sequential BLAKE2b-512, or the tree-parallel BLAKE2bp form over the
    /// default fanout of 4.
    #[must_use]
    pub fn new(parallel: bool) -> Self {
        let fanout = if parallel { DEF_FANOUT } else { 1 };
        Self::build(fanout, parallel)
    }

    /// Tree-parallel digest over an explicit leaf count.
    ///
    /// The fanout is a tree parameter: every distinct value yields a distinct
    /// digest family.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidParameter`] unless `fanout` is an even number of
    /// at least 2 and at most 254.
    pub fn with_fanout(fanout: usize) -> Result<Self, CryptoError> {
        if fanout < 2 || fanout % 2 != 0 {
            return Err(CryptoError::InvalidParameter(
                "tree fanout must be an even number greater than 1",
            ));
        }
        if fanout > 254 {
            return Err(CryptoError::InvalidParameter(
                "tree fanout can not exceed 254",
            ));
        }
        Ok(Self::build(fanout, true))
    }

    /// Tree digest with an explicit leaf length.
    ///
    /// The leaf length is a tree parameter: it domain-separates the digest
    /// family without changing the block-level leaf rotation.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidParameter`] for an illegal fanout, or a nonzero
    /// leaf length that is not a multiple of the block size.
    pub fn with_fanout_and_leaf_length(
        fanout: usize,
        leaf_length: u32,
    ) -> Result<Self, CryptoError> {
        if leaf_length != 0 && leaf_length as usize % BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidParameter(
                "leaf length must be evenly divisible by the digest block size",
            ));
        }
        let mut digest = Self::with_fanout(fanout)?;
        digest.leaf_length = leaf_length;
        digest.reset();
        Ok(digest)
    }

    fn build(fanout: usize, parallel: bool) -> Self {
        let mut digest = Self {
            buffer: vec![0u8; fanout * BLOCK_SIZE],
            buffer_len: 0,
            fanout,
            leaf_length: 0,
            profile: ParallelOptions::new(BLOCK_SIZE, parallel),
            states: Vec::with_capacity(fanout),
        };
        digest.reset();
        digest
    }

    /// Whether the tree-parallel mode is active.
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        self.fanout > 1
    }

    /// The fork-join profile; degree overrides validate against the core
    /// count.
    pub fn parallel_profile(&mut self) -> &mut ParallelOptions {
        &mut self.profile
    }

    /// Compress one block per leaf for every `fanout * BLOCK_SIZE` span of
    /// `data`; leaf `i` reads the stride starting at `i * BLOCK_SIZE`.
    fn compress_leaves(states: &mut [Blake2bState], data: &[u8], parallel: bool) {
        let span = states.len() * BLOCK_SIZE;
        debug_assert_eq!(data.len() % span, 0);
        let batches = data.len() / span;

        let leaf_pass = |(i, state): (usize, &mut Blake2bState)| {
            for batch in 0..batches {
                let off = batch * span + i * BLOCK_SIZE;
                state.process(&data[off..off + BLOCK_SIZE]);
            }
        };
        if parallel {
            states.par_iter_mut().enumerate().for_each(leaf_pass);
        } else {
            states.iter_mut().enumerate().for_each(leaf_pass);
        }
    }

    fn update_sequential(&mut self, mut input: &[u8]) {
        if input.is_empty() {
            return;
        }

        // Hold the last full block back: it may be the final one.
        if self.buffer_len + input.len() > BLOCK_SIZE {
            let fill = BLOCK_SIZE - self.buffer_len;
            self.buffer[self.buffer_len..BLOCK_SIZE].copy_from_slice(&input[..fill]);
            input = &input[fill..];
            self.states[0].process(&self.buffer[..BLOCK_SIZE]);
            self.buffer_len = 0;

            while input.len() > BLOCK_SIZE {
                self.states[0].process(&input[..BLOCK_SIZE]);
                input = &input[BLOCK_SIZE..];
            }
        }

        self.buffer[self.buffer_len..self.buffer_len + input.len()].copy_from_slice(input);
        self.buffer_len += input.len();
    }

    fn update_parallel(&mut self, mut input: &[u8]) {
        if input.is_empty() {
            return;
        }
        let cap = self.buffer.len();

        if self.buffer_len + input.len() > cap {
            let parallel = self.profile.is_parallel();
            let fill = cap - self.buffer_len;
            self.buffer[self.buffer_len..].copy_from_slice(&input[..fill]);
            input = &input[fill..];
            Self::compress_leaves(&mut self.states, &self.buffer, parallel);
            self.buffer_len = 0;

            // Stream whole batches directly, holding the last one back for
            // finalization.
            let mut aligned = input.len() - (input.len() % cap);
            if aligned == input.len() {
                aligned -= cap;
            }
            if aligned > 0 {
                Self::compress_leaves(&mut self.states, &input[..aligned], parallel);
                input = &input[aligned..];
            }
        }

        self.buffer[self.buffer_len..self.buffer_len + input.len()].copy_from_slice(input);
        self.buffer_len += input.len();
    }

    fn finalize_sequential(&mut self) -> [u8; DIGEST_SIZE] {
        let mut state = self.states[0].clone();
        state.finish(&self.buffer[..self.buffer_len], self.buffer_len, false);
        state.digest_bytes()
    }

    fn finalize_parallel(&mut self) -> [u8; DIGEST_SIZE] {
        // Every leaf finalizes, including leaves with no remaining bytes;
        // the last leaf carries the last-node flag.
        let fanout = self.fanout;
        let buffer_len = self.buffer_len;
        let buffer = &self.buffer;
        let leaves: Vec<[u8; DIGEST_SIZE]> = self
            .states
            .par_iter()
            .enumerate()
            .map(|(i, state)| {
                let start = (i * BLOCK_SIZE).min(buffer_len);
                let len = (buffer_len - start).min(BLOCK_SIZE);
                let mut leaf = state.clone();
                leaf.finish(&buffer[start..start + len], len, i == fanout - 1);
                leaf.digest_bytes()
            })
            .collect();

        // Root reduction: the concatenated leaf digests form the root
        // node's message, closed with the last-node flag.
        let mut root = Blake2bState::new(&Blake2bParams::root(fanout as u8, self.leaf_length));
        let message: Vec<u8> = leaves.concat();
        let (interior, last) = message.split_at(message.len() - BLOCK_SIZE);
        for block in interior.chunks_exact(BLOCK_SIZE) {
            root.process(block);
        }
        root.finish(last, BLOCK_SIZE, true);
        root.digest_bytes()
    }
}

impl Digest for Blake2b512 {
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    fn digest_size(&self) -> usize {
        DIGEST_SIZE
    }

    fn name(&self) -> String {
        if self.is_parallel() {
            format!("Blake2bp512-{}", self.fanout)
        } else {
            "Blake2b512".to_string()
        }
    }

    fn update(&mut self, input: &[u8]) {
        if self.is_parallel() {
            self.update_parallel(input);
        } else {
            self.update_sequential(input);
        }
    }

    fn finalize(&mut self, output: &mut [u8]) -> Result<usize, CryptoError> {
        if output.len() < DIGEST_SIZE {
            return Err(CryptoError::ShortBuffer {
                required: DIGEST_SIZE,
                actual: output.len(),
            });
        }

        let digest = if self.is_parallel() {
            self.finalize_parallel()
        } else {
            self.finalize_sequential()
        };
        output[..DIGEST_SIZE].copy_from_slice(&digest);
        self.reset();
        Ok(DIGEST_SIZE)
    }

    fn reset(&mut self) {
        self.buffer.zeroize();
        self.buffer_len = 0;
        self.states.clear();
        if self.fanout == 1 {
            self.states.push(Blake2bState::new(&Blake2bParams::sequential()));
        } else {
            for i in 0..self.fanout {
                self.states.push(Blake2bState::new(&Blake2bParams::leaf(
                    self.fanout as u8,
                    i as u64,
                    self.leaf_length,
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn empty_message_kat() {
        let mut digest = Blake2b512::new(false);
        let mut out = [0u8; DIGEST_SIZE];
        digest.compute(&[], &mut out).expect("output fits");
        assert_eq!(
            hex(&out),
            "786a02f742015903c6c6fd852552d272912f4740e15847618a86e217f71f5419\
             d25e1031afee585313896444934eb04b903a685b1448b755d56f701afe9be2ce"
        );
    }

    #[test]
    fn abc_kat() {
        let mut digest = Blake2b512::new(false);
        let mut out = [0u8; DIGEST_SIZE];
        digest.compute(b"abc", &mut out).expect("output fits");
        assert_eq!(
            hex(&out),
            "ba80a53f981c4d0d6a2797b69f12f6e94c212f14685ac4b74b12bb6fdbffa2d1\
             7d87c5392aac055c9c13644ec93111b2d77f5973e1939b71eb6ba32c6bee5c2e"
        );
    }

    #[test]
    fn one_shot_equals_chunked() {
        let data: Vec<u8> = (0..100_000u32).map(|i| i as u8).collect();
        let mut one = [0u8; DIGEST_SIZE];
        Blake2b512::new(false).compute(&data, &mut one).expect("output fits");

        let mut digest = Blake2b512::new(false);
        for chunk in data.chunks(977) {
            digest.update(chunk);
        }
        let mut many = [0u8; DIGEST_SIZE];
        digest.finalize(&mut many).expect("output fits");
        assert_eq!(one, many);
    }

    #[test]
    fn parallel_one_shot_equals_chunked() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i * 31) as u8).collect();
        let mut one = [0u8; DIGEST_SIZE];
        Blake2b512::new(true).compute(&data, &mut one).expect("output fits");

        let mut digest = Blake2b512::new(true);
        for chunk in data.chunks(1021) {
            digest.update(chunk);
        }
        let mut many = [0u8; DIGEST_SIZE];
        digest.finalize(&mut many).expect("output fits");
        assert_eq!(one, many);
    }

    #[test]
    fn parallel_differs_from_sequential() {
        let data = [0x42u8; 4096];
        let mut seq = [0u8; DIGEST_SIZE];
        let mut par = [0u8; DIGEST_SIZE];
        Blake2b512::new(false).compute(&data, &mut seq).expect("output fits");
        Blake2b512::new(true).compute(&data, &mut par).expect("output fits");
        assert_ne!(seq, par);
    }

    #[test]
    fn fanout_changes_output() {
        let data = [0x17u8; 2048];
        let mut four = [0u8; DIGEST_SIZE];
        let mut eight = [0u8; DIGEST_SIZE];
        Blake2b512::with_fanout(4)
            .expect("legal fanout")
            .compute(&data, &mut four)
            .expect("output fits");
        Blake2b512::with_fanout(8)
            .expect("legal fanout")
            .compute(&data, &mut eight)
            .expect("output fits");
        assert_ne!(four, eight);
    }

    #[test]
    fn odd_fanout_rejected() {
        assert!(matches!(
            Blake2b512::with_fanout(3),
            Err(CryptoError::InvalidParameter(_))
        ));
    }

    #[test]
    fn leaf_length_must_align_to_block_size() {
        assert!(matches!(
            Blake2b512::with_fanout_and_leaf_length(4, 100),
            Err(CryptoError::InvalidParameter(_))
        ));
        Blake2b512::with_fanout_and_leaf_length(4, 16384).expect("aligned leaf length");
    }

    #[test]
    fn leaf_length_separates_digest_families() {
        let data = [0x61u8; 1024];
        let mut default_leaf = [0u8; DIGEST_SIZE];
        let mut sized_leaf = [0u8; DIGEST_SIZE];
        Blake2b512::with_fanout(4)
            .expect("legal fanout")
            .compute(&data, &mut default_leaf)
            .expect("output fits");
        Blake2b512::with_fanout_and_leaf_length(4, 4096)
            .expect("aligned leaf length")
            .compute(&data, &mut sized_leaf)
            .expect("output fits");
        assert_ne!(default_leaf, sized_leaf);
    }

    #[test]
    fn finalize_resets_for_reuse() {
        let mut digest = Blake2b512::new(true);
        let mut first = [0u8; DIGEST_SIZE];
        let mut second = [0u8; DIGEST_SIZE];
        digest.compute(b"same input", &mut first).expect("output fits");
        digest.compute(b"same input", &mut second).expect("output fits");
        assert_eq!(first, second);
    }

    #[test]
    fn short_output_rejected() {
        let mut digest = Blake2b512::new(false);
        let mut out = [0u8; 32];
        assert!(matches!(
            digest.finalize(&mut out),
            Err(CryptoError::ShortBuffer { .. })
        ));
    }
}
