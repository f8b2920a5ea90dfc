//! Original-padding Keccak digests (256/512-bit) with a tree-parallel mode.
//!
//! The sequential form is the original Keccak submission (pad byte `0x01`,
//! not the NIST SHA-3 domain byte). The tree form absorbs a serialized
//! parameter block into each leaf before any message data, so leaf states —
//! and therefore the tree output — are domain-separated from the sequential
//! digest and from trees with different geometry.

use rayon::prelude::*;
use symx_core::keccak::{self, LANES};
use symx_core::{CryptoError, ParallelOptions};
use zeroize::Zeroize;

use crate::digest::Digest;

/// Rate of the 512-bit digest in bytes.
pub const KECCAK512_RATE: usize = 72;

/// Rate of the 256-bit digest in bytes.
pub const KECCAK256_RATE: usize = 136;

/// Default tree width in the parallel mode.
const DEF_FANOUT: usize = 8;

/// Tree geometry serialized into each leaf's first absorbed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeccakParams {
    digest_size: u32,
    block_size: u32,
    fanout: u32,
    node_offset: u32,
}

impl KeccakParams {
    /// One zero-padded rate block carrying the little-endian fields.
    fn to_block(self, rate: usize) -> Vec<u8> {
        let mut block = vec![0u8; rate];
        block[0..4].copy_from_slice(&self.digest_size.to_le_bytes());
        block[4..8].copy_from_slice(&self.block_size.to_le_bytes());
        block[8..12].copy_from_slice(&self.fanout.to_le_bytes());
        block[12..16].copy_from_slice(&self.node_offset.to_le_bytes());
        block
    }
}

#[derive(Clone)]
struct KeccakState {
    a: [u64; LANES],
}

impl KeccakState {
    fn new() -> Self {
        Self { a: [0u64; LANES] }
    }

    /// XOR one full rate block into the state and permute.
    fn absorb_block(&mut self, block: &[u8]) {
        debug_assert_eq!(block.len() % 8, 0);
        for (lane, chunk) in self.a.iter_mut().zip(block.chunks_exact(8)) {
            *lane ^= u64::from_le_bytes(chunk.try_into().expect("8-byte chunk"));
        }
        keccak::permute(&mut self.a);
    }

    /// Absorb the final block with the original Keccak padding. A full-rate
    /// final chunk is absorbed as-is and followed by a pad-only block.
    fn finish_block(&mut self, mut data: &[u8], rate: usize) {
        if data.len() == rate {
            self.absorb_block(data);
            data = &[];
        }
        let mut block = [0u8; KECCAK256_RATE];
        block[..data.len()].copy_from_slice(data);
        block[data.len()] = 0x01;
        block[rate - 1] |= 0x80;
        self.absorb_block(&block[..rate]);
    }

    fn squeeze(&self, out: &mut [u8]) {
        for (chunk, lane) in out.chunks_mut(8).zip(self.a.iter()) {
            chunk.copy_from_slice(&lane.to_le_bytes()[..chunk.len()]);
        }
    }
}

/// Original-padding Keccak digest; sequential, or tree-parallel over
/// `fanout` leaves.
pub struct KeccakDigest {
    buffer: Vec<u8>,
    buffer_len: usize,
    digest_size: usize,
    fanout: usize,
    profile: ParallelOptions,
    rate: usize,
    states: Vec<KeccakState>,
}

impl KeccakDigest {
    /// 512-bit digest (72-byte rate); `parallel` selects the tree form over
    /// the default fanout of 8.
    #[must_use]
    pub fn keccak512(parallel: bool) -> Self {
        Self::build(KECCAK512_RATE, 64, if parallel { DEF_FANOUT } else { 1 })
    }

    /// 256-bit digest (136-byte rate).
    #[must_use]
    pub fn keccak256(parallel: bool) -> Self {
        Self::build(KECCAK256_RATE, 32, if parallel { DEF_FANOUT } else { 1 })
    }

    /// 512-bit tree digest over an explicit leaf count.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidParameter`] unless `fanout` is an even number of
    /// at least 2 and at most 254.
    pub fn keccak512_with_fanout(fanout: usize) -> Result<Self, CryptoError> {
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
        Ok(Self::build(KECCAK512_RATE, 64, fanout))
    }

    fn build(rate: usize, digest_size: usize, fanout: usize) -> Self {
        let mut digest = Self {
            buffer: vec![0u8; fanout * rate],
            buffer_len: 0,
            digest_size,
            fanout,
            profile: ParallelOptions::new(rate, fanout > 1),
            rate,
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

    fn leaf_params(&self, node_offset: u32) -> KeccakParams {
        KeccakParams {
            digest_size: self.digest_size as u32,
            block_size: self.rate as u32,
            fanout: self.fanout as u32,
            node_offset,
        }
    }

    /// Absorb one block per leaf for every `fanout * rate` span of `data`.
    fn absorb_leaves(states: &mut [KeccakState], data: &[u8], rate: usize, parallel: bool) {
        let span = states.len() * rate;
        debug_assert_eq!(data.len() % span, 0);
        let batches = data.len() / span;

        let leaf_pass = |(i, state): (usize, &mut KeccakState)| {
            for batch in 0..batches {
                let off = batch * span + i * rate;
                state.absorb_block(&data[off..off + rate]);
            }
        };
        if parallel {
            states.par_iter_mut().enumerate().for_each(leaf_pass);
        } else {
            states.iter_mut().enumerate().for_each(leaf_pass);
        }
    }

    fn update_sequential(&mut self, mut input: &[u8]) {
        let rate = self.rate;
        if self.buffer_len != 0 && self.buffer_len + input.len() >= rate {
            let fill = rate - self.buffer_len;
            self.buffer[self.buffer_len..rate].copy_from_slice(&input[..fill]);
            self.states[0].absorb_block(&self.buffer[..rate]);
            self.buffer_len = 0;
            input = &input[fill..];
        }

        while input.len() >= rate {
            self.states[0].absorb_block(&input[..rate]);
            input = &input[rate..];
        }

        if !input.is_empty() {
            self.buffer[self.buffer_len..self.buffer_len + input.len()].copy_from_slice(input);
            self.buffer_len += input.len();
        }
    }

    fn update_parallel(&mut self, mut input: &[u8]) {
        let cap = self.buffer.len();
        let parallel = self.profile.is_parallel();
        if self.buffer_len != 0 && self.buffer_len + input.len() >= cap {
            let fill = cap - self.buffer_len;
            self.buffer[self.buffer_len..].copy_from_slice(&input[..fill]);
            Self::absorb_leaves(&mut self.states, &self.buffer, self.rate, parallel);
            self.buffer_len = 0;
            input = &input[fill..];
        }

        let aligned = input.len() - (input.len() % cap);
        if aligned > 0 {
            Self::absorb_leaves(&mut self.states, &input[..aligned], self.rate, parallel);
            input = &input[aligned..];
        }

        if !input.is_empty() {
            self.buffer[self.buffer_len..self.buffer_len + input.len()].copy_from_slice(input);
            self.buffer_len += input.len();
        }
    }

    fn finalize_parallel(&mut self, output: &mut [u8]) {
        let rate = self.rate;
        let digest_size = self.digest_size;
        let buffer_len = self.buffer_len;
        let buffer = &self.buffer;

        // Every leaf closes over its remaining slot bytes (possibly none).
        let leaves: Vec<Vec<u8>> = self
            .states
            .par_iter()
            .enumerate()
            .map(|(i, state)| {
                let start = (i * rate).min(buffer_len);
                let len = (buffer_len - start).min(rate);
                let mut leaf = state.clone();
                leaf.finish_block(&buffer[start..start + len], rate);
                let mut digest = vec![0u8; digest_size];
                leaf.squeeze(&mut digest);
                digest
            })
            .collect();

        // Root reduction over the concatenated leaf digests.
        let message: Vec<u8> = leaves.concat();
        let mut root = KeccakState::new();
        let aligned = message.len() - (message.len() % rate);
        for block in message[..aligned].chunks_exact(rate) {
            root.absorb_block(block);
        }
        root.finish_block(&message[aligned..], rate);
        root.squeeze(&mut output[..digest_size]);
    }
}

impl Digest for KeccakDigest {
    fn block_size(&self) -> usize {
        self.rate
    }

    fn digest_size(&self) -> usize {
        self.digest_size
    }

    fn name(&self) -> String {
        let base = match self.digest_size {
            32 => "Keccak256",
            _ => "Keccak512",
        };
        if self.is_parallel() {
            format!("{base}-P{}", self.fanout)
        } else {
            base.to_string()
        }
    }

    fn update(&mut self, input: &[u8]) {
        if input.is_empty() {
            return;
        }
        if self.is_parallel() {
            self.update_parallel(input);
        } else {
            self.update_sequential(input);
        }
    }

    fn finalize(&mut self, output: &mut [u8]) -> Result<usize, CryptoError> {
        if output.len() < self.digest_size {
            return Err(CryptoError::ShortBuffer {
                required: self.digest_size,
                actual: output.len(),
            });
        }

        if self.is_parallel() {
            self.finalize_parallel(output);
        } else {
            let mut state = self.states[0].clone();
            state.finish_block(&self.buffer[..self.buffer_len], self.rate);
            state.squeeze(&mut output[..self.digest_size]);
        }

        let written = self.digest_size;
        self.reset();
        Ok(written)
    }

    fn reset(&mut self) {
        self.buffer.zeroize();
        self.buffer_len = 0;
        self.states.clear();
        for i in 0..self.fanout {
            let mut state = KeccakState::new();
            if self.fanout > 1 {
                // Leaf domain separation: geometry block first.
                state.absorb_block(&self.leaf_params(i as u32).to_block(self.rate));
            }
            self.states.push(state);
        }
    }
}
