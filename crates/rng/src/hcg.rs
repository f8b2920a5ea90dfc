//! Hash-counter generator.
//!
//! Seed layout is an 8-byte little-endian counter followed by key material;
//! each output block is `digest(counter || key)` with the counter advanced
//! per block. Minimum seed sizes are tabulated per digest (counter length
//! plus the digest's input block material).

use symx_core::CryptoError;
use symx_hash::{Digest, DigestEngine, DigestKind};
use zeroize::{Zeroize, Zeroizing};

use crate::drbg::{Drbg, le_increment};

const COUNTER_SIZE: usize = 8;

/// Counter-mode generator over an engine digest.
pub struct HashCounterGenerator {
    counter: [u8; COUNTER_SIZE],
    engine: DigestEngine,
    is_initialized: bool,
    key: Zeroizing<Vec<u8>>,
}

impl HashCounterGenerator {
    /// Build over the named digest.
    #[must_use]
    pub fn new(kind: DigestKind) -> Self {
        Self {
            counter: [0u8; COUNTER_SIZE],
            engine: DigestEngine::new(kind),
            is_initialized: false,
            key: Zeroizing::new(Vec::new()),
        }
    }

    /// Minimum seed for `kind`: the 8-byte counter plus the digest's block
    /// material.
    #[must_use]
    pub fn min_seed_for(kind: DigestKind) -> usize {
        COUNTER_SIZE
            + match kind {
                DigestKind::Blake2b512 => 64,
                DigestKind::Keccak256 => 136,
                DigestKind::Keccak512 => 72,
                DigestKind::Sha256 => 64,
                DigestKind::Sha512 => 128,
            }
    }
}

impl Drbg for HashCounterGenerator {
    fn name(&self) -> String {
        format!("HCG-{}", self.engine.name())
    }

    fn min_seed_size(&self) -> usize {
        Self::min_seed_for(self.engine.kind())
    }

    fn initialize(&mut self, seed: &[u8]) -> Result<(), CryptoError> {
        if seed.len() < self.min_seed_size() {
            return Err(CryptoError::InvalidKeyMaterial(
                "seed must be at least the counter length plus the digest block size",
            ));
        }

        self.counter.copy_from_slice(&seed[..COUNTER_SIZE]);
        self.key.zeroize();
        *self.key = seed[COUNTER_SIZE..].to_vec();
        self.engine.reset();
        self.is_initialized = true;
        Ok(())
    }

    fn generate(&mut self, output: &mut [u8]) -> Result<usize, CryptoError> {
        if !self.is_initialized {
            return Err(CryptoError::InvalidState(
                "the generator has not been initialized",
            ));
        }

        let digest_size = self.engine.digest_size();
        let mut block = Zeroizing::new(vec![0u8; digest_size]);
        for chunk in output.chunks_mut(digest_size) {
            self.engine.update(&self.counter);
            self.engine.update(&self.key);
            self.engine.finalize(&mut block)?;
            chunk.copy_from_slice(&block[..chunk.len()]);
            le_increment(&mut self.counter);
        }
        Ok(output.len())
    }
}
