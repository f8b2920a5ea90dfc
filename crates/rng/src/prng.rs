//! Buffered PRNG taps over the generator cores.
//!
//! [`CounterRng`] amortizes small reads through a byte buffer of at least 64
//! bytes: `get_bytes` consumes the buffered remainder, then refills. Ranged
//! draws use rejection sampling against a power-of-two mask — never
//! bit-shift truncation, which biases the distribution. The taps implement
//! `rand_core::{RngCore, CryptoRng}` for ecosystem interoperability.

use rand_core::{CryptoRng, RngCore};
use symx_core::CryptoError;
use symx_hash::DigestKind;
use zeroize::Zeroizing;

use crate::{
    bcg::BlockCounterGenerator,
    drbg::Drbg,
    hcg::HashCounterGenerator,
    provider::{Provider, ProviderEngine, ProviderKind},
};

/// Smallest legal buffer size in bytes.
pub const BUFFER_MIN: usize = 64;

/// PRNG selector exposed at the engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrngKind {
    /// Block-cipher-counter tap.
    Bcr,
    /// Hash-counter tap.
    Hcr,
}

/// Buffered byte tap over a generator core.
pub struct CounterRng<G: Drbg> {
    buffer: Zeroizing<Vec<u8>>,
    buffer_index: usize,
    generator: G,
    provider: ProviderKind,
    seed: Option<Zeroizing<Vec<u8>>>,
}

/// The hash-counter PRNG (HCR).
pub type HashCounterRng = CounterRng<HashCounterGenerator>;

/// The block-cipher-counter PRNG (BCR).
pub type BlockCounterRng = CounterRng<BlockCounterGenerator>;

impl HashCounterRng {
    /// Hash-counter tap over the named digest, seeded from `provider`.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidParameter`] for a buffer below 64 bytes;
    /// provider errors propagate from the initial seeding.
    pub fn new(
        digest: DigestKind,
        provider: ProviderKind,
        buffer_size: usize,
    ) -> Result<Self, CryptoError> {
        Self::build(HashCounterGenerator::new(digest), provider, None, buffer_size)
    }

    /// Deterministic hash-counter tap over an explicit seed.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidKeyMaterial`] for a seed below the digest's
    /// minimum; [`CryptoError::InvalidParameter`] for a short buffer.
    pub fn with_seed(
        digest: DigestKind,
        seed: Vec<u8>,
        buffer_size: usize,
    ) -> Result<Self, CryptoError> {
        Self::build(
            HashCounterGenerator::new(digest),
            ProviderKind::Csp,
            Some(seed),
            buffer_size,
        )
    }
}

impl BlockCounterRng {
    /// Block-counter tap seeded from `provider`.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidParameter`] for a buffer below 64 bytes;
    /// provider errors propagate from the initial seeding.
    pub fn new(provider: ProviderKind, buffer_size: usize) -> Result<Self, CryptoError> {
        Self::build(BlockCounterGenerator::new(), provider, None, buffer_size)
    }

    /// Deterministic block-counter tap over an explicit seed.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidKeyMaterial`] for a seed below the minimum;
    /// [`CryptoError::InvalidParameter`] for a short buffer.
    pub fn with_seed(seed: Vec<u8>, buffer_size: usize) -> Result<Self, CryptoError> {
        Self::build(
            BlockCounterGenerator::new(),
            ProviderKind::Csp,
            Some(seed),
            buffer_size,
        )
    }
}

impl<G: Drbg> CounterRng<G> {
    fn build(
        generator: G,
        provider: ProviderKind,
        seed: Option<Vec<u8>>,
        buffer_size: usize,
    ) -> Result<Self, CryptoError> {
        if buffer_size < BUFFER_MIN {
            return Err(CryptoError::InvalidParameter(
                "buffer size must be at least 64 bytes",
            ));
        }
        if let Some(seed) = &seed {
            if seed.len() < generator.min_seed_size() {
                return Err(CryptoError::InvalidKeyMaterial(
                    "seed is below the generator minimum",
                ));
            }
        }

        let mut rng = Self {
            buffer: Zeroizing::new(vec![0u8; buffer_size]),
            buffer_index: 0,
            generator,
            provider,
            seed: seed.map(Zeroizing::new),
        };
        rng.reset()?;
        Ok(rng)
    }

    /// Tap name.
    #[must_use]
    pub fn name(&self) -> String {
        self.generator.name()
    }

    /// Re-seed (from the stored seed, or a fresh provider draw) and refill
    /// the buffer.
    ///
    /// # Errors
    ///
    /// Provider errors propagate; a stored seed never fails.
    pub fn reset(&mut self) -> Result<(), CryptoError> {
        match &self.seed {
            Some(seed) => self.generator.initialize(seed)?,
            None => {
                let mut provider = ProviderEngine::new(self.provider);
                let mut seed = Zeroizing::new(vec![0u8; self.generator.min_seed_size()]);
                provider.get_bytes(&mut seed)?;
                tracing::debug!(provider = provider.name(), "prng reseed");
                self.generator.initialize(&seed)?;
            }
        }
        self.generator.generate(&mut self.buffer)?;
        self.buffer_index = 0;
        Ok(())
    }

    /// Fill `output`, consuming the buffered remainder first.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidParameter`] for an empty request.
    pub fn get_bytes(&mut self, output: &mut [u8]) -> Result<(), CryptoError> {
        if output.is_empty() {
            return Err(CryptoError::InvalidParameter(
                "request must be at least 1 byte",
            ));
        }

        let buffered = self.buffer.len() - self.buffer_index;
        if buffered >= output.len() {
            output.copy_from_slice(&self.buffer[self.buffer_index..self.buffer_index + output.len()]);
            self.buffer_index += output.len();
            return Ok(());
        }

        output[..buffered].copy_from_slice(&self.buffer[self.buffer_index..]);
        let mut filled = buffered;
        let mut remaining = output.len() - buffered;

        while remaining > 0 {
            self.generator.generate(&mut self.buffer)?;
            if remaining > self.buffer.len() {
                output[filled..filled + self.buffer.len()].copy_from_slice(&self.buffer);
                filled += self.buffer.len();
                remaining -= self.buffer.len();
            } else {
                output[filled..].copy_from_slice(&self.buffer[..remaining]);
                self.buffer_index = remaining;
                remaining = 0;
            }
        }
        Ok(())
    }

    /// A little-endian 16-bit draw.
    ///
    /// # Errors
    ///
    /// Propagates generator failures.
    pub fn next_u16(&mut self) -> Result<u16, CryptoError> {
        let mut bytes = [0u8; 2];
        self.get_bytes(&mut bytes)?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// A little-endian 32-bit draw.
    ///
    /// # Errors
    ///
    /// Propagates generator failures.
    pub fn next_u32(&mut self) -> Result<u32, CryptoError> {
        let mut bytes = [0u8; 4];
        self.get_bytes(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// A little-endian 64-bit draw.
    ///
    /// # Errors
    ///
    /// Propagates generator failures.
    pub fn next_u64(&mut self) -> Result<u64, CryptoError> {
        let mut bytes = [0u8; 8];
        self.get_bytes(&mut bytes)?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Uniform draw in `0..=maximum` by rejection sampling.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidParameter`] when `maximum` is zero.
    pub fn next_u32_max(&mut self, maximum: u32) -> Result<u32, CryptoError> {
        if maximum == 0 {
            return Err(CryptoError::InvalidParameter("maximum can not be zero"));
        }
        let mask = u32::MAX >> maximum.leading_zeros();
        loop {
            let candidate = self.next_u32()? & mask;
            if candidate <= maximum {
                return Ok(candidate);
            }
        }
    }

    /// Uniform draw in `0..=maximum` by rejection sampling.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidParameter`] when `maximum` is zero.
    pub fn next_u64_max(&mut self, maximum: u64) -> Result<u64, CryptoError> {
        if maximum == 0 {
            return Err(CryptoError::InvalidParameter("maximum can not be zero"));
        }
        let mask = u64::MAX >> maximum.leading_zeros();
        loop {
            let candidate = self.next_u64()? & mask;
            if candidate <= maximum {
                return Ok(candidate);
            }
        }
    }

    /// Uniform draw in `minimum..=maximum`.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidParameter`] unless `minimum < maximum`.
    pub fn next_u32_range(&mut self, minimum: u32, maximum: u32) -> Result<u32, CryptoError> {
        if minimum >= maximum {
            return Err(CryptoError::InvalidParameter(
                "minimum must be below maximum",
            ));
        }
        Ok(minimum + self.next_u32_max(maximum - minimum)?)
    }
}

impl<G: Drbg> RngCore for CounterRng<G> {
    fn next_u32(&mut self) -> u32 {
        CounterRng::next_u32(self).expect("the generator is seeded at construction")
    }

    fn next_u64(&mut self) -> u64 {
        CounterRng::next_u64(self).expect("the generator is seeded at construction")
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if dest.is_empty() {
            return;
        }
        self.get_bytes(dest)
            .expect("the generator is seeded at construction");
    }
}

impl<G: Drbg> CryptoRng for CounterRng<G> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_seed(len: usize) -> Vec<u8> {
        (0..len as u32).map(|i| (i * 151) as u8).collect()
    }

    fn seeded_hcr(buffer_size: usize) -> HashCounterRng {
        HashCounterRng::with_seed(DigestKind::Blake2b512, fixed_seed(72), buffer_size)
            .expect("legal seed and buffer")
    }

    #[test]
    fn buffer_minimum_enforced() {
        assert!(matches!(
            HashCounterRng::with_seed(DigestKind::Blake2b512, fixed_seed(72), 63),
            Err(CryptoError::InvalidParameter(_))
        ));
    }

    #[test]
    fn short_seed_rejected() {
        assert!(matches!(
            HashCounterRng::with_seed(DigestKind::Blake2b512, fixed_seed(40), 128),
            Err(CryptoError::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn fixed_seed_reproduces() {
        let mut a = seeded_hcr(128);
        let mut b = seeded_hcr(128);
        let mut out_a = [0u8; 300];
        let mut out_b = [0u8; 300];
        a.get_bytes(&mut out_a).expect("seeded");
        b.get_bytes(&mut out_b).expect("seeded");
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn buffer_boundary_reads_are_continuous() {
        // One large read must equal the same stream read in odd pieces.
        let mut whole = seeded_hcr(64);
        let mut parts = seeded_hcr(64);

        let mut expected = [0u8; 257];
        whole.get_bytes(&mut expected).expect("seeded");

        let mut actual = [0u8; 257];
        let mut offset = 0;
        for piece in [1usize, 63, 64, 65, 64] {
            parts
                .get_bytes(&mut actual[offset..offset + piece])
                .expect("seeded");
            offset += piece;
        }
        assert_eq!(offset, actual.len());
        assert_eq!(expected, actual);
    }

    #[test]
    fn rejection_sampling_respects_bounds() {
        let mut rng = seeded_hcr(256);
        for maximum in [1u32, 2, 5, 100, 1 << 20] {
            for _ in 0..200 {
                let v = rng.next_u32_max(maximum).expect("seeded");
                assert!(v <= maximum, "draw {v} exceeded {maximum}");
            }
        }
    }

    #[test]
    fn ranged_draws_respect_bounds() {
        let mut rng = seeded_hcr(256);
        for _ in 0..200 {
            let v = rng.next_u32_range(10, 20).expect("seeded");
            assert!((10..=20).contains(&v));
        }
    }

    #[test]
    fn zero_maximum_rejected() {
        let mut rng = seeded_hcr(64);
        assert!(rng.next_u32_max(0).is_err());
    }

    #[test]
    fn bcr_fixed_seed_reproduces() {
        let seed = fixed_seed(48);
        let mut a = BlockCounterRng::with_seed(seed.clone(), 64).expect("legal seed");
        let mut b = BlockCounterRng::with_seed(seed, 64).expect("legal seed");
        let mut out_a = [0u8; 128];
        let mut out_b = [0u8; 128];
        a.get_bytes(&mut out_a).expect("seeded");
        b.get_bytes(&mut out_b).expect("seeded");
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn rand_core_interface_works() {
        use rand_core::RngCore as _;
        let mut rng = seeded_hcr(64);
        let mut buf = [0u8; 16];
        rng.fill_bytes(&mut buf);
        let _ = RngCore::next_u32(&mut rng);
        let _ = RngCore::next_u64(&mut rng);
    }

    #[test]
    fn reset_with_fixed_seed_rewinds_stream() {
        let mut rng = seeded_hcr(64);
        let mut first = [0u8; 32];
        rng.get_bytes(&mut first).expect("seeded");
        rng.reset().expect("stored seed");
        let mut replay = [0u8; 32];
        rng.get_bytes(&mut replay).expect("seeded");
        assert_eq!(first, replay);
    }
}
