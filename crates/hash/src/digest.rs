//! Digest trait and engine dispatch.
//!
//! Algorithm selection is a tagged enum rather than a trait object: one
//! variant per digest, matched at the call site, no allocation per
//! construction.

use symx_core::CryptoError;

use crate::{
    blake2b::Blake2b512,
    keccak::KeccakDigest,
    sha2::{Sha256Digest, Sha512Digest},
};

/// Streaming digest interface.
///
/// `finalize` writes the digest, resets the state, and returns the digest
/// size; `compute` is the one-shot `update` + `finalize` composition.
pub trait Digest {
    /// Internal block size in bytes.
    fn block_size(&self) -> usize;

    /// Output size in bytes.
    fn digest_size(&self) -> usize;

    /// Algorithm name; tree-parallel modes report a distinct name.
    fn name(&self) -> String;

    /// Absorb message bytes.
    fn update(&mut self, input: &[u8]);

    /// Write the digest into `output`, reset the state, and return the
    /// number of bytes written.
    ///
    /// # Errors
    ///
    /// [`CryptoError::ShortBuffer`] when `output` is smaller than the digest.
    fn finalize(&mut self, output: &mut [u8]) -> Result<usize, CryptoError>;

    /// Reset to the initial (post-construction) state.
    fn reset(&mut self);

    /// One-shot digest of `input`.
    ///
    /// # Errors
    ///
    /// [`CryptoError::ShortBuffer`] when `output` is smaller than the digest.
    fn compute(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CryptoError> {
        self.update(input);
        self.finalize(output)
    }
}

/// Digest selector exposed at the engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestKind {
    /// BLAKE2b with a 512-bit output.
    Blake2b512,
    /// Original-padding Keccak with a 256-bit output.
    Keccak256,
    /// Original-padding Keccak with a 512-bit output.
    Keccak512,
    /// SHA-256 (FIPS 180-4).
    Sha256,
    /// SHA-512 (FIPS 180-4).
    Sha512,
}

/// A digest instance dispatched over [`DigestKind`].
pub enum DigestEngine {
    Blake2b512(Blake2b512),
    Keccak256(KeccakDigest),
    Keccak512(KeccakDigest),
    Sha256(Sha256Digest),
    Sha512(Sha512Digest),
}

impl DigestEngine {
    /// Instantiate the sequential form of `kind`.
    #[must_use]
    pub fn new(kind: DigestKind) -> Self {
        match kind {
            DigestKind::Blake2b512 => Self::Blake2b512(Blake2b512::new(false)),
            DigestKind::Keccak256 => Self::Keccak256(KeccakDigest::keccak256(false)),
            DigestKind::Keccak512 => Self::Keccak512(KeccakDigest::keccak512(false)),
            DigestKind::Sha256 => Self::Sha256(Sha256Digest::new()),
            DigestKind::Sha512 => Self::Sha512(Sha512Digest::new()),
        }
    }

    /// The selector this engine was built from.
    #[must_use]
    pub fn kind(&self) -> DigestKind {
        match self {
            Self::Blake2b512(_) => DigestKind::Blake2b512,
            Self::Keccak256(_) => DigestKind::Keccak256,
            Self::Keccak512(_) => DigestKind::Keccak512,
            Self::Sha256(_) => DigestKind::Sha256,
            Self::Sha512(_) => DigestKind::Sha512,
        }
    }

    fn inner(&self) -> &dyn Digest {
        match self {
            Self::Blake2b512(d) => d,
            Self::Keccak256(d) | Self::Keccak512(d) => d,
            Self::Sha256(d) => d,
            Self::Sha512(d) => d,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Digest {
        match self {
            Self::Blake2b512(d) => d,
            Self::Keccak256(d) | Self::Keccak512(d) => d,
            Self::Sha256(d) => d,
            Self::Sha512(d) => d,
        }
    }
}

impl Digest for DigestEngine {
    fn block_size(&self) -> usize {
        self.inner().block_size()
    }

    fn digest_size(&self) -> usize {
        self.inner().digest_size()
    }

    fn name(&self) -> String {
        self.inner().name()
    }

    fn update(&mut self, input: &[u8]) {
        self.inner_mut().update(input);
    }

    fn finalize(&mut self, output: &mut [u8]) -> Result<usize, CryptoError> {
        self.inner_mut().finalize(output)
    }

    fn reset(&mut self) {
        self.inner_mut().reset();
    }
}
