//! `symx` — a symmetric cryptography engine.
//!
//! A unified engine for authenticated encryption, keyed hashing, and
//! deterministic random-bit generation, composed from a small set of
//! primitive permutations:
//!
//! - **AEAD**: [`Gcm`] over Rijndael — an online GCM state machine with
//!   single-session associated-data reuse, nonce auto-increment, and
//!   fork-join parallel block processing.
//! - **Digests**: [`Blake2b512`] and [`KeccakDigest`] with sequential and
//!   tree-parallel modes (the tree output differs by design), plus SHA-2
//!   adapters and [`Hmac`].
//! - **Stream cipher**: [`Salsa20`] in counter mode with lane-parallel
//!   keystream generation.
//! - **Entropy and DRBGs**: the system and CPU-jitter providers, the
//!   hash-counter and block-counter generators, and buffered PRNG taps.
//!
//! # Design principles
//!
//! - **No `unsafe`** — enforced by `#![deny(unsafe_code)]` in every crate.
//! - **Nightly `portable_simd`** for vectorized keystream generation with a
//!   bit-identical scalar fallback.
//! - **RAII zeroization** of secret material via the `zeroize` crate.
//! - **Constant-time** tag verification and secret-dependent operations;
//!   engine instances are not `Clone` and zeroize on drop.

#![deny(unsafe_code)]

pub use symx_core::{
    CryptoError, ParallelOptions, SymmetricKey, SymmetricKeySize, cpu, ct,
};
pub use symx_cipher::{
    BlockCipherKind, CipherModeKind, Ctr, Gcm, Ghash, Salsa20, StreamCipherKind,
};
pub use symx_hash::{
    Blake2b512, Digest, DigestEngine, DigestKind, Hmac, KeccakDigest, Sha256Digest, Sha512Digest,
};
pub use symx_rng::{
    BlockCounterGenerator, BlockCounterRng, CounterRng, Drbg, HashCounterGenerator,
    HashCounterRng, JitterProvider, PrngKind, Provider, ProviderEngine, ProviderKind,
    SystemProvider,
};
