//! `symx-core` — primitive permutations and shared engine plumbing.
//!
//! The pure building blocks of the engine: the Rijndael block transform, the
//! BLAKE2b compression function, the Keccak-f[1600] permutation, and the
//! Salsa20 core with its lane-parallel variants. Alongside them live the
//! pieces every higher layer shares: the error type, the key container, the
//! constant-time helpers, the one-shot CPU feature record, and the parallel
//! processing profile.
//!
//! # Design principles
//!
//! - **No `unsafe`** — enforced by `#![deny(unsafe_code)]`.
//! - **Nightly `portable_simd`** for vectorized keystream generation with a
//!   scalar fallback that is bit-identical.
//! - **RAII zeroization** of secret material via the `zeroize` crate.
//! - **Constant-time** operations for secret-dependent comparisons; fixed
//!   tables only, indexed without secret-dependent cache patterns beyond the
//!   S-box itself.

#![feature(portable_simd)]
#![deny(unsafe_code)]

pub mod blake2b;
pub mod cpu;
pub mod ct;
pub mod error;
pub mod keccak;
pub mod key;
pub mod parallel;
pub mod rijndael;
pub mod salsa;

pub use error::CryptoError;
pub use key::{SymmetricKey, SymmetricKeySize};
pub use parallel::ParallelOptions;
