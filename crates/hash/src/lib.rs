//! `symx-hash` — digests, parallel tree hashing, and HMAC.
//!
//! BLAKE2b-512 and Keccak-256/512 are implemented over the `symx-core`
//! permutations, each with a sequential mode and a tree-parallel mode whose
//! output intentionally differs (distinct tree parameters are domain
//! separation, not a bug). SHA-256/512 are adapted from the `sha2` crate for
//! the generator layer. [`Hmac`] wraps any engine digest.

#![deny(unsafe_code)]

pub mod blake2b;
pub mod digest;
pub mod hmac;
pub mod keccak;
pub mod sha2;

pub use blake2b::Blake2b512;
pub use digest::{Digest, DigestEngine, DigestKind};
pub use hmac::Hmac;
pub use keccak::KeccakDigest;
pub use sha2::{Sha256Digest, Sha512Digest};
