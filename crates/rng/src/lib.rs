//! `symx-rng` — entropy providers and deterministic random-bit generators.
//!
//! Two entropy providers (the system source and a CPU-jitter collector),
//! two generator cores (hash-counter and block-cipher-counter), and the
//! buffered PRNG taps over them. The jitter provider is supplementary by
//! design: it should be combined with other sources, never used as the sole
//! origin of key material.

#![deny(unsafe_code)]

pub mod bcg;
pub mod drbg;
pub mod hcg;
pub mod jitter;
pub mod prng;
pub mod provider;

pub use bcg::BlockCounterGenerator;
pub use drbg::Drbg;
pub use hcg::HashCounterGenerator;
pub use jitter::JitterProvider;
pub use prng::{BlockCounterRng, CounterRng, HashCounterRng, PrngKind};
pub use provider::{Provider, ProviderEngine, ProviderKind, SystemProvider};
