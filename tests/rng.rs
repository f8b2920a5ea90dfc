//! Generator and provider tests through the facade.
//!
//! Covers:
//! - deterministic reproduction from fixed seeds (HCR and BCR)
//! - per-digest minimum seed sizes
//! - provider-seeded taps diverging across instances
//! - the jitter provider when the timer qualifies
//! - rand_core interoperability

use rand_core::RngCore as _;
use symx::{
    BlockCounterRng, DigestKind, Drbg, HashCounterGenerator, HashCounterRng, JitterProvider,
    Provider, ProviderKind,
};

fn fixed_seed(len: usize) -> Vec<u8> {
    (0..len as u32).map(|i| (i.wrapping_mul(2654435761)) as u8).collect()
}

#[test]
fn hcr_reproduces_from_fixed_seed() {
    let seed = fixed_seed(72);
    let mut a = HashCounterRng::with_seed(DigestKind::Blake2b512, seed.clone(), 128)
        .expect("legal seed");
    let mut b =
        HashCounterRng::with_seed(DigestKind::Blake2b512, seed, 128).expect("legal seed");

    let mut out_a = [0u8; 500];
    let mut out_b = [0u8; 500];
    a.get_bytes(&mut out_a).expect("seeded");
    b.get_bytes(&mut out_b).expect("seeded");
    assert_eq!(out_a.to_vec(), out_b.to_vec());
}

#[test]
fn bcr_reproduces_from_fixed_seed() {
    let seed = fixed_seed(48);
    let mut a = BlockCounterRng::with_seed(seed.clone(), 64).expect("legal seed");
    let mut b = BlockCounterRng::with_seed(seed, 64).expect("legal seed");
    assert_eq!(
        a.next_u64().expect("seeded"),
        b.next_u64().expect("seeded")
    );
}

#[test]
fn minimum_seed_sizes_match_the_table() {
    let table = [
        (DigestKind::Blake2b512, 72usize),
        (DigestKind::Keccak256, 144),
        (DigestKind::Keccak512, 80),
        (DigestKind::Sha256, 72),
        (DigestKind::Sha512, 136),
    ];
    for (kind, expected) in table {
        assert_eq!(
            HashCounterGenerator::new(kind).min_seed_size(),
            expected,
            "{kind:?} minimum seed"
        );
    }
}

#[test]
fn provider_seeded_taps_diverge() {
    let mut a = HashCounterRng::new(DigestKind::Sha512, ProviderKind::Csp, 128)
        .expect("system provider available");
    let mut b = HashCounterRng::new(DigestKind::Sha512, ProviderKind::Csp, 128)
        .expect("system provider available");

    let mut out_a = [0u8; 64];
    let mut out_b = [0u8; 64];
    a.get_bytes(&mut out_a).expect("seeded");
    b.get_bytes(&mut out_b).expect("seeded");
    assert_ne!(out_a, out_b, "independent system seeds colliding is effectively impossible");
}

#[test]
fn jitter_provider_when_available() {
    let mut provider = JitterProvider::new();
    if !provider.is_available() {
        return; // no usable high-resolution timer on this machine
    }

    let mut words = [0u8; 24];
    provider.get_bytes(&mut words).expect("available provider");
    assert_ne!(words[..8], words[8..16], "consecutive jitter words must differ");
}

#[test]
fn rand_core_fill_is_usable_by_generic_consumers() {
    fn sample<R: rand_core::CryptoRng>(rng: &mut R) -> [u8; 32] {
        let mut coins = [0u8; 32];
        rng.fill_bytes(&mut coins);
        coins
    }

    let mut rng = HashCounterRng::with_seed(DigestKind::Blake2b512, fixed_seed(72), 64)
        .expect("legal seed");
    let first = sample(&mut rng);
    let second = sample(&mut rng);
    assert_ne!(first, second, "the stream must advance between draws");
}
