//! Salsa20 stream cipher in counter mode.
//!
//! Round count is selectable (8..=30, even). The state constants are sigma
//! for 32-byte keys and tau for 16-byte keys; a caller-supplied 16-byte
//! `info` string overrides them for domain separation, and any other
//! nonzero length is rejected. The keystream counter is 64-bit
//! little-endian.
//!
//! Keystream batches use the widest SIMD lane count the CPU record reports
//! (eight blocks on 256-bit vectors, four on 128-bit) and fall back to the
//! scalar core for the tail; a final partial block truncates one extra
//! keystream block and advances the counter once.

use rayon::prelude::*;
use symx_core::salsa::{self, BLOCK_SIZE, STATE_WORDS};
use symx_core::{CryptoError, ParallelOptions, SymmetricKey, cpu};
use zeroize::Zeroize;

const SIGMA: &[u8; 16] = b"expand 32-byte k";
const TAU: &[u8; 16] = b"expand 16-byte k";

/// Legal round counts.
pub const MIN_ROUNDS: usize = 8;
/// Largest accepted round count.
pub const MAX_ROUNDS: usize = 30;

/// Salsa20/R stream cipher.
pub struct Salsa20 {
    counter: u64,
    info_code: [u8; 16],
    is_initialized: bool,
    profile: ParallelOptions,
    rounds: usize,
    wrk: [u32; STATE_WORDS],
}

impl Salsa20 {
    /// Construct with an explicit round count.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidParameter`] unless `rounds` is an even number in
    /// 8..=30.
    pub fn new(rounds: usize) -> Result<Self, CryptoError> {
        if rounds == 0 || rounds % 2 != 0 {
            return Err(CryptoError::InvalidParameter(
                "rounds must be a positive even number",
            ));
        }
        if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&rounds) {
            return Err(CryptoError::InvalidParameter(
                "rounds must be between 8 and 30",
            ));
        }

        Ok(Self {
            counter: 0,
            info_code: *SIGMA,
            is_initialized: false,
            profile: ParallelOptions::new(BLOCK_SIZE, true),
            rounds,
            wrk: [0u32; STATE_WORDS],
        })
    }

    /// Legal key container shapes: 16- or 32-byte keys with an 8-byte nonce.
    #[must_use]
    pub fn legal_key_sizes() -> Vec<symx_core::SymmetricKeySize> {
        vec![
            symx_core::SymmetricKeySize::new(16, 8, 0),
            symx_core::SymmetricKeySize::new(32, 8, 0),
        ]
    }

    /// The configured round count.
    #[must_use]
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Whether the cipher has been keyed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    /// The fork-join profile; degree overrides validate against the core
    /// count.
    pub fn parallel_profile(&mut self) -> &mut ParallelOptions {
        &mut self.profile
    }

    /// Key the cipher and rewind the counter.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidKeyMaterial`] unless the key is 16 or 32 bytes,
    /// the nonce exactly 8, and the info string empty or exactly 16 bytes.
    pub fn initialize(&mut self, key_params: &SymmetricKey) -> Result<(), CryptoError> {
        let key = key_params.key();
        let nonce = key_params.nonce();
        let info = key_params.info();

        if nonce.len() != 8 {
            return Err(CryptoError::InvalidKeyMaterial(
                "salsa20 requires exactly 8 bytes of nonce",
            ));
        }
        if key.len() != 16 && key.len() != 32 {
            return Err(CryptoError::InvalidKeyMaterial(
                "salsa20 key must be 16 or 32 bytes",
            ));
        }
        if !info.is_empty() {
            // Domain-separation override of the sigma/tau constants.
            if info.len() != 16 {
                return Err(CryptoError::InvalidKeyMaterial(
                    "salsa20 info override must be exactly 16 bytes",
                ));
            }
            self.info_code.copy_from_slice(info);
        } else if key.len() == 32 {
            self.info_code = *SIGMA;
        } else {
            self.info_code = *TAU;
        }

        self.expand(key, nonce);
        self.counter = 0;
        self.is_initialized = true;
        Ok(())
    }

    /// Rewind the keystream counter to zero.
    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// XOR `length` bytes of keystream into `input`, writing `output`.
    /// Encryption and decryption are the same transform.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidState`] before initialization;
    /// [`CryptoError::ShortBuffer`] when either slice is shorter than
    /// `length`.
    pub fn transform(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        length: usize,
    ) -> Result<(), CryptoError> {
        if !self.is_initialized {
            return Err(CryptoError::InvalidState(
                "the cipher has not been initialized",
            ));
        }
        let actual = input.len().min(output.len());
        if actual < length {
            return Err(CryptoError::ShortBuffer {
                required: length,
                actual,
            });
        }
        let input = &input[..length];
        let output = &mut output[..length];

        let degree = self.profile.parallel_max_degree();
        let parallel = self.profile.is_parallel()
            && length >= self.profile.parallel_block_size()
            && (length / BLOCK_SIZE / degree) > 0;

        if !parallel {
            let mut counter = self.counter;
            Self::generate_xor(&self.wrk, self.rounds, &mut counter, input, output);
            self.counter = counter;
            return Ok(());
        }

        let chunk = (length / BLOCK_SIZE / degree) * BLOCK_SIZE;
        let chunk_blocks = (chunk / BLOCK_SIZE) as u64;
        let body = chunk * degree;

        let wrk = self.wrk;
        let rounds = self.rounds;
        let base = self.counter;
        output[..body]
            .par_chunks_mut(chunk)
            .zip(input[..body].par_chunks(chunk))
            .enumerate()
            .for_each(|(i, (out_chunk, in_chunk))| {
                // Per-worker counter offset by whole chunks.
                let mut counter = base.wrapping_add(i as u64 * chunk_blocks);
                Self::generate_xor(&wrk, rounds, &mut counter, in_chunk, out_chunk);
            });

        // The last worker's final counter is the stream position.
        self.counter = base.wrapping_add(degree as u64 * chunk_blocks);

        if body < length {
            let mut counter = self.counter;
            Self::generate_xor(
                &self.wrk,
                self.rounds,
                &mut counter,
                &input[body..],
                &mut output[body..],
            );
            self.counter = counter;
        }
        Ok(())
    }

    /// Generate keystream at `counter` and XOR it into `input`.
    fn generate_xor(
        wrk: &[u32; STATE_WORDS],
        rounds: usize,
        counter: &mut u64,
        input: &[u8],
        output: &mut [u8],
    ) {
        let length = input.len();
        let mut offset = 0;
        let lanes = cpu::features().stream_lanes();

        if lanes >= 8 {
            let batch = 8 * BLOCK_SIZE;
            while length - offset >= batch {
                salsa::block_wide::<8>(wrk, *counter, rounds, &mut output[offset..offset + batch]);
                xor_in_place(&mut output[offset..offset + batch], &input[offset..offset + batch]);
                *counter = counter.wrapping_add(8);
                offset += batch;
            }
        }
        if lanes >= 4 {
            let batch = 4 * BLOCK_SIZE;
            while length - offset >= batch {
                salsa::block_wide::<4>(wrk, *counter, rounds, &mut output[offset..offset + batch]);
                xor_in_place(&mut output[offset..offset + batch], &input[offset..offset + batch]);
                *counter = counter.wrapping_add(4);
                offset += batch;
            }
        }

        let mut block = [0u8; BLOCK_SIZE];
        while length - offset >= BLOCK_SIZE {
            salsa::block(wrk, *counter, rounds, &mut block);
            *counter = counter.wrapping_add(1);
            for i in 0..BLOCK_SIZE {
                output[offset + i] = input[offset + i] ^ block[i];
            }
            offset += BLOCK_SIZE;
        }

        if offset < length {
            // One extra keystream block, truncated to the tail.
            salsa::block(wrk, *counter, rounds, &mut block);
            *counter = counter.wrapping_add(1);
            for i in offset..length {
                output[i] = input[i] ^ block[i - offset];
            }
        }
        block.zeroize();
    }

    /// Load the working state: constants at 0/5/8/13, key and nonce
    /// interleaved; 16-byte keys repeat in both halves.
    fn expand(&mut self, key: &[u8], nonce: &[u8]) {
        let word = |bytes: &[u8], i: usize| {
            u32::from_le_bytes([bytes[4 * i], bytes[4 * i + 1], bytes[4 * i + 2], bytes[4 * i + 3]])
        };

        self.wrk[0] = word(&self.info_code, 0);
        self.wrk[1] = word(key, 0);
        self.wrk[2] = word(key, 1);
        self.wrk[3] = word(key, 2);
        self.wrk[4] = word(key, 3);
        self.wrk[5] = word(&self.info_code, 1);
        self.wrk[6] = word(nonce, 0);
        self.wrk[7] = word(nonce, 1);
        self.wrk[8] = word(&self.info_code, 2);
        if key.len() == 32 {
            self.wrk[9] = word(key, 4);
            self.wrk[10] = word(key, 5);
            self.wrk[11] = word(key, 6);
            self.wrk[12] = word(key, 7);
        } else {
            self.wrk[9] = word(key, 0);
            self.wrk[10] = word(key, 1);
            self.wrk[11] = word(key, 2);
            self.wrk[12] = word(key, 3);
        }
        self.wrk[13] = word(&self.info_code, 3);
    }
}

impl Drop for Salsa20 {
    fn drop(&mut self) {
        self.wrk.zeroize();
        self.counter = 0;
    }
}

#[inline]
fn xor_in_place(output: &mut [u8], input: &[u8]) {
    for (o, i) in output.iter_mut().zip(input.iter()) {
        *o ^= i;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed_cipher(key_len: usize, rounds: usize) -> Salsa20 {
        let mut cipher = Salsa20::new(rounds).expect("legal rounds");
        cipher
            .initialize(&SymmetricKey::with_nonce(vec![0u8; key_len], vec![0u8; 8]))
            .expect("legal material");
        cipher
    }

    #[test]
    fn zero_key_keystream_kat() {
        let mut cipher = keyed_cipher(32, 20);
        let zeroes = [0u8; BLOCK_SIZE];
        let mut out = [0u8; BLOCK_SIZE];
        cipher.transform(&zeroes, &mut out, BLOCK_SIZE).expect("initialized");
        assert_eq!(out[..8], [0x9A, 0x97, 0xF6, 0x5B, 0x9B, 0x4C, 0x72, 0x1B]);
    }

    #[test]
    fn transform_is_its_own_inverse() {
        let plaintext: Vec<u8> = (0..10_000u32).map(|i| (i * 7) as u8).collect();

        let mut ct = vec![0u8; plaintext.len()];
        keyed_cipher(32, 20)
            .transform(&plaintext, &mut ct, plaintext.len())
            .expect("initialized");

        let mut pt = vec![0u8; plaintext.len()];
        keyed_cipher(32, 20)
            .transform(&ct, &mut pt, ct.len())
            .expect("initialized");
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn sixteen_byte_key_uses_tau_path() {
        let data = [0u8; 64];
        let mut short_key = [0u8; 64];
        let mut long_key = [0u8; 64];
        keyed_cipher(16, 20).transform(&data, &mut short_key, 64).expect("initialized");
        keyed_cipher(32, 20).transform(&data, &mut long_key, 64).expect("initialized");
        assert_ne!(short_key, long_key);
    }

    #[test]
    fn info_override_separates_domains() {
        let data = [0u8; 64];
        let mut plain = [0u8; 64];
        let mut custom = [0u8; 64];
        keyed_cipher(32, 20).transform(&data, &mut plain, 64).expect("initialized");

        let mut cipher = Salsa20::new(20).expect("legal rounds");
        cipher
            .initialize(&SymmetricKey::with_info(
                vec![0u8; 32],
                vec![0u8; 8],
                b"expand 99-byte k".to_vec(),
            ))
            .expect("16-byte info accepted");
        cipher.transform(&data, &mut custom, 64).expect("initialized");
        assert_ne!(plain, custom);
    }

    #[test]
    fn wrong_info_length_rejected() {
        let mut cipher = Salsa20::new(20).expect("legal rounds");
        let err = cipher.initialize(&SymmetricKey::with_info(
            vec![0u8; 32],
            vec![0u8; 8],
            b"short".to_vec(),
        ));
        assert!(matches!(err, Err(CryptoError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn round_count_validation() {
        assert!(Salsa20::new(0).is_err());
        assert!(Salsa20::new(7).is_err());
        assert!(Salsa20::new(32).is_err());
        for rounds in (MIN_ROUNDS..=MAX_ROUNDS).step_by(2) {
            assert!(Salsa20::new(rounds).is_ok(), "rounds {rounds} must be legal");
        }
    }

    #[test]
    fn split_calls_match_one_shot() {
        let data: Vec<u8> = (0..777u32).map(|i| (i * 11) as u8).collect();

        let mut one = vec![0u8; data.len()];
        keyed_cipher(32, 12)
            .transform(&data, &mut one, data.len())
            .expect("initialized");

        let mut split = vec![0u8; data.len()];
        let mut cipher = keyed_cipher(32, 12);
        cipher.transform(&data[..512], &mut split[..512], 512).expect("initialized");
        cipher
            .transform(&data[512..], &mut split[512..], data.len() - 512)
            .expect("initialized");
        assert_eq!(one, split);
    }

    #[test]
    fn parallel_matches_serial() {
        let data: Vec<u8> = (0..384 * 1024u32).map(|i| (i ^ (i >> 7)) as u8).collect();

        let mut serial = vec![0u8; data.len()];
        let mut cipher = keyed_cipher(32, 20);
        cipher.parallel_profile().set_parallel(false);
        cipher.transform(&data, &mut serial, data.len()).expect("initialized");

        for degree in [2usize, 4, 8] {
            let mut cipher = keyed_cipher(32, 20);
            if cipher.parallel_profile().set_max_degree(degree).is_err() {
                continue; // machine does not expose enough cores
            }
            let mut parallel = vec![0u8; data.len()];
            cipher.transform(&data, &mut parallel, data.len()).expect("initialized");
            assert_eq!(serial, parallel, "degree {degree} output must match serial");
        }
    }

    #[test]
    fn transform_before_init_rejected() {
        let mut cipher = Salsa20::new(20).expect("legal rounds");
        let mut out = [0u8; 16];
        assert!(matches!(
            cipher.transform(&[0u8; 16], &mut out, 16),
            Err(CryptoError::InvalidState(_))
        ));
    }
}
