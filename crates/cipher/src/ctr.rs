//! Big-endian counter-mode driver over the block cipher.
//!
//! `out = in XOR E_K(counter); counter += 1` per block, with the counter
//! carried big-endian across the full 128 bits. Parallel processing
//! partitions the range into one block-aligned chunk per worker; worker `i`
//! runs at `counter + i * chunk_blocks` and the main counter advances by the
//! whole aligned block count after the join.

use rayon::prelude::*;
use symx_core::rijndael::{BLOCK_SIZE, Rijndael};
use symx_core::{CryptoError, ParallelOptions};
use zeroize::Zeroize;

/// Advance a big-endian counter block by one, wrapping across all 128 bits.
pub(crate) fn be_increment(counter: &mut [u8; BLOCK_SIZE]) {
    for byte in counter.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

/// `counter + blocks` over the full 128-bit big-endian value.
pub(crate) fn be_add(counter: &[u8; BLOCK_SIZE], blocks: u128) -> [u8; BLOCK_SIZE] {
    u128::from_be_bytes(*counter)
        .wrapping_add(blocks)
        .to_be_bytes()
}

/// XOR the keystream at `counter` into `input`, writing `output`; a partial
/// trailing block truncates the keystream but still advances the counter.
pub(crate) fn xor_keystream(
    cipher: &Rijndael,
    counter: &mut [u8; BLOCK_SIZE],
    input: &[u8],
    output: &mut [u8],
) {
    let mut keystream = [0u8; BLOCK_SIZE];
    let mut offset = 0;

    while input.len() - offset >= BLOCK_SIZE {
        cipher.encrypt_block(counter, &mut keystream);
        be_increment(counter);
        for i in 0..BLOCK_SIZE {
            output[offset + i] = input[offset + i] ^ keystream[i];
        }
        offset += BLOCK_SIZE;
    }

    if offset < input.len() {
        cipher.encrypt_block(counter, &mut keystream);
        be_increment(counter);
        for i in offset..input.len() {
            output[i] = input[i] ^ keystream[i - offset];
        }
    }
    keystream.zeroize();
}

/// Counter-mode cipher; encryption and decryption are the same transform.
pub struct Ctr {
    cipher: Rijndael,
    counter: [u8; BLOCK_SIZE],
    profile: ParallelOptions,
}

impl Ctr {
    /// Key the driver and prime the counter.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidKeyMaterial`] for an illegal key size or a
    /// nonce that is not exactly one block.
    pub fn new(key: &[u8], nonce: &[u8]) -> Result<Self, CryptoError> {
        let counter: [u8; BLOCK_SIZE] = nonce.try_into().map_err(|_| {
            CryptoError::InvalidKeyMaterial("counter nonce must be exactly 16 bytes")
        })?;
        Ok(Self::with_cipher(Rijndael::new(key)?, counter))
    }

    /// Wrap an already-keyed cipher; used by GCM to share one key schedule
    /// between the hash-subkey derivation and the counter stream.
    pub(crate) fn with_cipher(cipher: Rijndael, counter: [u8; BLOCK_SIZE]) -> Self {
        Self {
            cipher,
            counter,
            profile: ParallelOptions::new(BLOCK_SIZE, true),
        }
    }

    /// The fork-join profile; degree overrides validate against the core
    /// count.
    pub fn parallel_profile(&mut self) -> &mut ParallelOptions {
        &mut self.profile
    }

    pub(crate) fn cipher(&self) -> &Rijndael {
        &self.cipher
    }

    pub(crate) fn counter(&self) -> &[u8; BLOCK_SIZE] {
        &self.counter
    }

    pub(crate) fn advance(&mut self, blocks: u128) {
        self.counter = be_add(&self.counter, blocks);
    }

    /// Transform `length` bytes. Only the final call of a session may use a
    /// non-block-aligned length.
    ///
    /// # Errors
    ///
    /// [`CryptoError::ShortBuffer`] when either slice is shorter than
    /// `length`.
    pub fn transform(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        length: usize,
    ) -> Result<(), CryptoError> {
        let actual = input.len().min(output.len());
        if actual < length {
            return Err(CryptoError::ShortBuffer {
                required: length,
                actual,
            });
        }
        let input = &input[..length];
        let output = &mut output[..length];

        if !self.profile.is_parallel() || length < self.profile.parallel_block_size() {
            let mut counter = self.counter;
            xor_keystream(&self.cipher, &mut counter, input, output);
            self.counter = counter;
            return Ok(());
        }

        let degree = self.profile.parallel_max_degree();
        let chunk = (length / BLOCK_SIZE / degree) * BLOCK_SIZE;
        let chunk_blocks = (chunk / BLOCK_SIZE) as u128;
        let body = chunk * degree;

        let base = self.counter;
        let cipher = &self.cipher;
        output[..body]
            .par_chunks_mut(chunk)
            .zip(input[..body].par_chunks(chunk))
            .enumerate()
            .for_each(|(i, (out_chunk, in_chunk))| {
                let mut counter = be_add(&base, i as u128 * chunk_blocks);
                xor_keystream(cipher, &mut counter, in_chunk, out_chunk);
            });
        self.advance(degree as u128 * chunk_blocks);

        if body < length {
            let mut counter = self.counter;
            xor_keystream(&self.cipher, &mut counter, &input[body..], &mut output[body..]);
            self.counter = counter;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_increment_carries() {
        let mut counter = [0xFFu8; BLOCK_SIZE];
        counter[0] = 0x00;
        be_increment(&mut counter);
        assert_eq!(counter[0], 0x01);
        assert!(counter[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn counter_add_matches_repeated_increment() {
        let mut stepped = [0u8; BLOCK_SIZE];
        stepped[15] = 0xF0;
        let jumped = be_add(&stepped, 300);
        for _ in 0..300 {
            be_increment(&mut stepped);
        }
        assert_eq!(stepped, jumped);
    }

    #[test]
    fn transform_roundtrips() {
        let key = [0x42u8; 16];
        let nonce = [7u8; 16];
        let plaintext: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();

        let mut ct = vec![0u8; plaintext.len()];
        let mut pt = vec![0u8; plaintext.len()];
        Ctr::new(&key, &nonce)
            .expect("legal key and nonce")
            .transform(&plaintext, &mut ct, plaintext.len())
            .expect("buffers fit");
        Ctr::new(&key, &nonce)
            .expect("legal key and nonce")
            .transform(&ct, &mut pt, ct.len())
            .expect("buffers fit");
        assert_eq!(pt, plaintext);
        assert_ne!(ct, plaintext);
    }

    #[test]
    fn split_calls_match_one_shot() {
        let key = [9u8; 32];
        let nonce = [1u8; 16];
        let data: Vec<u8> = (0..4096u32).map(|i| (i * 3) as u8).collect();

        let mut one = vec![0u8; data.len()];
        Ctr::new(&key, &nonce)
            .expect("legal key and nonce")
            .transform(&data, &mut one, data.len())
            .expect("buffers fit");

        let mut split = vec![0u8; data.len()];
        let mut ctr = Ctr::new(&key, &nonce).expect("legal key and nonce");
        ctr.transform(&data[..2048], &mut split[..2048], 2048)
            .expect("buffers fit");
        ctr.transform(&data[2048..], &mut split[2048..], 2048)
            .expect("buffers fit");
        assert_eq!(one, split);
    }

    #[test]
    fn parallel_matches_serial() {
        let key = [0xA1u8; 16];
        let nonce = [3u8; 16];
        let data: Vec<u8> = (0..512 * 1024u32).map(|i| (i ^ (i >> 8)) as u8).collect();

        let mut serial = vec![0u8; data.len()];
        let mut ctr = Ctr::new(&key, &nonce).expect("legal key and nonce");
        ctr.profile.set_parallel(false);
        ctr.transform(&data, &mut serial, data.len()).expect("buffers fit");

        for degree in [2usize, 4, 8] {
            let mut ctr = Ctr::new(&key, &nonce).expect("legal key and nonce");
            if ctr.profile.set_max_degree(degree).is_err() {
                continue; // machine does not expose enough cores
            }
            let mut parallel = vec![0u8; data.len()];
            ctr.transform(&data, &mut parallel, data.len()).expect("buffers fit");
            assert_eq!(serial, parallel, "degree {degree} output must match serial");
        }
    }

    #[test]
    fn counter_wrap_is_continuous() {
        let key = [5u8; 16];
        let mut near_wrap = [0xFFu8; 16];
        near_wrap[15] = 0xFE;

        let data = [0u8; 64];
        let mut out = vec![0u8; 64];
        let mut ctr = Ctr::new(&key, &near_wrap).expect("legal key and nonce");
        ctr.transform(&data, &mut out, 64).expect("buffers fit");
        assert_eq!(u128::from_be_bytes(*ctr.counter()), 2);
    }

    #[test]
    fn non_aligned_tail_truncates_keystream() {
        let key = [8u8; 16];
        let nonce = [0u8; 16];
        let data = [0xEEu8; 70];

        let mut full = vec![0u8; 80];
        Ctr::new(&key, &nonce)
            .expect("legal key and nonce")
            .transform(&[0xEEu8; 80], &mut full, 80)
            .expect("buffers fit");

        let mut short = vec![0u8; 70];
        Ctr::new(&key, &nonce)
            .expect("legal key and nonce")
            .transform(&data, &mut short, 70)
            .expect("buffers fit");
        assert_eq!(&short[..], &full[..70]);
    }
}
