//! Galois/counter authenticated cipher mode.
//!
//! An online state machine over one counter driver and one GHASH instance,
//! both created and destroyed with the session. Lifecycle:
//! `initialize → set_associated_data? → transform* → finalize/verify`, after
//! which a new `initialize` (or the auto-increment re-init) is required
//! before further transforms.
//!
//! The tag base `E_K(J0)` is produced by encrypting one zero block through
//! the counter driver right after priming it at `J0`, which leaves the
//! stream counter at `J0 + 1`.

use rayon::prelude::*;
use symx_core::rijndael::{BLOCK_SIZE, Rijndael};
use symx_core::{CryptoError, ParallelOptions, SymmetricKey, SymmetricKeySize, ct};
use zeroize::{Zeroize, Zeroizing};

use crate::{
    ctr::{self, Ctr},
    ghash::Ghash,
};

/// Smallest accepted authentication tag in bytes.
pub const MIN_TAG_SIZE: usize = 12;

/// Largest accepted tag (one cipher block).
pub const MAX_TAG_SIZE: usize = BLOCK_SIZE;

/// GCM authenticated cipher over Rijndael.
pub struct Gcm {
    aad_data: Zeroizing<Vec<u8>>,
    aad_loaded: bool,
    aad_preserve: bool,
    aad_size: usize,
    auto_increment: bool,
    checksum: [u8; BLOCK_SIZE],
    ctr: Option<Ctr>,
    ghash: Option<Ghash>,
    is_encryption: bool,
    is_finalized: bool,
    is_initialized: bool,
    key: Zeroizing<Vec<u8>>,
    msg_size: usize,
    msg_tag: [u8; BLOCK_SIZE],
    nonce: Zeroizing<Vec<u8>>,
    profile: ParallelOptions,
    tag_base: [u8; BLOCK_SIZE],
}

impl Default for Gcm {
    fn default() -> Self {
        Self::new()
    }
}

impl Gcm {
    /// A fresh, uninitialized session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            aad_data: Zeroizing::new(Vec::new()),
            aad_loaded: false,
            aad_preserve: false,
            aad_size: 0,
            auto_increment: false,
            checksum: [0u8; BLOCK_SIZE],
            ctr: None,
            ghash: None,
            is_encryption: false,
            is_finalized: false,
            is_initialized: false,
            key: Zeroizing::new(Vec::new()),
            msg_size: 0,
            msg_tag: [0u8; BLOCK_SIZE],
            nonce: Zeroizing::new(Vec::new()),
            profile: ParallelOptions::new(BLOCK_SIZE, true),
            tag_base: [0u8; BLOCK_SIZE],
        }
    }

    /// Legal key container shapes: 16/24/32-byte keys with a 12-byte nonce.
    #[must_use]
    pub fn legal_key_sizes() -> Vec<SymmetricKeySize> {
        Rijndael::LEGAL_KEY_SIZES
            .iter()
            .map(|&k| SymmetricKeySize::new(k, 12, 0))
            .collect()
    }

    /// Advance the nonce and re-initialize automatically at `finalize`.
    pub fn set_auto_increment(&mut self, enabled: bool) {
        self.auto_increment = enabled;
    }

    /// Retain the associated data across auto-increment re-initialization.
    pub fn set_preserve_ad(&mut self, enabled: bool) {
        self.aad_preserve = enabled;
    }

    /// Whether the session is keyed for encryption.
    #[must_use]
    pub fn is_encryption(&self) -> bool {
        self.is_encryption
    }

    /// Whether the session is initialized for transforms.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    /// The fork-join profile; degree overrides validate against the core
    /// count.
    pub fn parallel_profile(&mut self) -> &mut ParallelOptions {
        &mut self.profile
    }

    /// The tag of the last finalized session.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidState`] before `finalize`.
    pub fn tag(&self) -> Result<[u8; BLOCK_SIZE], CryptoError> {
        if !self.is_finalized {
            return Err(CryptoError::InvalidState(
                "the cipher mode has not been finalized",
            ));
        }
        Ok(self.msg_tag)
    }

    /// Key and prime a session.
    ///
    /// An empty key re-initializes an already-keyed session under a fresh
    /// nonce (the auto-increment path); the nonce must differ from the
    /// previous one.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidKeyMaterial`] for an illegal key size, a nonce
    /// outside 8..=16 bytes, a repeated nonce on re-init, or an empty key
    /// before the first keyed call.
    pub fn initialize(
        &mut self,
        encryption: bool,
        key_params: &SymmetricKey,
    ) -> Result<(), CryptoError> {
        let nonce = key_params.nonce();
        if nonce.len() < 8 || nonce.len() > BLOCK_SIZE {
            return Err(CryptoError::InvalidKeyMaterial(
                "gcm requires a nonce of 8 to 16 bytes",
            ));
        }

        if key_params.key().is_empty() {
            if self.ghash.is_none() {
                return Err(CryptoError::InvalidKeyMaterial(
                    "first initialization requires a key and nonce",
                ));
            }
            if nonce == self.nonce.as_slice() {
                return Err(CryptoError::InvalidKeyMaterial(
                    "the nonce can not repeat under the same key",
                ));
            }
        } else {
            if !SymmetricKeySize::contains_key_size(&Self::legal_key_sizes(), key_params.key().len())
            {
                return Err(CryptoError::InvalidKeyMaterial(
                    "key must be one of the legal sizes (16, 24, or 32 bytes)",
                ));
            }

            // Key the cipher and derive the hash subkey H = E_K(0).
            let cipher = Rijndael::new(key_params.key())?;
            let mut h = [0u8; BLOCK_SIZE];
            cipher.encrypt_block(&[0u8; BLOCK_SIZE], &mut h);
            self.ghash = Some(Ghash::new(&h));
            h.zeroize();

            self.key.zeroize();
            *self.key = key_params.key().to_vec();
        }

        *self.nonce = nonce.to_vec();
        let ghash = self.ghash.as_ref().expect("keyed above or on a prior call");

        // J0: 12-byte nonces append the one-block counter; other lengths run
        // through GHASH with the length encoding.
        let mut j0 = [0u8; BLOCK_SIZE];
        if nonce.len() == 12 {
            j0[..12].copy_from_slice(nonce);
            j0[15] = 1;
        } else {
            ghash.process_segment(nonce, &mut j0);
            ghash.finalize_checksum(&mut j0, 0, nonce.len());
        }

        let cipher = Rijndael::new(&self.key)?;
        let mut stream = Ctr::with_cipher(cipher, j0);
        let zeroes = [0u8; BLOCK_SIZE];
        let mut tag_base = [0u8; BLOCK_SIZE];
        stream.transform(&zeroes, &mut tag_base, BLOCK_SIZE)?;
        self.tag_base = tag_base;
        self.ctr = Some(stream);

        Ghash::reset_checksum(&mut self.checksum);
        if self.aad_preserve && self.aad_loaded {
            // Retained associated data is re-absorbed into the fresh session.
            let ghash = self.ghash.as_ref().expect("keyed above or on a prior call");
            ghash.process_segment(&self.aad_data, &mut self.checksum);
            self.aad_size = self.aad_data.len();
        } else {
            self.aad_data.zeroize();
            self.aad_data.clear();
            self.aad_loaded = false;
            self.aad_size = 0;
        }
        self.msg_size = 0;
        if self.is_finalized {
            // A finalized session's tag is stale once re-keyed; the
            // auto-increment path clears the flag first so the fresh tag
            // survives its internal re-initialization.
            self.msg_tag.zeroize();
            self.is_finalized = false;
        }
        self.is_encryption = encryption;
        self.is_initialized = true;
        Ok(())
    }

    /// Absorb the associated data; at most once per session, before any
    /// `transform`.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidState`] before initialization, after a prior
    /// call, or after plaintext has been processed.
    pub fn set_associated_data(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        if !self.is_initialized {
            return Err(CryptoError::InvalidState("the cipher has not been initialized"));
        }
        if self.aad_loaded {
            return Err(CryptoError::InvalidState(
                "the associated data has already been set",
            ));
        }
        if self.msg_size != 0 {
            return Err(CryptoError::InvalidState(
                "associated data must precede message data",
            ));
        }

        if self.aad_preserve {
            self.aad_data.zeroize();
            *self.aad_data = data.to_vec();
        }
        let ghash = self.ghash.as_ref().expect("initialized session is keyed");
        ghash.process_segment(data, &mut self.checksum);
        self.aad_size = data.len();
        self.aad_loaded = true;
        Ok(())
    }

    /// Encrypt or decrypt `length` bytes. Only the final call of a session
    /// may use a non-block-aligned length.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidState`] outside an initialized session;
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
                "the cipher mode has not been initialized",
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
        let parallel = self.profile.is_parallel()
            && length >= self.profile.parallel_block_size()
            && (length / BLOCK_SIZE / self.profile.parallel_max_degree()) > 0;

        if parallel {
            self.transform_parallel(input, &mut output[..length]);
        } else {
            self.transform_serial(input, &mut output[..length])?;
        }
        self.msg_size += length;
        Ok(())
    }

    /// Write the first `tag_len` bytes of the authentication tag.
    ///
    /// With auto-increment enabled the session is immediately re-keyed under
    /// `nonce + 1` (big-endian), re-absorbing the preserved associated data.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidState`] before initialization;
    /// [`CryptoError::InvalidParameter`] for a tag length outside 12..=16;
    /// [`CryptoError::ShortBuffer`] when the output window is too small.
    pub fn finalize(
        &mut self,
        output: &mut [u8],
        offset: usize,
        tag_len: usize,
    ) -> Result<(), CryptoError> {
        if !self.is_initialized {
            return Err(CryptoError::InvalidState(
                "the cipher mode has not been initialized",
            ));
        }
        if !(MIN_TAG_SIZE..=MAX_TAG_SIZE).contains(&tag_len) {
            return Err(CryptoError::InvalidParameter(
                "tag length must be between 12 and 16 bytes",
            ));
        }
        if output.len() < offset + tag_len {
            return Err(CryptoError::ShortBuffer {
                required: offset + tag_len,
                actual: output.len(),
            });
        }

        self.calculate_mac()?;
        output[offset..offset + tag_len].copy_from_slice(&self.msg_tag[..tag_len]);
        Ok(())
    }

    /// Compare the computed tag against `expected[offset..offset + tag_len]`
    /// in constant time. Decrypt-only; a mismatch is the `false` return, not
    /// an error. The caller is obligated to discard the plaintext on
    /// mismatch.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidState`] while encrypting or before the session
    /// produced a tag; [`CryptoError::InvalidParameter`] for a tag length
    /// outside 12..=16; [`CryptoError::ShortBuffer`] for a short window.
    pub fn verify(
        &mut self,
        expected: &[u8],
        offset: usize,
        tag_len: usize,
    ) -> Result<bool, CryptoError> {
        if self.is_encryption {
            return Err(CryptoError::InvalidState(
                "the cipher mode has not been initialized for decryption",
            ));
        }
        if !self.is_initialized && !self.is_finalized {
            return Err(CryptoError::InvalidState(
                "the cipher mode has not been initialized",
            ));
        }
        if !(MIN_TAG_SIZE..=MAX_TAG_SIZE).contains(&tag_len) {
            return Err(CryptoError::InvalidParameter(
                "tag length must be between 12 and 16 bytes",
            ));
        }
        if expected.len() < offset + tag_len {
            return Err(CryptoError::ShortBuffer {
                required: offset + tag_len,
                actual: expected.len(),
            });
        }

        if !self.is_finalized {
            self.calculate_mac()?;
        }
        Ok(ct::ct_eq(
            &self.msg_tag[..tag_len],
            &expected[offset..offset + tag_len],
        ))
    }

    fn calculate_mac(&mut self) -> Result<(), CryptoError> {
        let ghash = self.ghash.as_ref().expect("initialized session is keyed");
        ghash.finalize_checksum(&mut self.checksum, self.aad_size, self.msg_size);
        for (sum, base) in self.checksum.iter_mut().zip(self.tag_base.iter()) {
            *sum ^= base;
        }
        self.msg_tag = self.checksum;
        self.reset_session();
        self.is_finalized = false;

        if self.auto_increment {
            let mut next_nonce = self.nonce.to_vec();
            be_increment_nonce(&mut next_nonce);
            let re_key = SymmetricKey::with_nonce(Vec::new(), next_nonce);
            let encryption = self.is_encryption;
            // Re-initialization re-absorbs the preserved associated data.
            self.initialize(encryption, &re_key)?;
        }

        self.is_finalized = true;
        Ok(())
    }

    fn reset_session(&mut self) {
        if !self.aad_preserve {
            self.aad_data.zeroize();
            self.aad_data.clear();
            self.aad_loaded = false;
            self.aad_size = 0;
        }
        Ghash::reset_checksum(&mut self.checksum);
        self.tag_base.zeroize();
        self.msg_size = 0;
        self.is_initialized = false;
    }

    fn transform_serial(&mut self, input: &[u8], output: &mut [u8]) -> Result<(), CryptoError> {
        if self.is_encryption {
            let stream = self.ctr.as_mut().expect("initialized session has a stream");
            stream.transform(input, output, input.len())?;
            let ghash = self.ghash.as_ref().expect("initialized session is keyed");
            ghash.process_segment(output, &mut self.checksum);
        } else {
            let ghash = self.ghash.as_ref().expect("initialized session is keyed");
            ghash.process_segment(input, &mut self.checksum);
            let stream = self.ctr.as_mut().expect("initialized session has a stream");
            stream.transform(input, output, input.len())?;
        }
        Ok(())
    }

    /// One block-aligned chunk per worker; each worker runs the counter at
    /// its own offset and folds a chunk-local GHASH accumulator. The
    /// accumulators join by Horner evaluation with `H^chunk_blocks`, seeded
    /// with the pre-existing checksum.
    fn transform_parallel(&mut self, input: &[u8], output: &mut [u8]) {
        let length = input.len();
        let degree = self.profile.parallel_max_degree();
        let chunk = (length / BLOCK_SIZE / degree) * BLOCK_SIZE;
        let chunk_blocks = (chunk / BLOCK_SIZE) as u64;
        let body = chunk * degree;

        let encrypting = self.is_encryption;
        let stream = self.ctr.as_mut().expect("initialized session has a stream");
        let ghash = self.ghash.as_ref().expect("initialized session is keyed");
        let base = *stream.counter();
        let cipher = stream.cipher();

        let chunk_sums: Vec<[u8; BLOCK_SIZE]> = output[..body]
            .par_chunks_mut(chunk)
            .zip(input[..body].par_chunks(chunk))
            .enumerate()
            .map(|(i, (out_chunk, in_chunk))| {
                let mut counter = ctr::be_add(&base, i as u128 * u128::from(chunk_blocks));
                let mut sum = [0u8; BLOCK_SIZE];
                if encrypting {
                    ctr::xor_keystream(cipher, &mut counter, in_chunk, out_chunk);
                    ghash.update(out_chunk, &mut sum);
                } else {
                    ghash.update(in_chunk, &mut sum);
                    ctr::xor_keystream(cipher, &mut counter, in_chunk, out_chunk);
                }
                sum
            })
            .collect();

        let h_power = ghash.power(chunk_blocks);
        let mut folded = u128::from_be_bytes(self.checksum);
        for sum in &chunk_sums {
            folded = Ghash::multiply(folded, h_power) ^ u128::from_be_bytes(*sum);
        }
        self.checksum = folded.to_be_bytes();

        let stream = self.ctr.as_mut().expect("initialized session has a stream");
        stream.advance(degree as u128 * u128::from(chunk_blocks));

        // Serial tail, absorbed after the joined body to keep data order.
        if body < length {
            self.transform_serial_tail(&input[body..], body, output);
        }
    }

    fn transform_serial_tail(&mut self, tail_input: &[u8], body: usize, output: &mut [u8]) {
        if self.is_encryption {
            let stream = self.ctr.as_mut().expect("initialized session has a stream");
            stream
                .transform(tail_input, &mut output[body..], tail_input.len())
                .expect("tail windows hold the remaining bytes");
            let ghash = self.ghash.as_ref().expect("initialized session is keyed");
            ghash.process_segment(&output[body..], &mut self.checksum);
        } else {
            let ghash = self.ghash.as_ref().expect("initialized session is keyed");
            ghash.process_segment(tail_input, &mut self.checksum);
            let stream = self.ctr.as_mut().expect("initialized session has a stream");
            stream
                .transform(tail_input, &mut output[body..], tail_input.len())
                .expect("tail windows hold the remaining bytes");
        }
    }
}

impl Drop for Gcm {
    fn drop(&mut self) {
        self.checksum.zeroize();
        self.tag_base.zeroize();
        self.msg_tag.zeroize();
    }
}

/// Advance a variable-length big-endian nonce by one.
fn be_increment_nonce(nonce: &mut [u8]) {
    for byte in nonce.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_key() -> SymmetricKey {
        SymmetricKey::with_nonce(vec![0x11u8; 16], vec![0x22u8; 12])
    }

    #[test]
    fn transform_before_init_rejected() {
        let mut gcm = Gcm::new();
        let mut out = [0u8; 16];
        assert!(matches!(
            gcm.transform(&[0u8; 16], &mut out, 16),
            Err(CryptoError::InvalidState(_))
        ));
    }

    #[test]
    fn first_init_requires_key() {
        let mut gcm = Gcm::new();
        let empty = SymmetricKey::with_nonce(Vec::new(), vec![0u8; 12]);
        assert!(matches!(
            gcm.initialize(true, &empty),
            Err(CryptoError::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn nonce_repeat_on_reinit_rejected() {
        let mut gcm = Gcm::new();
        gcm.initialize(true, &session_key()).expect("legal material");

        let same_nonce = SymmetricKey::with_nonce(Vec::new(), vec![0x22u8; 12]);
        assert!(matches!(
            gcm.initialize(true, &same_nonce),
            Err(CryptoError::InvalidKeyMaterial(_))
        ));

        let fresh_nonce = SymmetricKey::with_nonce(Vec::new(), vec![0x23u8; 12]);
        gcm.initialize(true, &fresh_nonce).expect("fresh nonce accepted");
    }

    #[test]
    fn aad_after_message_rejected() {
        let mut gcm = Gcm::new();
        gcm.initialize(true, &session_key()).expect("legal material");
        let mut out = [0u8; 16];
        gcm.transform(&[0u8; 16], &mut out, 16).expect("initialized");
        assert!(matches!(
            gcm.set_associated_data(b"late"),
            Err(CryptoError::InvalidState(_))
        ));
    }

    #[test]
    fn aad_set_twice_rejected() {
        let mut gcm = Gcm::new();
        gcm.initialize(true, &session_key()).expect("legal material");
        gcm.set_associated_data(b"once").expect("first load");
        assert!(matches!(
            gcm.set_associated_data(b"twice"),
            Err(CryptoError::InvalidState(_))
        ));
    }

    #[test]
    fn verify_while_encrypting_rejected() {
        let mut gcm = Gcm::new();
        gcm.initialize(true, &session_key()).expect("legal material");
        assert!(matches!(
            gcm.verify(&[0u8; 16], 0, 16),
            Err(CryptoError::InvalidState(_))
        ));
    }

    #[test]
    fn tag_length_bounds() {
        let mut gcm = Gcm::new();
        gcm.initialize(true, &session_key()).expect("legal material");
        let mut tag = [0u8; 32];
        assert!(matches!(
            gcm.finalize(&mut tag, 0, 11),
            Err(CryptoError::InvalidParameter(_))
        ));
        assert!(matches!(
            gcm.finalize(&mut tag, 0, 17),
            Err(CryptoError::InvalidParameter(_))
        ));
        gcm.finalize(&mut tag, 0, 16).expect("legal tag length");
    }

    #[test]
    fn transform_after_finalize_rejected() {
        let mut gcm = Gcm::new();
        gcm.initialize(true, &session_key()).expect("legal material");
        let mut out = [0u8; 16];
        gcm.transform(&[0u8; 16], &mut out, 16).expect("initialized");
        let mut tag = [0u8; 16];
        gcm.finalize(&mut tag, 0, 16).expect("legal tag length");
        assert!(matches!(
            gcm.transform(&[0u8; 16], &mut out, 16),
            Err(CryptoError::InvalidState(_))
        ));
    }

    #[test]
    fn tag_accessor_requires_finalize() {
        let mut gcm = Gcm::new();
        gcm.initialize(true, &session_key()).expect("legal material");
        assert!(matches!(gcm.tag(), Err(CryptoError::InvalidState(_))));
        let mut tag = [0u8; 16];
        gcm.finalize(&mut tag, 0, 16).expect("legal tag length");
        assert_eq!(gcm.tag().expect("finalized"), tag);
    }
}
