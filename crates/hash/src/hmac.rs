//! HMAC (RFC 2104) over any engine digest.

use symx_core::CryptoError;
use zeroize::Zeroizing;

use crate::digest::{Digest, DigestEngine, DigestKind};

const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5C;

/// Keyed MAC over an engine digest. After `finalize` the instance is
/// re-primed for the next message under the same key.
pub struct Hmac {
    engine: DigestEngine,
    ipad_key: Zeroizing<Vec<u8>>,
    opad_key: Zeroizing<Vec<u8>>,
}

impl Hmac {
    /// Key an HMAC instance. Keys longer than the digest block are hashed
    /// down first.
    ///
    /// # Errors
    ///
    /// Propagates digest errors from key preprocessing.
    pub fn new(kind: DigestKind, key: &[u8]) -> Result<Self, CryptoError> {
        let mut engine = DigestEngine::new(kind);
        let block_size = engine.block_size();

        let mut padded = Zeroizing::new(vec![0u8; block_size]);
        if key.len() > block_size {
            let written = engine.compute(key, &mut padded)?;
            debug_assert!(written <= block_size);
        } else {
            padded[..key.len()].copy_from_slice(key);
        }

        let mut ipad_key = Zeroizing::new(vec![0u8; block_size]);
        let mut opad_key = Zeroizing::new(vec![0u8; block_size]);
        for i in 0..block_size {
            ipad_key[i] = padded[i] ^ IPAD;
            opad_key[i] = padded[i] ^ OPAD;
        }

        engine.update(&ipad_key);
        Ok(Self {
            engine,
            ipad_key,
            opad_key,
        })
    }

    /// MAC output size in bytes.
    #[must_use]
    pub fn mac_size(&self) -> usize {
        self.engine.digest_size()
    }

    /// Absorb message bytes.
    pub fn update(&mut self, input: &[u8]) {
        self.engine.update(input);
    }

    /// Write the MAC into `output`, re-prime for the next message, and
    /// return the number of bytes written.
    ///
    /// # Errors
    ///
    /// [`CryptoError::ShortBuffer`] when `output` is smaller than the MAC.
    pub fn finalize(&mut self, output: &mut [u8]) -> Result<usize, CryptoError> {
        let digest_size = self.engine.digest_size();
        if output.len() < digest_size {
            return Err(CryptoError::ShortBuffer {
                required: digest_size,
                actual: output.len(),
            });
        }

        let mut inner = Zeroizing::new(vec![0u8; digest_size]);
        self.engine.finalize(&mut inner)?;

        self.engine.update(&self.opad_key);
        self.engine.update(&inner);
        let written = self.engine.finalize(output)?;

        self.engine.update(&self.ipad_key);
        Ok(written)
    }

    /// One-shot MAC of `input` under `key`.
    ///
    /// # Errors
    ///
    /// [`CryptoError::ShortBuffer`] when `output` is smaller than the MAC.
    pub fn compute(
        kind: DigestKind,
        key: &[u8],
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CryptoError> {
        let mut mac = Self::new(kind, key)?;
        mac.update(input);
        mac.finalize(output)
    }
}
