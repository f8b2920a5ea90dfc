//! Symmetric key container.
//!
//! [`SymmetricKey`] carries the `(key, nonce, info)` tuple used to
//! initialize ciphers, MACs, and generators. All members are zeroized on
//! drop. The byte serialization is three 16-bit little-endian length
//! prefixes followed by the raw ranges.

use core::fmt;

use zeroize::Zeroizing;

use crate::{ct, error::CryptoError};

/// Byte sizes of the key, nonce, and info members of a key container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymmetricKeySize {
    key_size: usize,
    nonce_size: usize,
    info_size: usize,
}

impl SymmetricKeySize {
    /// Describe a key container shape.
    #[must_use]
    pub const fn new(key_size: usize, nonce_size: usize, info_size: usize) -> Self {
        Self {
            key_size,
            nonce_size,
            info_size,
        }
    }

    /// Key length in bytes.
    #[must_use]
    pub const fn key_size(&self) -> usize {
        self.key_size
    }

    /// Nonce length in bytes.
    #[must_use]
    pub const fn nonce_size(&self) -> usize {
        self.nonce_size
    }

    /// Info length in bytes.
    #[must_use]
    pub const fn info_size(&self) -> usize {
        self.info_size
    }

    /// True when `sizes` lists an entry with key length `key_len`.
    #[must_use]
    pub fn contains_key_size(sizes: &[SymmetricKeySize], key_len: usize) -> bool {
        sizes.iter().any(|s| s.key_size == key_len)
    }
}

/// Keying material for symmetric primitives: `(key, nonce, info)`.
pub struct SymmetricKey {
    key: Zeroizing<Vec<u8>>,
    nonce: Zeroizing<Vec<u8>>,
    info: Zeroizing<Vec<u8>>,
}

impl SymmetricKey {
    /// Container holding only a key.
    #[must_use]
    pub fn new(key: Vec<u8>) -> Self {
        Self::with_info(key, Vec::new(), Vec::new())
    }

    /// Container holding a key and a nonce.
    #[must_use]
    pub fn with_nonce(key: Vec<u8>, nonce: Vec<u8>) -> Self {
        Self::with_info(key, nonce, Vec::new())
    }

    /// Container holding a key, a nonce, and a personalization string.
    #[must_use]
    pub fn with_info(key: Vec<u8>, nonce: Vec<u8>, info: Vec<u8>) -> Self {
        Self {
            key: Zeroizing::new(key),
            nonce: Zeroizing::new(nonce),
            info: Zeroizing::new(info),
        }
    }

    /// The primary key.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The nonce or counter array.
    #[must_use]
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// The personalization string or additional keying material.
    #[must_use]
    pub fn info(&self) -> &[u8] {
        &self.info
    }

    /// Byte sizes of the three members.
    #[must_use]
    pub fn sizes(&self) -> SymmetricKeySize {
        SymmetricKeySize::new(self.key.len(), self.nonce.len(), self.info.len())
    }

    /// Constant-time comparison of all three members.
    #[must_use]
    pub fn ct_eq(&self, other: &SymmetricKey) -> bool {
        // Evaluate every member so the comparison cost does not reveal which
        // one differed.
        let k = ct::ct_eq(&self.key, &other.key);
        let n = ct::ct_eq(&self.nonce, &other.nonce);
        let i = ct::ct_eq(&self.info, &other.info);
        k && n && i
    }

    /// Serialize to `len16(key) || len16(nonce) || len16(info) || bytes`.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidParameter`] when any member exceeds the 16-bit
    /// length prefix.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        for member in [&self.key, &self.nonce, &self.info] {
            if member.len() > usize::from(u16::MAX) {
                return Err(CryptoError::InvalidParameter(
                    "key container member exceeds 16-bit length prefix",
                ));
            }
        }

        let mut out =
            Vec::with_capacity(6 + self.key.len() + self.nonce.len() + self.info.len());
        for member in [&self.key, &self.nonce, &self.info] {
            out.extend_from_slice(&(member.len() as u16).to_le_bytes());
        }
        out.extend_from_slice(&self.key);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.info);
        Ok(out)
    }

    /// Deserialize a container produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// [`CryptoError::ShortBuffer`] when the stream is truncated.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < 6 {
            return Err(CryptoError::ShortBuffer {
                required: 6,
                actual: bytes.len(),
            });
        }

        let key_len = usize::from(u16::from_le_bytes([bytes[0], bytes[1]]));
        let nonce_len = usize::from(u16::from_le_bytes([bytes[2], bytes[3]]));
        let info_len = usize::from(u16::from_le_bytes([bytes[4], bytes[5]]));

        let required = 6 + key_len + nonce_len + info_len;
        if bytes.len() < required {
            return Err(CryptoError::ShortBuffer {
                required,
                actual: bytes.len(),
            });
        }

        let key_end = 6 + key_len;
        let nonce_end = key_end + nonce_len;
        Ok(Self::with_info(
            bytes[6..key_end].to_vec(),
            bytes[key_end..nonce_end].to_vec(),
            bytes[nonce_end..nonce_end + info_len].to_vec(),
        ))
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("key_size", &self.key.len())
            .field("nonce_size", &self.nonce.len())
            .field("info_size", &self.info.len())
            .finish_non_exhaustive()
    }
}
