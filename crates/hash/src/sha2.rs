//! SHA-2 adapters over the `sha2` crate.
//!
//! SHA-256/512 are not reimplemented; these wrappers give them the engine
//! digest interface so the generator layer and HMAC can select them.

use sha2::digest::Digest as _;
use symx_core::CryptoError;

use crate::digest::Digest;

/// SHA-256 engine adapter.
pub struct Sha256Digest {
    inner: sha2::Sha256,
}

/// SHA-512 engine adapter.
pub struct Sha512Digest {
    inner: sha2::Sha512,
}

macro_rules! impl_sha_adapter {
    ($name:ident, $block:expr, $digest:expr, $label:literal) => {
        impl $name {
            /// Fresh digest instance.
            #[must_use]
            pub fn new() -> Self {
                Self {
                    inner: Default::default(),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Digest for $name {
            fn block_size(&self) -> usize {
                $block
            }

            fn digest_size(&self) -> usize {
                $digest
            }

            fn name(&self) -> String {
                $label.to_string()
            }

            fn update(&mut self, input: &[u8]) {
                self.inner.update(input);
            }

            fn finalize(&mut self, output: &mut [u8]) -> Result<usize, CryptoError> {
                if output.len() < $digest {
                    return Err(CryptoError::ShortBuffer {
                        required: $digest,
                        actual: output.len(),
                    });
                }
                let digest = self.inner.finalize_reset();
                output[..$digest].copy_from_slice(&digest);
                Ok($digest)
            }

            fn reset(&mut self) {
                self.inner = Default::default();
            }
        }
    };
}

impl_sha_adapter!(Sha256Digest, 64, 32, "SHA256");
impl_sha_adapter!(Sha512Digest, 128, 64, "SHA512");

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn sha256_abc() {
        let mut digest = Sha256Digest::new();
        let mut out = [0u8; 32];
        digest.compute(b"abc", &mut out).expect("output fits");
        assert_eq!(
            hex(&out),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha512_abc() {
        let mut digest = Sha512Digest::new();
        let mut out = [0u8; 64];
        digest.compute(b"abc", &mut out).expect("output fits");
        assert_eq!(
            hex(&out),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn finalize_resets() {
        let mut digest = Sha256Digest::new();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        digest.compute(b"data", &mut a).expect("output fits");
        digest.compute(b"data", &mut b).expect("output fits");
        assert_eq!(a, b);
    }
}
