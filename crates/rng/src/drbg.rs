//! Deterministic random-bit generator interface.

use symx_core::CryptoError;

/// A seed-and-generate deterministic generator core.
pub trait Drbg {
    /// Generator name.
    fn name(&self) -> String;

    /// Smallest acceptable seed: counter length plus the backing
    /// primitive's block material.
    fn min_seed_size(&self) -> usize;

    /// Key the generator from `seed`.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidKeyMaterial`] when the seed is below the
    /// minimum size or otherwise malformed.
    fn initialize(&mut self, seed: &[u8]) -> Result<(), CryptoError>;

    /// Fill `output` with generated bytes and return the count written.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidState`] before initialization.
    fn generate(&mut self, output: &mut [u8]) -> Result<usize, CryptoError>;
}

/// Advance a little-endian counter by one.
pub(crate) fn le_increment(counter: &mut [u8]) {
    for byte in counter.iter_mut() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn le_increment_carries() {
        let mut counter = [0xFFu8, 0xFF, 0x00, 0x00];
        le_increment(&mut counter);
        assert_eq!(counter, [0x00, 0x00, 0x01, 0x00]);
    }
}
