//! Engine-wide error type.

use core::fmt;

/// Errors returned by engine operations.
///
/// Authentication failure is deliberately absent: a failed tag check is the
/// `false` return of `Gcm::verify`, never an error, so that callers cannot
/// build a decryption oracle out of exception timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key, nonce, or info material has an illegal size, or a nonce was
    /// repeated on re-initialization under the same key.
    InvalidKeyMaterial(&'static str),
    /// An operation was issued in the wrong lifecycle phase.
    InvalidState(&'static str),
    /// A tuning parameter (parallel degree, tag length, round count, buffer
    /// size) is outside its legal range.
    InvalidParameter(&'static str),
    /// The entropy provider is not functional on this system.
    ProviderUnavailable(&'static str),
    /// An input or output slice is smaller than the operation requires.
    ShortBuffer {
        /// Bytes the operation needed.
        required: usize,
        /// Bytes the caller supplied.
        actual: usize,
    },
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyMaterial(msg) => write!(f, "invalid key material: {msg}"),
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::ProviderUnavailable(msg) => write!(f, "provider unavailable: {msg}"),
            Self::ShortBuffer { required, actual } => {
                write!(f, "short buffer: {required} bytes required, {actual} supplied")
            }
        }
    }
}

impl std::error::Error for CryptoError {}
