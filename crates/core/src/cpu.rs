//! One-shot CPU feature detection.
//!
//! Detection runs once and is read through an immutable record; SIMD
//! dispatch never re-detects per call.

use std::sync::OnceLock;

/// Vector extensions detected at first use.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuFeatures {
    /// 256-bit integer vectors (AVX2).
    pub wide256: bool,
    /// 128-bit integer vectors (SSE2 / NEON).
    pub wide128: bool,
}

impl CpuFeatures {
    /// Number of Salsa20 blocks generated per SIMD batch on this machine.
    #[must_use]
    pub fn stream_lanes(&self) -> usize {
        if self.wide256 {
            8
        } else if self.wide128 {
            4
        } else {
            1
        }
    }
}

static FEATURES: OnceLock<CpuFeatures> = OnceLock::new();

/// The process-wide feature record.
#[must_use]
pub fn features() -> &'static CpuFeatures {
    FEATURES.get_or_init(detect)
}

fn detect() -> CpuFeatures {
    #[cfg(target_arch = "x86_64")]
    {
        CpuFeatures {
            wide256: is_x86_feature_detected!("avx2"),
            wide128: is_x86_feature_detected!("sse2"),
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        CpuFeatures {
            wide256: false,
            wide128: true,
        }
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        CpuFeatures::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_is_stable() {
        let a = *features();
        let b = *features();
        assert_eq!(a.wide256, b.wide256);
        assert_eq!(a.wide128, b.wide128);
    }

    #[test]
    fn lane_count_is_legal() {
        assert!(matches!(features().stream_lanes(), 1 | 4 | 8));
    }
}
