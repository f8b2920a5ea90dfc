//! Parallel processing profile.
//!
//! Engines that split work across a thread pool carry a [`ParallelOptions`]
//! describing the partition: the primitive block size, the fork-join degree,
//! and the input threshold below which processing stays serial. The partition
//! is deterministic from the input length and the degree, so parallel output
//! is bit-identical across runs for a fixed degree.

use crate::error::CryptoError;

/// Default per-worker work unit in bytes; amortizes dispatch cost.
const DEFAULT_SUBBLOCK: usize = 16 * 1024;

/// Fork-join tuning profile shared by the cipher and digest engines.
#[derive(Debug, Clone)]
pub struct ParallelOptions {
    block_size: usize,
    is_parallel: bool,
    parallel_block_size: usize,
    parallel_max_degree: usize,
    processor_count: usize,
}

impl ParallelOptions {
    /// Create a profile for a primitive with the given block size.
    ///
    /// `parallel` requests parallel processing; it is honored only when the
    /// machine exposes at least two cores (the degree must be even).
    #[must_use]
    pub fn new(block_size: usize, parallel: bool) -> Self {
        let processor_count = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        // Largest even degree the machine supports.
        let degree = if processor_count >= 2 {
            processor_count - (processor_count % 2)
        } else {
            1
        };

        let mut opts = Self {
            block_size,
            is_parallel: parallel && degree >= 2,
            parallel_block_size: 0,
            parallel_max_degree: degree,
            processor_count,
        };
        opts.calculate();
        opts
    }

    /// The primitive block size in bytes.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Whether parallel processing is enabled.
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        self.is_parallel
    }

    /// Input threshold at which a call switches to the parallel path.
    #[must_use]
    pub fn parallel_block_size(&self) -> usize {
        self.parallel_block_size
    }

    /// Number of fork-join workers.
    #[must_use]
    pub fn parallel_max_degree(&self) -> usize {
        self.parallel_max_degree
    }

    /// Smallest parallel work unit; parallel inputs are partitioned in
    /// multiples of this size.
    #[must_use]
    pub fn parallel_min_size(&self) -> usize {
        self.parallel_max_degree * self.block_size
    }

    /// Logical cores available to the process.
    #[must_use]
    pub fn processor_count(&self) -> usize {
        self.processor_count
    }

    /// Override the fork-join degree.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidParameter`] when the degree is zero, odd, or
    /// exceeds the processor count.
    pub fn set_max_degree(&mut self, degree: usize) -> Result<(), CryptoError> {
        if degree == 0 {
            return Err(CryptoError::InvalidParameter(
                "parallel degree can not be zero",
            ));
        }
        if degree % 2 != 0 {
            return Err(CryptoError::InvalidParameter(
                "parallel degree must be an even number",
            ));
        }
        if degree > self.processor_count {
            return Err(CryptoError::InvalidParameter(
                "parallel degree can not exceed processor count",
            ));
        }

        self.parallel_max_degree = degree;
        self.calculate();
        Ok(())
    }

    /// Disable or re-enable the parallel path without changing the degree.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.is_parallel = parallel && self.parallel_max_degree >= 2;
    }

    fn calculate(&mut self) {
        let min = self.parallel_min_size();
        let target = self.parallel_max_degree * DEFAULT_SUBBLOCK;
        // Threshold aligned down to a whole number of minimum work units.
        self.parallel_block_size = (target / min).max(1) * min;
    }
}
