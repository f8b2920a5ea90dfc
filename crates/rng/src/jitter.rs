//! CPU jitter entropy collector.
//!
//! Measures timing jitter of a fixed noise workload — a strided walk over a
//! scratch region followed by a fold loop — and concentrates the deltas into
//! output words. Samples whose delta (or delta-of-deltas) repeats the
//! previous measurement are stuck and discarded without advancing the
//! output. A supplementary source only: combine with the system provider
//! when deriving keys.

use symx_core::CryptoError;
use zeroize::Zeroize;

use crate::provider::Provider;

const MEMORY_BLOCKS: usize = 512;
const MEMORY_BLOCK_SIZE: usize = 32;
const MEMORY_SIZE: usize = MEMORY_BLOCKS * MEMORY_BLOCK_SIZE;
const MEMORY_ACCESS_LOOPS: usize = 256;
const FOLD_LOOP_BIT_MAX: u32 = 4;
const LOOP_TEST_COUNT: usize = 300;
const DATA_SIZE_BITS: usize = 64;
const OVERSAMPLE_RATE_MIN: u32 = 1;
const OVERSAMPLE_RATE_MAX: u32 = 128;
/// Von Neumann pair draws before falling back to the raw bit.
const DEBIAS_ATTEMPTS: usize = 128;

/// CPU jitter entropy provider.
pub struct JitterProvider {
    enable_access: bool,
    enable_debias: bool,
    is_available: bool,
    last_delta: u64,
    last_delta2: u64,
    mem_position: usize,
    mem_state: Vec<u8>,
    over_sample_rate: u32,
    prev_time: u64,
    start: std::time::Instant,
    stuck_count: u64,
}

impl Default for JitterProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterProvider {
    /// Construct the collector and probe the timer once; availability never
    /// changes afterwards.
    #[must_use]
    pub fn new() -> Self {
        let mut provider = Self {
            enable_access: true,
            enable_debias: true,
            is_available: false,
            last_delta: 0,
            last_delta2: 0,
            mem_position: 0,
            mem_state: vec![0u8; MEMORY_SIZE],
            over_sample_rate: OVERSAMPLE_RATE_MIN,
            prev_time: 0,
            start: std::time::Instant::now(),
            stuck_count: 0,
        };
        provider.is_available = provider.timer_check();
        tracing::debug!(
            available = provider.is_available,
            "jitter provider timer probe"
        );
        provider.prev_time = provider.timestamp();
        provider
    }

    /// Toggle the memory-access noise source (enabled by default).
    pub fn set_enable_access(&mut self, enabled: bool) {
        self.enable_access = enabled;
    }

    /// Toggle the Von Neumann debiasing extractor (enabled by default).
    pub fn set_enable_debias(&mut self, enabled: bool) {
        self.enable_debias = enabled;
    }

    /// Jitter samples combined per output bit.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidParameter`] outside 1..=128.
    pub fn set_over_sample_rate(&mut self, rate: u32) -> Result<(), CryptoError> {
        if !(OVERSAMPLE_RATE_MIN..=OVERSAMPLE_RATE_MAX).contains(&rate) {
            return Err(CryptoError::InvalidParameter(
                "oversample rate must be between 1 and 128",
            ));
        }
        self.over_sample_rate = rate;
        Ok(())
    }

    /// Samples discarded by the stuck test so far.
    #[must_use]
    pub fn stuck_count(&self) -> u64 {
        self.stuck_count
    }

    fn timestamp(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    /// Startup probe: the timer must advance and must resolve individual
    /// workload runs often enough to carry jitter.
    fn timer_check(&mut self) -> bool {
        let mut zero_deltas = 0usize;
        let mut repeats = 0usize;
        let mut previous = 0u64;

        for _ in 0..LOOP_TEST_COUNT {
            let t0 = self.timestamp();
            self.access_memory();
            core::hint::black_box(self.fold_time(t0));
            let t1 = self.timestamp();

            let delta = t1.wrapping_sub(t0);
            if delta == 0 {
                zero_deltas += 1;
            }
            if delta == previous {
                repeats += 1;
            }
            previous = delta;
        }

        zero_deltas < LOOP_TEST_COUNT / 10 && repeats < LOOP_TEST_COUNT / 2
    }

    /// One jitter measurement: returns the folded sample and whether the
    /// stuck test discarded it.
    fn measure_jitter(&mut self) -> (u64, bool) {
        let current = self.timestamp();
        let delta = current.wrapping_sub(self.prev_time);
        self.prev_time = current;

        if self.enable_access {
            self.access_memory();
        }
        let folded = self.fold_time(delta);
        let stuck = self.stuck_check(delta);
        (folded, stuck)
    }

    /// Strided walk over the scratch region; the cache and memory latencies
    /// it provokes are the noise source.
    fn access_memory(&mut self) {
        for _ in 0..MEMORY_ACCESS_LOOPS {
            let pos = self.mem_position;
            self.mem_state[pos] = self.mem_state[pos].wrapping_add(1);
            self.mem_position = (pos + MEMORY_BLOCK_SIZE - 1) % MEMORY_SIZE;
        }
        core::hint::black_box(&self.mem_state);
    }

    /// Fold the 64 bits of `time` into one; the fold count is itself
    /// time-shuffled so the workload duration varies.
    fn fold_time(&self, time: u64) -> u64 {
        let folds = self.shuffle_loop(FOLD_LOOP_BIT_MAX, 1);
        let mut folded = 0u64;
        for _ in 0..folds {
            for i in 0..DATA_SIZE_BITS {
                folded ^= (time >> i) & 1;
            }
        }
        core::hint::black_box(folded)
    }

    /// A small loop count derived from the current time, bounded by
    /// `2^bits`, at least `min`.
    fn shuffle_loop(&self, bits: u32, min: u64) -> u64 {
        let t = self.timestamp();
        let mask = (1u64 << bits) - 1;
        ((t ^ (t >> 32)) & mask) + min
    }

    fn stuck_check(&mut self, delta: u64) -> bool {
        let delta2 = delta.wrapping_sub(self.last_delta);
        let stuck = delta == self.last_delta || delta2 == self.last_delta2;
        self.last_delta = delta;
        self.last_delta2 = delta2;
        if stuck {
            self.stuck_count = self.stuck_count.wrapping_add(1);
        }
        stuck
    }

    /// One output bit; `None` when the measurement was stuck.
    fn next_bit(&mut self) -> Option<u64> {
        if !self.enable_debias {
            let (sample, stuck) = self.measure_jitter();
            return (!stuck).then_some(sample & 1);
        }

        // Von Neumann extractor: 01 -> 0, 10 -> 1, equal pairs dropped.
        for _ in 0..DEBIAS_ATTEMPTS {
            let (a, stuck_a) = self.measure_jitter();
            let (b, stuck_b) = self.measure_jitter();
            if stuck_a || stuck_b {
                return None;
            }
            match (a & 1, b & 1) {
                (0, 1) => return Some(0),
                (1, 0) => return Some(1),
                _ => {}
            }
        }
        let (sample, stuck) = self.measure_jitter();
        (!stuck).then_some(sample & 1)
    }

    fn generate_word(&mut self) -> u64 {
        let rounds = DATA_SIZE_BITS * self.over_sample_rate as usize;
        let mut word = 0u64;
        let mut collected = 0usize;
        while collected < rounds {
            let Some(bit) = self.next_bit() else {
                continue; // stuck sample: do not advance the output
            };
            word = word.rotate_left(1) ^ bit;
            collected += 1;
        }
        word
    }
}

impl Provider for JitterProvider {
    fn name(&self) -> &'static str {
        "CJP"
    }

    fn is_available(&self) -> bool {
        self.is_available
    }

    fn get_bytes(&mut self, output: &mut [u8]) -> Result<(), CryptoError> {
        if !self.is_available {
            return Err(CryptoError::ProviderUnavailable(
                "timer resolution is insufficient for jitter collection",
            ));
        }
        for chunk in output.chunks_mut(8) {
            let word = self.generate_word();
            chunk.copy_from_slice(&word.to_le_bytes()[..chunk.len()]);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.mem_state.zeroize();
        self.mem_position = 0;
        self.last_delta = 0;
        self.last_delta2 = 0;
        self.stuck_count = 0;
        self.prev_time = self.timestamp();
    }
}
