//! Progress sampling for streaming transfers.
//!
//! The [`ProgressSampler`] turns a running byte counter into periodic
//! [`ProgressSample`]s with percentage, transfer rate, and ETA. Emission is
//! rate-limited so that many small chunks cannot flood the caller's progress
//! callback. State is per attempt: the transfer loop constructs a fresh
//! sampler each time an attempt starts streaming.

use std::time::Instant;

use serde::Serialize;

/// Minimum interval between emitted samples.
const SAMPLE_INTERVAL_MS: u64 = 500;

/// A point-in-time snapshot of transfer progress.
///
/// Advisory only: samples are derived from the byte counter and never
/// influence the transfer itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSample {
    /// Bytes written so far in the current attempt.
    pub bytes_done: u64,
    /// Expected total size in bytes; 0 when the server did not declare one.
    pub bytes_total: u64,
    /// Completion percentage in `[0, 100]`; 0 when the total is unknown.
    pub percentage: f64,
    /// Transfer rate over the interval since the previous sample.
    pub bytes_per_second: f64,
    /// Estimated seconds remaining; 0 when the rate is non-positive or the
    /// total is unknown.
    pub eta_seconds: f64,
}

/// Rate-limited sample producer for one transfer attempt.
#[derive(Debug)]
pub struct ProgressSampler {
    /// Instant of the last emission (attempt start counts as one).
    last_sample_at: Instant,
    /// Byte counter value at the last emission.
    last_sample_bytes: u64,
}

impl ProgressSampler {
    /// Creates a sampler for an attempt that started at `now`.
    ///
    /// The first chunk does not force an emission: nothing is emitted until
    /// [`SAMPLE_INTERVAL_MS`] has elapsed since `now`.
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            last_sample_at: now,
            last_sample_bytes: 0,
        }
    }

    /// Offers the current byte counter; returns a sample if enough time has
    /// passed since the last one.
    pub fn offer(
        &mut self,
        bytes_done: u64,
        bytes_total: u64,
        now: Instant,
    ) -> Option<ProgressSample> {
        let elapsed_ms = now.duration_since(self.last_sample_at).as_millis() as u64;
        if elapsed_ms < SAMPLE_INTERVAL_MS {
            return None;
        }

        let sample = self.compute(bytes_done, bytes_total, elapsed_ms);
        self.last_sample_at = now;
        self.last_sample_bytes = bytes_done;
        Some(sample)
    }

    /// Produces the end-of-attempt sample, bypassing the rate limit.
    ///
    /// When the total is known this reports 100 percent on a complete relay.
    pub fn finish(&mut self, bytes_done: u64, bytes_total: u64, now: Instant) -> ProgressSample {
        let elapsed_ms = now.duration_since(self.last_sample_at).as_millis() as u64;
        let sample = self.compute(bytes_done, bytes_total, elapsed_ms.max(1));
        self.last_sample_at = now;
        self.last_sample_bytes = bytes_done;
        sample
    }

    fn compute(&self, bytes_done: u64, bytes_total: u64, elapsed_ms: u64) -> ProgressSample {
        let delta = bytes_done.saturating_sub(self.last_sample_bytes);
        let bytes_per_second = if elapsed_ms > 0 {
            delta as f64 / elapsed_ms as f64 * 1000.0
        } else {
            0.0
        };

        let percentage = if bytes_total > 0 {
            (bytes_done as f64 / bytes_total as f64 * 100.0).min(100.0)
        } else {
            0.0
        };

        let eta_seconds = if bytes_per_second > 0.0 && bytes_total > 0 {
            bytes_total.saturating_sub(bytes_done) as f64 / bytes_per_second
        } else {
            0.0
        };

        ProgressSample {
            bytes_done,
            bytes_total,
            percentage,
            bytes_per_second,
            eta_seconds,
        }
    }
}
