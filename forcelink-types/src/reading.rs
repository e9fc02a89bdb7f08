//! Measurement results

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Result of sampling a load cell over a window
#[derive(Debug, Clone, PartialEq)]
pub struct PeakReading {
    /// Sample with the largest magnitude
    pub peak: f64,

    /// Successful samples
    pub samples: usize,

    /// Samples that failed and were skipped
    pub failed_samples: usize,

    /// Wall-clock duration of the window
    pub elapsed: Duration,

    pub completed_at: DateTime<Utc>,
}

impl PeakReading {
    /// Pick the sample with the largest magnitude
    ///
    /// Returns `None` if there are no samples.
    pub fn from_samples(
        samples: &[f64],
        failed_samples: usize,
        elapsed: Duration,
    ) -> Option<Self> {
        let peak = samples
            .iter()
            .copied()
            .max_by(|a, b| a.abs().total_cmp(&b.abs()))?;

        Some(Self {
            peak,
            samples: samples.len(),
            failed_samples,
            elapsed,
            completed_at: Utc::now(),
        })
    }
}

impl fmt::Display for PeakReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Peak[{:.3}] ({} samples, {} failed, {} ms)",
            self.peak,
            self.samples,
            self.failed_samples,
            self.elapsed.as_millis()
        )
    }
}
