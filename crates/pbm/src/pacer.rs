//! Converts a simulated-time speedup factor into inter-batch sleep
//! intervals, approximating the "mid-size PBM" real-world baseline of
//! 1,000,000 claims / 86,400 seconds.

use std::time::Duration;

use crate::cancel::CancellationToken;

/// Real-world baseline throughput, claims/sec, per spec.md §4.4.
pub const BASELINE_CLAIMS_PER_SEC: f64 = 1_000_000.0 / 86_400.0;

/// Below this, the computed delay rounds down to zero rather than sleeping.
const FLOOR: Duration = Duration::from_millis(1);

pub struct Pacer {
    batch_size: usize,
    speedup: f64,
}

impl Pacer {
    pub fn new(batch_size: usize, speedup: f64) -> Self {
        assert!(speedup >= 1.0, "speedup must be >= 1.0");
        Self { batch_size, speedup }
    }

    /// Interval to sleep after persisting one batch to hold the configured
    /// speedup's effective throughput.
    pub fn interval(&self) -> Duration {
        let effective_rate = BASELINE_CLAIMS_PER_SEC * self.speedup;
        let seconds = self.batch_size as f64 / effective_rate;
        let duration = Duration::from_secs_f64(seconds.max(0.0));
        if duration < FLOOR {
            Duration::ZERO
        } else {
            duration
        }
    }

    /// Sleep for [`interval`], cancellable: a cancel request racing the
    /// sleep returns immediately rather than blocking the cooperative
    /// shutdown described in spec.md §4.5.
    pub async fn sleep_after_batch(&self, cancel: &CancellationToken) {
        let interval = self.interval();
        if interval.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = wait_for_cancel(cancel) => {}
        }
    }
}

/// Polls the cooperative cancellation token until it fires. Used only to
/// race against the pacer's sleep; a short poll interval keeps cancel
/// latency low without needing a notify channel for this single use.
async fn wait_for_cancel(cancel: &CancellationToken) {
    while !cancel.is_cancelled() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speedup_one_yields_near_baseline_interval() {
        let pacer = Pacer::new(100, 1.0);
        // 100 claims / 11.57 claims-per-sec ~= 8.64s
        let secs = pacer.interval().as_secs_f64();
        assert!((8.0..9.5).contains(&secs), "unexpected interval {secs}");
    }

    #[test]
    fn high_speedup_floors_to_zero() {
        let pacer = Pacer::new(100, 100_000.0);
        assert_eq!(pacer.interval(), Duration::ZERO);
    }

    #[tokio::test]
    async fn sleep_after_batch_is_cancellable() {
        let pacer = Pacer::new(1_000_000, 1.0); // would otherwise sleep ~a day
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel_clone.cancel();
        });
        let start = std::time::Instant::now();
        pacer.sleep_after_batch(&cancel).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
