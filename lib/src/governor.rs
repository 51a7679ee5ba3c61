use crate::config::DEFAULT_RECOMPUTE_INTERVAL;
use std::time::Duration;

/// Limits how often the diffusion pass runs against wall-clock time
#[derive(Debug, Clone)]
pub struct FrameRateGovernor {
    interval_ms: u64,
    last_ms: Option<u64>,
}

impl Default for FrameRateGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_RECOMPUTE_INTERVAL)
    }
}

impl FrameRateGovernor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis().min(u64::MAX as u128) as u64,
            last_ms: None,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Whether a new pass may run at `now_ms`.
    ///
    /// Returning true commits `now_ms` as the time of the last pass. The first
    /// call always returns true. A clock that goes backwards never unblocks
    /// early: elapsed time saturates at zero.
    pub fn should_recompute(&mut self, now_ms: u64) -> bool {
        let due = match self.last_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        };
        if due {
            self.last_ms = Some(now_ms);
        }
        due
    }

    /// Forget the last pass so the next call recomputes immediately
    pub fn reset(&mut self) {
        self.last_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifty_millisecond_gate() {
        let mut gov = FrameRateGovernor::default();
        let results: Vec<bool> = [0, 10, 49, 50, 100]
            .into_iter()
            .map(|t| gov.should_recompute(t))
            .collect();
        assert_eq!(results, vec![true, false, false, true, true]);
    }

    #[test]
    fn test_rejected_calls_do_not_commit() {
        let mut gov = FrameRateGovernor::new(Duration::from_millis(50));
        assert!(gov.should_recompute(1000));
        assert!(!gov.should_recompute(1040));
        // 1040 was rejected, so the window still starts at 1000
        assert!(gov.should_recompute(1050));
    }

    #[test]
    fn test_reset_forces_recompute() {
        let mut gov = FrameRateGovernor::default();
        assert!(gov.should_recompute(500));
        assert!(!gov.should_recompute(501));
        gov.reset();
        assert!(gov.should_recompute(502));
    }

    #[test]
    fn test_clock_going_backwards() {
        let mut gov = FrameRateGovernor::default();
        assert!(gov.should_recompute(10_000));
        assert!(!gov.should_recompute(20));
    }

    #[test]
    fn test_zero_interval_always_recomputes() {
        let mut gov = FrameRateGovernor::new(Duration::ZERO);
        assert!(gov.should_recompute(5));
        assert!(gov.should_recompute(5));
        assert_eq!(gov.interval(), Duration::ZERO);
    }
}
