/// Trips after `threshold` consecutive backend failures.
/// A threshold of zero never trips.
#[derive(Debug, Clone)]
pub struct FailureBreaker {
    threshold: u32,
    consecutive: u32,
}

impl FailureBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive: 0,
        }
    }

    /// Returns true once the threshold is reached
    pub fn record_failure(&mut self) -> bool {
        self.consecutive += 1;
        self.is_tripped()
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    pub fn is_tripped(&self) -> bool {
        self.threshold > 0 && self.consecutive >= self.threshold
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_on_consecutive_failures() {
        let mut breaker = FailureBreaker::new(3);
        assert!(!breaker.record_failure());
        assert!(!breaker.record_failure());
        breaker.record_success();
        assert!(!breaker.record_failure());
        assert!(!breaker.record_failure());
        assert!(breaker.record_failure());
    }

    #[test]
    fn test_zero_threshold_disabled() {
        let mut breaker = FailureBreaker::new(0);
        for _ in 0..100 {
            assert!(!breaker.record_failure());
        }
    }
}
