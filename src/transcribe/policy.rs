use std::time::Duration;

/// Bounds on how a transcription job is polled.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Wait after the first non-terminal status check.
    pub interval: Duration,
    /// Upper bound for the wait once backoff kicks in.
    pub max_interval: Duration,
    /// Factor applied to the wait after every check; 1.0 keeps it fixed.
    pub backoff: f64,
    /// Status checks allowed before giving up.
    pub max_attempts: u32,
    /// Wall-clock bound on the whole polling phase.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(30),
            backoff: 1.0,
            max_attempts: 120,
            timeout: Duration::from_secs(15 * 60),
        }
    }
}

impl PollPolicy {
    /// Wait to apply after `attempt` (1-based) status checks have come back non-terminal.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff.max(1.0).powi(exponent);
        let scaled = self.interval.as_secs_f64() * factor;
        if !scaled.is_finite() || scaled >= self.max_interval.as_secs_f64() {
            self.max_interval.max(self.interval)
        } else {
            Duration::from_secs_f64(scaled)
        }
    }
}
