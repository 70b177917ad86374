//! Retry backoff for dispatching actions to an [`crate::adapter::ExchangeAdapter`].
//!
//! A transient adapter error (rate limit, connection hiccup) is worth
//! retrying; a permanent one (rejected order, bad auth) is not. This module
//! couples the delay schedule to that distinction so call sites never have
//! to re-derive it.

use crate::adapter::AdapterErrorKind;
use rand::Rng;
use std::time::Duration;

/// Schedule parameters for [`ExponentialBackoff`].
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling the delay never grows past.
    pub max_delay: Duration,
    /// Growth factor applied to the delay after each attempt.
    pub multiplier: f64,
    /// Attempts allowed before giving up (`None` = retry forever).
    pub max_retries: Option<usize>,
    /// Fraction of the delay randomized to avoid every queue retrying in lockstep.
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_retries: Some(10),
            jitter_factor: 0.1,
        }
    }
}

impl BackoffConfig {
    /// Schedule with no cap on attempt count, everything else at defaults.
    pub fn unlimited() -> Self {
        Self {
            max_retries: None,
            ..Default::default()
        }
    }
}

/// Exponential backoff state machine, aware of which [`AdapterErrorKind`]
/// is worth waiting out.
pub struct ExponentialBackoff {
    config: BackoffConfig,
    current_attempt: usize,
    current_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self::with_config(BackoffConfig::default())
    }

    pub fn with_config(config: BackoffConfig) -> Self {
        Self {
            current_delay: config.initial_delay,
            current_attempt: 0,
            config,
        }
    }

    /// Delay before the next retry, or `None` if `kind` isn't worth retrying
    /// or the schedule is exhausted. A permanent error never consumes an
    /// attempt.
    pub fn next_delay_for(&mut self, kind: AdapterErrorKind) -> Option<Duration> {
        match kind {
            AdapterErrorKind::Permanent => None,
            AdapterErrorKind::Transient => self.next_delay(),
        }
    }

    /// Delay before the next retry, ignoring error kind. Returns `None` once
    /// `max_retries` is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max_retries) = self.config.max_retries {
            if self.current_attempt >= max_retries {
                return None;
            }
        }

        let delay = self.jittered_delay();

        self.current_attempt += 1;
        self.current_delay = std::cmp::min(
            Duration::from_secs_f64(self.current_delay.as_secs_f64() * self.config.multiplier),
            self.config.max_delay,
        );

        Some(delay)
    }

    fn jittered_delay(&self) -> Duration {
        if self.config.jitter_factor == 0.0 {
            return self.current_delay;
        }

        let mut rng = rand::thread_rng();
        let jitter = rng.gen::<f64>() * self.config.jitter_factor;
        let jitter_multiplier = 1.0 + (jitter - self.config.jitter_factor / 2.0);

        Duration::from_secs_f64(self.current_delay.as_secs_f64() * jitter_multiplier)
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
        self.current_delay = self.config.initial_delay;
    }

    pub fn attempt_number(&self) -> usize {
        self.current_attempt
    }

    pub fn can_retry(&self) -> bool {
        match self.config.max_retries {
            Some(max) => self.current_attempt < max,
            None => true,
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_count_up_and_delay_grows() {
        let mut backoff = ExponentialBackoff::new();

        assert_eq!(backoff.attempt_number(), 0);
        assert!(backoff.can_retry());

        let delay1 = backoff.next_delay().unwrap();
        assert_eq!(backoff.attempt_number(), 1);

        let delay2 = backoff.next_delay().unwrap();
        assert_eq!(backoff.attempt_number(), 2);
        assert!(delay2 > delay1);
    }

    #[test]
    fn max_retries_exhausts_the_schedule() {
        let config = BackoffConfig { max_retries: Some(3), ..Default::default() };
        let mut backoff = ExponentialBackoff::with_config(config);

        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());

        assert!(backoff.next_delay().is_none());
        assert!(!backoff.can_retry());
    }

    #[test]
    fn permanent_errors_never_get_a_delay_or_consume_an_attempt() {
        let mut backoff = ExponentialBackoff::new();
        assert!(backoff.next_delay_for(AdapterErrorKind::Permanent).is_none());
        assert_eq!(backoff.attempt_number(), 0);

        assert!(backoff.next_delay_for(AdapterErrorKind::Transient).is_some());
        assert_eq!(backoff.attempt_number(), 1);
    }

    #[test]
    fn delay_never_exceeds_the_configured_ceiling() {
        let config = BackoffConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_retries: Some(20),
            jitter_factor: 0.0,
        };
        let mut backoff = ExponentialBackoff::with_config(config);

        let mut last_delay = Duration::from_secs(0);
        for _ in 0..10 {
            if let Some(delay) = backoff.next_delay() {
                assert!(delay <= Duration::from_millis(100));
                last_delay = delay;
            }
        }

        assert!(last_delay >= Duration::from_millis(80));
    }

    #[test]
    fn reset_returns_to_the_initial_delay() {
        let mut backoff = ExponentialBackoff::new();

        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt_number(), 2);

        backoff.reset();
        assert_eq!(backoff.attempt_number(), 0);
        assert!(backoff.can_retry());
    }

    #[test]
    fn jitter_produces_varying_delays() {
        let config = BackoffConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            max_retries: Some(5),
            jitter_factor: 0.2,
        };
        let mut backoff = ExponentialBackoff::with_config(config);

        let delay1 = backoff.next_delay().unwrap();
        backoff.reset();
        let delay2 = backoff.next_delay().unwrap();
        backoff.reset();
        let delay3 = backoff.next_delay().unwrap();

        let all_equal = delay1 == delay2 && delay2 == delay3;
        assert!(!all_equal, "jitter should produce varying delays");
    }

    #[test]
    fn unlimited_never_exhausts() {
        let mut backoff = ExponentialBackoff::with_config(BackoffConfig::unlimited());

        for _ in 0..100 {
            assert!(backoff.next_delay().is_some());
            assert!(backoff.can_retry());
        }
    }

    #[test]
    fn exponential_growth_doubles_each_attempt() {
        let config = BackoffConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(100),
            multiplier: 2.0,
            max_retries: Some(5),
            jitter_factor: 0.0,
        };
        let mut backoff = ExponentialBackoff::with_config(config);

        let delay1 = backoff.next_delay().unwrap();
        let delay2 = backoff.next_delay().unwrap();
        let delay3 = backoff.next_delay().unwrap();

        assert!(delay2.as_millis() >= delay1.as_millis() * 2);
        assert!(delay3.as_millis() >= delay2.as_millis() * 2);
    }
}
