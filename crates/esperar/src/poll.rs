//! Polling engine ("wait-until").
//!
//! Repeatedly invokes a probe at a fixed interval until it satisfies the
//! stop condition or the deadline elapses. The deadline is wall-clock based,
//! not iteration-count based; a slow probe can overrun an attempt without
//! preemption. Attempts are strictly sequential.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::result::EsperarResult;

/// Default wait budget for matcher polling (3 seconds)
pub const DEFAULT_WAIT_MS: u64 = 3000;

/// Default interval between poll attempts (100ms)
pub const DEFAULT_INTERVAL_MS: u64 = 100;

/// Wait/interval budget for one polling run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Total wait budget in milliseconds; `0` means exactly one attempt
    pub wait_ms: u64,
    /// Sleep between attempts in milliseconds
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            wait_ms: DEFAULT_WAIT_MS,
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

impl PollConfig {
    /// Create a config with a wait budget and the default interval
    #[must_use]
    pub const fn new(wait_ms: u64) -> Self {
        Self {
            wait_ms,
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }

    /// Set the interval
    #[must_use]
    pub const fn with_interval(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// A single-attempt config (no retries, no sleeping)
    #[must_use]
    pub const fn once() -> Self {
        Self {
            wait_ms: 0,
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

/// One probe observation: whether the condition held and the observed value
#[derive(Debug, Clone)]
pub struct Attempt<T> {
    /// Whether the (non-negated) condition was satisfied
    pub satisfied: bool,
    /// The value observed by this attempt
    pub value: T,
}

impl<T> Attempt<T> {
    /// Create an attempt observation
    pub const fn new(satisfied: bool, value: T) -> Self {
        Self { satisfied, value }
    }
}

/// Final state of a polling run. The engine never errors on timeout; the
/// caller interprets an unsatisfied final attempt as failure.
#[derive(Debug, Clone)]
pub struct PollStatus<T> {
    /// Value observed by the final attempt
    pub value: T,
    /// Whether the final attempt satisfied the (non-negated) condition
    pub satisfied: bool,
    /// Number of probe invocations
    pub attempts: usize,
    /// Wall-clock time spent polling
    pub elapsed: Duration,
    /// Whether the run ended because the deadline elapsed
    pub deadline_hit: bool,
}

impl<T> PollStatus<T> {
    /// Whether the run stopped for the caller's desired outcome:
    /// `satisfied` for a normal poll, `!satisfied` for an inverted one.
    #[must_use]
    pub const fn stopped_on(&self, invert: bool) -> bool {
        !self.deadline_hit && (self.satisfied != invert)
    }
}

/// Poll `probe` until its stop condition holds or `config.wait_ms` elapses.
///
/// The first attempt runs immediately; a satisfying first attempt returns
/// without sleeping. `wait_ms == 0` makes exactly one attempt regardless of
/// the interval.
///
/// `invert` threads negation into the stop condition itself: an inverted
/// poll keeps retrying while the probe is satisfied and stops on the first
/// unsatisfied attempt. Applying negation after the fact would let a negated
/// matcher pass just because the first attempt happened to observe the
/// un-negated truth value.
///
/// A probe error is a systemic failure, not a "not yet" signal: it
/// propagates immediately, ending the poll. "Condition not yet met" is
/// communicated through `Attempt::satisfied`, never by error subtype.
pub fn wait_until<T, F>(mut probe: F, invert: bool, config: &PollConfig) -> EsperarResult<PollStatus<T>>
where
    F: FnMut() -> EsperarResult<Attempt<T>>,
{
    let start = Instant::now();
    let interval = Duration::from_millis(config.interval_ms);
    let deadline = Duration::from_millis(config.wait_ms);
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        let attempt = probe()?;
        trace!(attempts, satisfied = attempt.satisfied, invert, "poll attempt");

        if attempt.satisfied != invert {
            return Ok(PollStatus {
                value: attempt.value,
                satisfied: attempt.satisfied,
                attempts,
                elapsed: start.elapsed(),
                deadline_hit: false,
            });
        }

        if config.wait_ms == 0 || start.elapsed() >= deadline {
            return Ok(PollStatus {
                value: attempt.value,
                satisfied: attempt.satisfied,
                attempts,
                elapsed: start.elapsed(),
                deadline_hit: true,
            });
        }

        std::thread::sleep(interval);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::result::EsperarError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_probe(
        counter: Arc<AtomicUsize>,
        pass_from: usize,
    ) -> impl FnMut() -> EsperarResult<Attempt<usize>> {
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Attempt::new(n >= pass_from, n))
        }
    }

    mod stop_conditions {
        use super::*;

        #[test]
        fn test_immediate_success_no_sleep() {
            let status = wait_until(
                || Ok(Attempt::new(true, 7)),
                false,
                &PollConfig::new(1000).with_interval(1000),
            )
            .unwrap();
            assert_eq!(status.attempts, 1);
            assert!(status.satisfied);
            assert!(!status.deadline_hit);
            assert!(status.elapsed < Duration::from_millis(500));
        }

        #[test]
        fn test_success_after_exactly_k_attempts() {
            let counter = Arc::new(AtomicUsize::new(0));
            let status = wait_until(
                counting_probe(Arc::clone(&counter), 3),
                false,
                &PollConfig::new(1000).with_interval(10),
            )
            .unwrap();
            assert_eq!(status.attempts, 3);
            assert_eq!(counter.load(Ordering::SeqCst), 3);
            assert_eq!(status.value, 3);
        }

        #[test]
        fn test_timeout_returns_last_attempt() {
            let status = wait_until(
                || Ok(Attempt::new(false, "still wrong")),
                false,
                &PollConfig::new(60).with_interval(20),
            )
            .unwrap();
            assert!(status.deadline_hit);
            assert!(!status.satisfied);
            assert_eq!(status.value, "still wrong");
            assert!(status.attempts > 1);
        }
    }

    mod zero_wait {
        use super::*;

        #[test]
        fn test_single_attempt_on_failure() {
            let counter = Arc::new(AtomicUsize::new(0));
            let status = wait_until(
                counting_probe(Arc::clone(&counter), usize::MAX),
                false,
                &PollConfig::once(),
            )
            .unwrap();
            assert_eq!(status.attempts, 1);
            assert_eq!(counter.load(Ordering::SeqCst), 1);
            assert!(status.deadline_hit);
        }

        #[test]
        fn test_single_attempt_on_success() {
            let counter = Arc::new(AtomicUsize::new(0));
            let status = wait_until(
                counting_probe(Arc::clone(&counter), 1),
                false,
                &PollConfig::once(),
            )
            .unwrap();
            assert_eq!(status.attempts, 1);
            assert!(status.satisfied);
        }
    }

    mod inverted_polls {
        use super::*;

        #[test]
        fn test_inverted_stops_on_first_false() {
            let status = wait_until(
                || Ok(Attempt::new(false, ())),
                true,
                &PollConfig::new(1000).with_interval(200),
            )
            .unwrap();
            assert_eq!(status.attempts, 1);
            assert!(!status.satisfied);
            assert!(status.stopped_on(true));
        }

        #[test]
        fn test_inverted_retries_while_true() {
            // Condition holds for the first two attempts, then drops.
            let counter = Arc::new(AtomicUsize::new(0));
            let c = Arc::clone(&counter);
            let status = wait_until(
                move || {
                    let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(Attempt::new(n <= 2, n))
                },
                true,
                &PollConfig::new(1000).with_interval(10),
            )
            .unwrap();
            assert_eq!(status.attempts, 3);
            assert!(!status.satisfied);
        }

        #[test]
        fn test_inverted_timeout_when_condition_never_drops() {
            let status = wait_until(
                || Ok(Attempt::new(true, ())),
                true,
                &PollConfig::new(50).with_interval(20),
            )
            .unwrap();
            assert!(status.deadline_hit);
            assert!(status.satisfied);
            assert!(!status.stopped_on(true));
        }
    }

    mod probe_errors {
        use super::*;

        #[test]
        fn test_error_propagates_immediately() {
            let counter = Arc::new(AtomicUsize::new(0));
            let c = Arc::clone(&counter);
            let result: EsperarResult<PollStatus<()>> = wait_until(
                move || {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(EsperarError::ElementNotFound {
                        command: "isDisplayed".to_string(),
                        selector: "#gone".to_string(),
                    })
                },
                false,
                &PollConfig::new(1000).with_interval(10),
            );
            assert!(result.is_err());
            assert_eq!(counter.load(Ordering::SeqCst), 1);
        }
    }

    mod config {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = PollConfig::default();
            assert_eq!(config.wait_ms, DEFAULT_WAIT_MS);
            assert_eq!(config.interval_ms, DEFAULT_INTERVAL_MS);
        }

        #[test]
        fn test_builder() {
            let config = PollConfig::new(500).with_interval(25);
            assert_eq!(config.wait_ms, 500);
            assert_eq!(config.interval_ms, 25);
        }
    }
}
