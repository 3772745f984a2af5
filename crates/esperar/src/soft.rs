//! Soft-assertion service.
//!
//! Soft matchers record failures instead of returning them, so one logical
//! test can accumulate several diffs and flush them at end-of-test. Records
//! live in a process-wide registry keyed by test id; appends are safe under
//! concurrent assertion completion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::result::{EsperarError, EsperarResult};

/// One recorded soft failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftFailure {
    /// Matcher that failed (prefixed `not.` when negated)
    pub matcher: String,
    /// Formatted failure message
    pub message: String,
    /// Position in the test's assertion sequence
    pub index: usize,
    /// When the failure was recorded
    pub recorded_at: std::time::SystemTime,
}

/// Identity of a logical test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMeta {
    /// Stable id, unique per test invocation
    pub id: String,
    /// Human-readable test name
    pub name: String,
}

impl TestMeta {
    /// Create test metadata
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Mutable result of a finished test, as seen by the runner
#[derive(Debug, Clone)]
pub struct TestOutcome {
    /// Whether the test body completed without error
    pub passed: bool,
    /// Error text attached to the result
    pub error: Option<String>,
    /// Test duration
    pub duration: Duration,
}

impl TestOutcome {
    /// A passing outcome
    #[must_use]
    pub const fn passed(duration: Duration) -> Self {
        Self {
            passed: true,
            error: None,
            duration,
        }
    }
}

/// Summary of soft assertions for one test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftSummary {
    /// Total soft assertions checked
    pub total: usize,
    /// Assertions that passed
    pub passed: usize,
    /// Assertions that failed
    pub failed: usize,
}

#[derive(Debug, Default)]
struct TestRecord {
    failures: Vec<SoftFailure>,
    assertion_count: usize,
}

#[derive(Debug, Default)]
struct Inner {
    current: Option<String>,
    tests: HashMap<String, TestRecord>,
}

/// Registry of soft failures keyed by test id.
///
/// Tests normally go through the process-wide instance from
/// [`SoftRegistry::global`]; a local instance behaves identically and keeps
/// unit tests isolated.
#[derive(Debug, Default)]
pub struct SoftRegistry {
    inner: Mutex<Inner>,
}

impl SoftRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn global_cell() -> &'static Arc<Self> {
        static GLOBAL: OnceLock<Arc<SoftRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Self::new()))
    }

    /// The process-wide registry
    pub fn global() -> &'static Self {
        Self::global_cell().as_ref()
    }

    /// Shared handle to the process-wide registry
    #[must_use]
    pub fn global_arc() -> Arc<Self> {
        Arc::clone(Self::global_cell())
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        // Recover from poisoning; registry state is plain data
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut inner)
    }

    /// Mark a test as current. Idempotent for the same id: records already
    /// collected for the id survive. Switching ids changes the current test
    /// without touching either id's records.
    pub fn set_current_test(&self, meta: &TestMeta) {
        self.with_inner(|inner| {
            inner.current = Some(meta.id.clone());
            inner.tests.entry(meta.id.clone()).or_default();
        });
    }

    /// Clear the current test. Records stay until explicitly cleared or
    /// flushed by [`Self::after_test`].
    pub fn clear_current_test(&self) {
        self.with_inner(|inner| inner.current = None);
    }

    /// Id of the current test
    #[must_use]
    pub fn current_test(&self) -> Option<String> {
        self.with_inner(|inner| inner.current.clone())
    }

    /// Record a passing soft assertion for the current test
    pub fn record_pass(&self) -> EsperarResult<()> {
        self.with_inner(|inner| {
            let id = inner.current.clone().ok_or(EsperarError::NoActiveTest)?;
            inner.tests.entry(id).or_default().assertion_count += 1;
            Ok(())
        })
    }

    /// Record a failing soft assertion for the current test
    pub fn add_failure(
        &self,
        matcher: impl Into<String>,
        message: impl Into<String>,
    ) -> EsperarResult<()> {
        let matcher = matcher.into();
        let message = message.into();
        self.with_inner(|inner| {
            let id = inner.current.clone().ok_or(EsperarError::NoActiveTest)?;
            let record = inner.tests.entry(id.clone()).or_default();
            record.assertion_count += 1;
            let failure = SoftFailure {
                matcher: matcher.clone(),
                message,
                index: record.failures.len(),
                recorded_at: std::time::SystemTime::now(),
            };
            debug!(test_id = %id, matcher = %matcher, "soft assertion failed");
            record.failures.push(failure);
            Ok(())
        })
    }

    /// Failures recorded for a test id, or for the current test when `None`
    #[must_use]
    pub fn failures(&self, test_id: Option<&str>) -> Vec<SoftFailure> {
        self.with_inner(|inner| {
            let id = test_id
                .map(str::to_string)
                .or_else(|| inner.current.clone());
            id.and_then(|id| inner.tests.get(&id))
                .map(|r| r.failures.clone())
                .unwrap_or_default()
        })
    }

    /// Clear records for a test id, or for the current test when `None`
    pub fn clear_failures(&self, test_id: Option<&str>) {
        self.with_inner(|inner| {
            let id = test_id
                .map(str::to_string)
                .or_else(|| inner.current.clone());
            if let Some(id) = id {
                inner.tests.remove(&id);
            }
        });
    }

    /// Summary for a test id, or for the current test when `None`
    #[must_use]
    pub fn summary(&self, test_id: Option<&str>) -> SoftSummary {
        self.with_inner(|inner| {
            let id = test_id
                .map(str::to_string)
                .or_else(|| inner.current.clone());
            let record = id.and_then(|id| inner.tests.get(&id));
            let (total, failed) = record
                .map(|r| (r.assertion_count, r.failures.len()))
                .unwrap_or((0, 0));
            SoftSummary {
                total,
                passed: total - failed,
                failed,
            }
        })
    }

    /// Fail now if the current test has recorded failures
    pub fn assert_no_failures(&self) -> EsperarResult<()> {
        let failures = self.failures(None);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(EsperarError::SoftFailures {
                count: failures.len(),
                details: render_details(&failures),
            })
        }
    }

    /// End-of-test hook: a passing outcome with recorded failures flips to
    /// failed with the aggregate attached. The test's records are flushed
    /// either way.
    pub fn after_test(&self, meta: &TestMeta, outcome: &mut TestOutcome) {
        let failures = self.with_inner(|inner| {
            if inner.current.as_deref() == Some(meta.id.as_str()) {
                inner.current = None;
            }
            inner
                .tests
                .remove(&meta.id)
                .map(|r| r.failures)
                .unwrap_or_default()
        });
        if failures.is_empty() {
            return;
        }
        let aggregate = format!(
            "{} soft assertion failures\n{}",
            failures.len(),
            render_details(&failures)
        );
        debug!(test_id = %meta.id, count = failures.len(), "flushing soft failures");
        if outcome.passed {
            outcome.passed = false;
        }
        outcome.error = Some(match outcome.error.take() {
            Some(existing) => format!("{existing}\n{aggregate}"),
            None => aggregate,
        });
    }

    /// Drop every record and the current test. Test helper.
    pub fn reset(&self) {
        self.with_inner(|inner| {
            inner.current = None;
            inner.tests.clear();
        });
    }
}

fn render_details(failures: &[SoftFailure]) -> String {
    failures
        .iter()
        .enumerate()
        .map(|(i, f)| format!("  {}. [{}] {}", i + 1, f.matcher, f.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Mark a test as current in the global registry
pub fn set_current_test(meta: &TestMeta) {
    SoftRegistry::global().set_current_test(meta);
}

/// Clear the global registry's current test
pub fn clear_current_test() {
    SoftRegistry::global().clear_current_test();
}

/// Failures recorded in the global registry
#[must_use]
pub fn get_soft_failures(test_id: Option<&str>) -> Vec<SoftFailure> {
    SoftRegistry::global().failures(test_id)
}

/// Clear records in the global registry
pub fn clear_soft_failures(test_id: Option<&str>) {
    SoftRegistry::global().clear_failures(test_id);
}

/// Fail now if the global registry's current test has recorded failures
pub fn assert_soft_failures() -> EsperarResult<()> {
    SoftRegistry::global().assert_no_failures()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn meta(id: &str) -> TestMeta {
        TestMeta::new(id, format!("test {id}"))
    }

    mod lifecycle {
        use super::*;

        #[test]
        fn test_set_current_is_idempotent_for_same_id() {
            let registry = SoftRegistry::new();
            registry.set_current_test(&meta("t1"));
            registry.add_failure("toBeDisplayed", "first").unwrap();
            registry.set_current_test(&meta("t1"));
            assert_eq!(registry.failures(None).len(), 1);
        }

        #[test]
        fn test_clear_current_keeps_records() {
            let registry = SoftRegistry::new();
            registry.set_current_test(&meta("t1"));
            registry.add_failure("toHaveText", "boom").unwrap();
            registry.clear_current_test();
            assert_eq!(registry.failures(Some("t1")).len(), 1);
        }

        #[test]
        fn test_no_active_test_fails_fast() {
            let registry = SoftRegistry::new();
            let err = registry.add_failure("toExist", "boom").unwrap_err();
            assert!(matches!(err, EsperarError::NoActiveTest));
        }
    }

    mod isolation {
        use super::*;

        #[test]
        fn test_failures_isolated_per_test_id() {
            let registry = SoftRegistry::new();
            registry.set_current_test(&meta("t1"));
            registry.add_failure("toExist", "from t1").unwrap();
            registry.set_current_test(&meta("t2"));
            registry.add_failure("toExist", "from t2").unwrap();

            assert_eq!(registry.failures(Some("t1")).len(), 1);
            assert_eq!(registry.failures(Some("t2")).len(), 1);
            assert_eq!(registry.failures(Some("t1"))[0].message, "from t1");
        }

        #[test]
        fn test_clear_only_touches_one_id() {
            let registry = SoftRegistry::new();
            registry.set_current_test(&meta("t1"));
            registry.add_failure("toExist", "a").unwrap();
            registry.set_current_test(&meta("t2"));
            registry.add_failure("toExist", "b").unwrap();

            registry.clear_failures(Some("t1"));
            assert!(registry.failures(Some("t1")).is_empty());
            assert_eq!(registry.failures(Some("t2")).len(), 1);
        }
    }

    mod aggregation {
        use super::*;

        #[test]
        fn test_assert_no_failures_ok_when_clean() {
            let registry = SoftRegistry::new();
            registry.set_current_test(&meta("t1"));
            assert!(registry.assert_no_failures().is_ok());
        }

        #[test]
        fn test_aggregate_states_count_and_lists_failures() {
            let registry = SoftRegistry::new();
            registry.set_current_test(&meta("t1"));
            registry.add_failure("toBeDisplayed", "diff one").unwrap();
            registry.add_failure("toHaveText", "diff two").unwrap();

            let err = registry.assert_no_failures().unwrap_err();
            let text = err.to_string();
            assert!(text.starts_with("2 soft assertion failures"));
            assert!(text.contains("1. [toBeDisplayed] diff one"));
            assert!(text.contains("2. [toHaveText] diff two"));
        }

        #[test]
        fn test_concurrent_appends_lose_nothing() {
            let registry = std::sync::Arc::new(SoftRegistry::new());
            registry.set_current_test(&meta("t1"));

            let handles: Vec<_> = (0..3)
                .map(|i| {
                    let registry = std::sync::Arc::clone(&registry);
                    std::thread::spawn(move || {
                        registry
                            .add_failure("toBeDisplayed", format!("failure {i}"))
                            .unwrap();
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(registry.failures(Some("t1")).len(), 3);
        }
    }

    mod after_test {
        use super::*;

        #[test]
        fn test_flips_passed_outcome() {
            let registry = SoftRegistry::new();
            let test = meta("t1");
            registry.set_current_test(&test);
            registry.add_failure("toHaveTitle", "wrong title").unwrap();

            let mut outcome = TestOutcome::passed(Duration::from_millis(12));
            registry.after_test(&test, &mut outcome);

            assert!(!outcome.passed);
            let error = outcome.error.unwrap();
            assert!(error.starts_with("1 soft assertion failures"));
            assert!(error.contains("wrong title"));
        }

        #[test]
        fn test_keeps_existing_error_and_appends() {
            let registry = SoftRegistry::new();
            let test = meta("t1");
            registry.set_current_test(&test);
            registry.add_failure("toExist", "soft diff").unwrap();

            let mut outcome = TestOutcome {
                passed: false,
                error: Some("hard failure".to_string()),
                duration: Duration::ZERO,
            };
            registry.after_test(&test, &mut outcome);

            let error = outcome.error.unwrap();
            assert!(error.starts_with("hard failure"));
            assert!(error.contains("soft diff"));
        }

        #[test]
        fn test_flushes_records() {
            let registry = SoftRegistry::new();
            let test = meta("t1");
            registry.set_current_test(&test);
            registry.add_failure("toExist", "x").unwrap();

            let mut outcome = TestOutcome::passed(Duration::ZERO);
            registry.after_test(&test, &mut outcome);

            assert!(registry.failures(Some("t1")).is_empty());
            assert!(registry.current_test().is_none());
        }

        #[test]
        fn test_clean_test_left_untouched() {
            let registry = SoftRegistry::new();
            let test = meta("t1");
            registry.set_current_test(&test);

            let mut outcome = TestOutcome::passed(Duration::ZERO);
            registry.after_test(&test, &mut outcome);

            assert!(outcome.passed);
            assert!(outcome.error.is_none());
        }
    }

    mod summaries {
        use super::*;

        #[test]
        fn test_counts_passes_and_failures() {
            let registry = SoftRegistry::new();
            registry.set_current_test(&meta("t1"));
            registry.record_pass().unwrap();
            registry.record_pass().unwrap();
            registry.add_failure("toHaveText", "x").unwrap();

            let summary = registry.summary(None);
            assert_eq!(summary.total, 3);
            assert_eq!(summary.passed, 2);
            assert_eq!(summary.failed, 1);
        }
    }

    mod global_registry {
        use super::*;

        // Serializes tests touching the process-wide registry
        static GUARD: Mutex<()> = Mutex::new(());

        #[test]
        fn test_free_function_round_trip() {
            let _guard = GUARD.lock().unwrap();
            SoftRegistry::global().reset();

            let test = meta("global-1");
            set_current_test(&test);
            SoftRegistry::global()
                .add_failure("toBeEnabled", "still disabled")
                .unwrap();

            assert_eq!(get_soft_failures(None).len(), 1);
            assert!(assert_soft_failures().is_err());

            clear_soft_failures(None);
            clear_current_test();
            SoftRegistry::global().reset();
        }
    }
}
