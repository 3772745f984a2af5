//! The expect surface.
//!
//! [`expect`] wraps a subject in an [`Expect`] carrying negation and
//! hard/soft mode; matcher methods pick an engine from [`crate::matchers`]
//! and dispatch the result. Hard mode returns the failure; soft mode records
//! it in the registry and returns `Ok`, so a test body keeps running.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::driver::{BrowserOps, ElementOps, ElementSize};
use crate::element::Subject;
use crate::matcher::MatcherResult;
use crate::matchers;
use crate::network::RequestShape;
use crate::number_matcher::NumberMatcher;
use crate::options::{AssertionContext, ExpectOptions};
use crate::result::{EsperarError, EsperarResult};
use crate::snapshot::SnapshotStore;
use crate::soft::SoftRegistry;

/// How a failed matcher is reported
#[derive(Clone)]
enum Mode {
    /// Return the failure immediately
    Hard,
    /// Record the failure and keep going
    Soft(Arc<SoftRegistry>),
}

/// An assertion in progress: subject plus negation and reporting mode
#[derive(Clone)]
pub struct Expect {
    subject: Subject,
    negated: bool,
    mode: Mode,
}

impl std::fmt::Debug for Expect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expect")
            .field("subject", &self.subject)
            .field("negated", &self.negated)
            .field("soft", &matches!(self.mode, Mode::Soft(_)))
            .finish()
    }
}

/// Start a hard assertion on a subject
pub fn expect(subject: impl Into<Subject>) -> Expect {
    Expect {
        subject: subject.into(),
        negated: false,
        mode: Mode::Hard,
    }
}

/// Start a soft assertion wired to the process-wide registry
pub fn expect_soft(subject: impl Into<Subject>) -> Expect {
    Expect {
        subject: subject.into(),
        negated: false,
        mode: Mode::Soft(SoftRegistry::global_arc()),
    }
}

/// Start a hard assertion on a single element
pub fn expect_element(element: impl ElementOps + 'static) -> Expect {
    expect(Subject::Element(Arc::new(element)))
}

/// Start a hard assertion on a browser session
pub fn expect_browser(browser: impl BrowserOps + 'static) -> Expect {
    expect(Subject::Browser(Arc::new(browser)))
}

impl Expect {
    /// Negate the next matcher
    #[must_use]
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Route failures into a specific registry instead of the global one
    #[must_use]
    pub fn soft_with(mut self, registry: Arc<SoftRegistry>) -> Self {
        self.mode = Mode::Soft(registry);
        self
    }

    fn matcher_name(&self, base: &str) -> String {
        if self.negated {
            format!("not.{base}")
        } else {
            base.to_string()
        }
    }

    /// Run one matcher invocation: fire hooks once, dispatch by mode.
    ///
    /// Soft mode records both failed comparisons and command failures; the
    /// only error that escapes a soft call is missing test context.
    fn run(
        &self,
        name: &str,
        options: &ExpectOptions,
        expected: Option<Value>,
        matcher: impl FnOnce() -> EsperarResult<MatcherResult>,
    ) -> EsperarResult<()> {
        let config = options.poll_config();
        let context = AssertionContext {
            matcher_name: self.matcher_name(name),
            expected,
            wait_ms: config.wait_ms,
            interval_ms: config.interval_ms,
        };
        if let Some(hook) = &options.before_assertion {
            hook(&context);
        }

        let outcome = matcher();

        match (&self.mode, outcome) {
            (Mode::Hard, Ok(result)) => {
                if let Some(hook) = &options.after_assertion {
                    hook(&context, &result);
                }
                result.into_result()
            }
            (Mode::Hard, Err(error)) => Err(error),
            (Mode::Soft(registry), Ok(result)) => {
                if let Some(hook) = &options.after_assertion {
                    hook(&context, &result);
                }
                if result.passed() {
                    registry.record_pass()
                } else {
                    registry.add_failure(&context.matcher_name, result.message())
                }
            }
            (Mode::Soft(registry), Err(error)) => {
                if error.is_command_failure() {
                    registry.add_failure(&context.matcher_name, error.to_string())
                } else {
                    Err(error)
                }
            }
        }
    }

    fn verb_with_containing(options: &ExpectOptions, verb: &str) -> String {
        if options.containing {
            format!("{verb} containing")
        } else {
            verb.to_string()
        }
    }

    /// Element is rendered and visible
    pub fn to_be_displayed(&self, options: &ExpectOptions) -> EsperarResult<()> {
        self.run("toBeDisplayed", options, None, || {
            matchers::condition_matcher(&self.subject, self.negated, options, "be displayed", |e| {
                e.is_displayed()
            })
        })
    }

    /// Element exists in the DOM
    pub fn to_exist(&self, options: &ExpectOptions) -> EsperarResult<()> {
        self.run("toExist", options, None, || {
            matchers::condition_matcher(&self.subject, self.negated, options, "exist", |e| {
                e.is_existing()
            })
        })
    }

    /// Element accepts interaction
    pub fn to_be_enabled(&self, options: &ExpectOptions) -> EsperarResult<()> {
        self.run("toBeEnabled", options, None, || {
            matchers::condition_matcher(&self.subject, self.negated, options, "be enabled", |e| {
                e.is_enabled()
            })
        })
    }

    /// Element refuses interaction
    pub fn to_be_disabled(&self, options: &ExpectOptions) -> EsperarResult<()> {
        self.run("toBeDisabled", options, None, || {
            matchers::condition_matcher(&self.subject, self.negated, options, "be disabled", |e| {
                Ok(!e.is_enabled()?)
            })
        })
    }

    /// Element is visible, enabled, and not obscured
    pub fn to_be_clickable(&self, options: &ExpectOptions) -> EsperarResult<()> {
        self.run("toBeClickable", options, None, || {
            matchers::condition_matcher(&self.subject, self.negated, options, "be clickable", |e| {
                e.is_clickable()
            })
        })
    }

    /// Element has keyboard focus
    pub fn to_be_focused(&self, options: &ExpectOptions) -> EsperarResult<()> {
        self.run("toBeFocused", options, None, || {
            matchers::condition_matcher(&self.subject, self.negated, options, "be focused", |e| {
                e.is_focused()
            })
        })
    }

    /// Element (option, checkbox, radio) is selected
    pub fn to_be_selected(&self, options: &ExpectOptions) -> EsperarResult<()> {
        self.run("toBeSelected", options, None, || {
            matchers::condition_matcher(&self.subject, self.negated, options, "be selected", |e| {
                e.is_selected()
            })
        })
    }

    /// Element text equals (or contains, per options) the expected string
    pub fn to_have_text(&self, expected: &str, options: &ExpectOptions) -> EsperarResult<()> {
        let verb = Self::verb_with_containing(options, "have text");
        self.run("toHaveText", options, Some(json!(expected)), || {
            matchers::string_matcher(&self.subject, self.negated, options, &verb, expected, |e| {
                e.get_text().map(Some)
            })
        })
    }

    /// Attribute is present (`value == None`) or has the expected value
    pub fn to_have_attribute(
        &self,
        name: &str,
        value: Option<&str>,
        options: &ExpectOptions,
    ) -> EsperarResult<()> {
        let base = format!("have attribute \"{name}\"");
        match value {
            None => self.run("toHaveAttribute", options, Some(json!(name)), || {
                matchers::condition_matcher(&self.subject, self.negated, options, &base, |e| {
                    Ok(e.get_attribute(name)?.is_some())
                })
            }),
            Some(expected) => {
                let verb = Self::verb_with_containing(options, &base);
                self.run("toHaveAttribute", options, Some(json!(expected)), || {
                    matchers::string_matcher(
                        &self.subject,
                        self.negated,
                        options,
                        &verb,
                        expected,
                        |e| e.get_attribute(name),
                    )
                })
            }
        }
    }

    /// DOM property is present (`value == None`) or equals the expected value
    pub fn to_have_property(
        &self,
        name: &str,
        value: Option<Value>,
        options: &ExpectOptions,
    ) -> EsperarResult<()> {
        self.run("toHaveProperty", options, value.clone(), || {
            matchers::property_matcher(&self.subject, self.negated, options, name, value.clone())
        })
    }

    /// Computed CSS property has the expected value
    pub fn to_have_style(
        &self,
        name: &str,
        expected: &str,
        options: &ExpectOptions,
    ) -> EsperarResult<()> {
        let verb = format!("have style \"{name}\"");
        self.run("toHaveStyle", options, Some(json!(expected)), || {
            matchers::string_matcher(&self.subject, self.negated, options, &verb, expected, |e| {
                e.get_css_property(name)
            })
        })
    }

    /// Accessible name equals the expected string
    pub fn to_have_computed_label(
        &self,
        expected: &str,
        options: &ExpectOptions,
    ) -> EsperarResult<()> {
        let verb = Self::verb_with_containing(options, "have computed label");
        self.run("toHaveComputedLabel", options, Some(json!(expected)), || {
            matchers::string_matcher(&self.subject, self.negated, options, &verb, expected, |e| {
                e.get_computed_label().map(Some)
            })
        })
    }

    /// Accessible role equals the expected string
    pub fn to_have_computed_role(
        &self,
        expected: &str,
        options: &ExpectOptions,
    ) -> EsperarResult<()> {
        self.run("toHaveComputedRole", options, Some(json!(expected)), || {
            matchers::string_matcher(
                &self.subject,
                self.negated,
                options,
                "have computed role",
                expected,
                |e| e.get_computed_role().map(Some),
            )
        })
    }

    /// Outer HTML equals (or contains, per options) the expected string
    pub fn to_have_html(&self, expected: &str, options: &ExpectOptions) -> EsperarResult<()> {
        let verb = Self::verb_with_containing(options, "have HTML");
        self.run("toHaveHTML", options, Some(json!(expected)), || {
            matchers::string_matcher(&self.subject, self.negated, options, &verb, expected, |e| {
                e.get_html().map(Some)
            })
        })
    }

    /// Rendered size equals the expected size
    pub fn to_have_size(&self, expected: ElementSize, options: &ExpectOptions) -> EsperarResult<()> {
        let expected_json = json!({"width": expected.width, "height": expected.height});
        self.run("toHaveSize", options, Some(expected_json.clone()), || {
            matchers::json_matcher(
                &self.subject,
                self.negated,
                options,
                "have size",
                expected_json.clone(),
                |e| {
                    let size = e.get_size()?;
                    Ok(json!({"width": size.width, "height": size.height}))
                },
            )
        })
    }

    /// Collection length satisfies the matcher, refetching the query while
    /// polling
    pub fn to_be_elements_array_of_size(
        &self,
        size: impl Into<NumberMatcher>,
        options: &ExpectOptions,
    ) -> EsperarResult<()> {
        let matcher = size.into();
        let expected = serde_json::to_value(matcher).ok();
        self.run("toBeElementsArrayOfSize", options, expected, || {
            matchers::array_size_matcher(&self.subject, self.negated, options, matcher)
        })
    }

    /// Page title equals (or contains, per options) the expected string
    pub fn to_have_title(&self, expected: &str, options: &ExpectOptions) -> EsperarResult<()> {
        let verb = Self::verb_with_containing(options, "have title");
        self.run("toHaveTitle", options, Some(json!(expected)), || {
            matchers::browser_string_matcher(
                &self.subject,
                self.negated,
                options,
                &verb,
                expected,
                |b| b.get_title(),
            )
        })
    }

    /// Page URL equals (or contains, per options) the expected string
    pub fn to_have_url(&self, expected: &str, options: &ExpectOptions) -> EsperarResult<()> {
        let verb = Self::verb_with_containing(options, "have url");
        self.run("toHaveUrl", options, Some(json!(expected)), || {
            matchers::browser_string_matcher(
                &self.subject,
                self.negated,
                options,
                &verb,
                expected,
                |b| b.get_url(),
            )
        })
    }

    /// Mock has recorded at least one call
    pub fn to_be_requested(&self, options: &ExpectOptions) -> EsperarResult<()> {
        self.run("toBeRequested", options, None, || {
            matchers::requested_times_matcher(
                &self.subject,
                self.negated,
                options,
                matchers::called_at_all(),
            )
        })
    }

    /// Mock call count satisfies the matcher
    pub fn to_be_requested_times(
        &self,
        times: impl Into<NumberMatcher>,
        options: &ExpectOptions,
    ) -> EsperarResult<()> {
        let matcher = times.into();
        let expected = serde_json::to_value(matcher).ok();
        self.run("toBeRequestedTimes", options, expected, || {
            matchers::requested_times_matcher(&self.subject, self.negated, options, matcher)
        })
    }

    /// Mock has recorded a call matching the shape
    pub fn to_be_requested_with(
        &self,
        shape: &RequestShape,
        options: &ExpectOptions,
    ) -> EsperarResult<()> {
        self.run(
            "toBeRequestedWith",
            options,
            Some(json!(shape.describe())),
            || matchers::requested_with_matcher(&self.subject, self.negated, options, shape),
        )
    }

    /// Serialized subject state matches a stored baseline. Negation does
    /// not apply; snapshots compare one observed state.
    pub fn to_match_snapshot(
        &self,
        store: &SnapshotStore,
        name: &str,
        options: &ExpectOptions,
    ) -> EsperarResult<()> {
        self.run("toMatchSnapshot", options, Some(json!(name)), || {
            matchers::snapshot_matcher(&self.subject, store, name)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::driver::{MockBrowser, MockElement};
    use crate::soft::TestMeta;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn once() -> ExpectOptions {
        ExpectOptions::new().with_wait(0)
    }

    fn fast() -> ExpectOptions {
        ExpectOptions::new().with_wait(200).with_interval(10)
    }

    mod hard_mode {
        use super::*;

        #[test]
        fn test_pass_returns_ok() {
            let result = expect_element(MockElement::new("#ok")).to_be_displayed(&once());
            assert!(result.is_ok());
        }

        #[test]
        fn test_failure_is_assertion_error() {
            let err = expect_element(MockElement::new("#hidden").displayed([false]))
                .to_be_displayed(&once())
                .unwrap_err();
            assert!(matches!(err, EsperarError::AssertionFailed { .. }));
            assert!(err.to_string().contains("to be displayed"));
        }

        #[test]
        fn test_not_inverts() {
            let element = MockElement::new("#hidden").displayed([false]);
            assert!(expect_element(element).not().to_be_displayed(&once()).is_ok());
        }

        #[test]
        fn test_double_not_cancels() {
            let element = MockElement::new("#shown");
            assert!(expect_element(element)
                .not()
                .not()
                .to_be_displayed(&once())
                .is_ok());
        }

        #[test]
        fn test_command_error_propagates() {
            let err = expect_element(MockElement::missing("#gone"))
                .to_have_text("x", &once())
                .unwrap_err();
            assert!(err.is_command_failure());
        }

        #[test]
        fn test_disabled_then_enabled_retries() {
            let result = expect_element(MockElement::new("#submit").enabled([false, true]))
                .to_be_enabled(&fast());
            assert!(result.is_ok());
        }

        #[test]
        fn test_browser_title() {
            let err = expect_browser(MockBrowser::single("Wrong", "https://x.com"))
                .to_have_title("Expected", &once())
                .unwrap_err();
            assert_eq!(
                err.to_string(),
                "Expect window to have title\n\nExpected: \"Expected\"\nReceived: \"Wrong\""
            );
        }
    }

    mod hooks {
        use super::*;

        #[test]
        fn test_before_and_after_fire_once_despite_polling() {
            let before = Arc::new(AtomicUsize::new(0));
            let after = Arc::new(AtomicUsize::new(0));
            let b = Arc::clone(&before);
            let a = Arc::clone(&after);

            let options = fast()
                .on_before(move |_| {
                    b.fetch_add(1, Ordering::SeqCst);
                })
                .on_after(move |_, _| {
                    a.fetch_add(1, Ordering::SeqCst);
                });

            // Three poll attempts, one invocation
            let element = MockElement::new("#slow").enabled([false, false, true]);
            expect_element(element).to_be_enabled(&options).unwrap();

            assert_eq!(before.load(Ordering::SeqCst), 1);
            assert_eq!(after.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn test_context_names_negated_matcher() {
            let seen = Arc::new(std::sync::Mutex::new(String::new()));
            let sink = Arc::clone(&seen);
            let options = once().on_before(move |ctx| {
                if let Ok(mut name) = sink.lock() {
                    *name = ctx.matcher_name.clone();
                }
            });

            let element = MockElement::new("#x").displayed([false]);
            expect_element(element).not().to_be_displayed(&options).unwrap();

            assert_eq!(*seen.lock().unwrap(), "not.toBeDisplayed");
        }
    }

    mod soft_mode {
        use super::*;

        fn soft_registry() -> Arc<SoftRegistry> {
            let registry = Arc::new(SoftRegistry::new());
            registry.set_current_test(&TestMeta::new("t1", "soft test"));
            registry
        }

        #[test]
        fn test_failure_recorded_not_returned() {
            let registry = soft_registry();
            let element = MockElement::new("#hidden").displayed([false]);

            let result = expect(Subject::Element(Arc::new(element)))
                .soft_with(Arc::clone(&registry))
                .to_be_displayed(&once());

            assert!(result.is_ok());
            let failures = registry.failures(None);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].matcher, "toBeDisplayed");
            assert!(failures[0].message.contains("to be displayed"));
        }

        #[test]
        fn test_command_error_recorded() {
            let registry = soft_registry();
            let element = MockElement::missing("#gone");

            let result = expect(Subject::Element(Arc::new(element)))
                .soft_with(Arc::clone(&registry))
                .to_have_text("x", &once());

            assert!(result.is_ok());
            let failures = registry.failures(None);
            assert_eq!(failures.len(), 1);
            assert!(failures[0].message.contains("wasn't found"));
        }

        #[test]
        fn test_no_active_test_escapes() {
            let registry = Arc::new(SoftRegistry::new());
            let element = MockElement::new("#x").displayed([false]);

            let err = expect(Subject::Element(Arc::new(element)))
                .soft_with(registry)
                .to_be_displayed(&once())
                .unwrap_err();
            assert!(matches!(err, EsperarError::NoActiveTest));
        }

        #[test]
        fn test_passes_count_toward_summary() {
            let registry = soft_registry();
            let shown = MockElement::new("#shown");
            let hidden = MockElement::new("#hidden").displayed([false]);

            expect(Subject::Element(Arc::new(shown)))
                .soft_with(Arc::clone(&registry))
                .to_be_displayed(&once())
                .unwrap();
            expect(Subject::Element(Arc::new(hidden)))
                .soft_with(Arc::clone(&registry))
                .to_be_displayed(&once())
                .unwrap();

            let summary = registry.summary(None);
            assert_eq!(summary.total, 2);
            assert_eq!(summary.failed, 1);
        }

        #[test]
        fn test_aggregate_after_multiple_failures() {
            let registry = soft_registry();
            for selector in ["#a", "#b", "#c"] {
                let element = MockElement::new(selector).displayed([false]);
                expect(Subject::Element(Arc::new(element)))
                    .soft_with(Arc::clone(&registry))
                    .to_be_displayed(&once())
                    .unwrap();
            }

            let err = registry.assert_no_failures().unwrap_err();
            assert!(err.to_string().starts_with("3 soft assertion failures"));
        }
    }
}
