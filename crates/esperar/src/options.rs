//! Matcher options.
//!
//! Every matcher accepts an optional trailing [`ExpectOptions`]: polling
//! budget, a custom message prefix, string-comparison modifiers, ordered
//! replace rules applied to the actual value, and before/after hooks fired
//! exactly once per top-level matcher invocation (never per poll attempt).

use std::sync::Arc;

use regex::Regex;

use crate::matcher::MatcherResult;
use crate::poll::{PollConfig, DEFAULT_INTERVAL_MS, DEFAULT_WAIT_MS};
use crate::result::{EsperarError, EsperarResult};

/// Context handed to the before/after assertion hooks
#[derive(Debug, Clone)]
pub struct AssertionContext {
    /// Name of the matcher being invoked (prefixed `not.` when negated)
    pub matcher_name: String,
    /// Expected value, rendered as JSON where one exists
    pub expected: Option<serde_json::Value>,
    /// Wait budget in effect
    pub wait_ms: u64,
    /// Interval in effect
    pub interval_ms: u64,
}

/// Hook invoked before a matcher runs
pub type BeforeHook = Arc<dyn Fn(&AssertionContext) + Send + Sync>;

/// Hook invoked after a matcher produced its result
pub type AfterHook = Arc<dyn Fn(&AssertionContext, &MatcherResult) + Send + Sync>;

/// Pattern side of a replace rule
#[derive(Debug, Clone)]
pub enum ReplacePattern {
    /// Literal substring match
    Literal(String),
    /// Regular-expression match
    Pattern(Regex),
}

/// Replacement side of a replace rule
#[derive(Clone)]
pub enum Replacement {
    /// Literal replacement text
    Literal(String),
    /// Transform function receiving the matched text
    Transform(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl std::fmt::Debug for Replacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            Self::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

/// One ordered pattern → replacement rule applied to the actual value
/// before comparison and before display
#[derive(Debug, Clone)]
pub struct ReplaceRule {
    pattern: ReplacePattern,
    replacement: Replacement,
}

impl ReplaceRule {
    /// Replace every occurrence of a literal substring
    #[must_use]
    pub fn literal(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: ReplacePattern::Literal(pattern.into()),
            replacement: Replacement::Literal(replacement.into()),
        }
    }

    /// Replace every regex match with literal text
    pub fn pattern(pattern: &str, replacement: impl Into<String>) -> EsperarResult<Self> {
        let re = Regex::new(pattern).map_err(|e| EsperarError::InvalidOptions {
            message: format!("invalid replace pattern {pattern:?}: {e}"),
        })?;
        Ok(Self {
            pattern: ReplacePattern::Pattern(re),
            replacement: Replacement::Literal(replacement.into()),
        })
    }

    /// Replace every regex match through a transform function
    pub fn transform(
        pattern: &str,
        f: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> EsperarResult<Self> {
        let re = Regex::new(pattern).map_err(|e| EsperarError::InvalidOptions {
            message: format!("invalid replace pattern {pattern:?}: {e}"),
        })?;
        Ok(Self {
            pattern: ReplacePattern::Pattern(re),
            replacement: Replacement::Transform(Arc::new(f)),
        })
    }

    /// Apply this rule to an input string
    #[must_use]
    pub fn apply(&self, input: &str) -> String {
        match (&self.pattern, &self.replacement) {
            (ReplacePattern::Literal(pat), Replacement::Literal(rep)) => input.replace(pat, rep),
            (ReplacePattern::Literal(pat), Replacement::Transform(f)) => {
                input.replace(pat, &f(pat))
            }
            (ReplacePattern::Pattern(re), Replacement::Literal(rep)) => {
                re.replace_all(input, rep.as_str()).into_owned()
            }
            (ReplacePattern::Pattern(re), Replacement::Transform(f)) => re
                .replace_all(input, |caps: &regex::Captures<'_>| f(&caps[0]))
                .into_owned(),
        }
    }
}

/// Options recognized by every matcher
#[derive(Clone, Default)]
pub struct ExpectOptions {
    /// Wait budget in milliseconds; `Some(0)` means exactly one attempt
    pub wait: Option<u64>,
    /// Interval between poll attempts in milliseconds
    pub interval: Option<u64>,
    /// Custom prefix line prepended verbatim to the failure message
    pub message: Option<String>,
    /// Case-insensitive string comparison
    pub ignore_case: bool,
    /// Trim the actual value before comparison
    pub trim: bool,
    /// Substring containment instead of equality
    pub containing: bool,
    /// Match only at the start of the actual value
    pub at_start: bool,
    /// Match only at the end of the actual value
    pub at_end: bool,
    /// Match only at this index within a collection subject
    pub at_index: Option<usize>,
    /// Ordered replace rules applied to the actual value
    pub replace: Vec<ReplaceRule>,
    /// Hook fired once before the matcher runs
    pub before_assertion: Option<BeforeHook>,
    /// Hook fired once after the matcher produced its result
    pub after_assertion: Option<AfterHook>,
}

impl std::fmt::Debug for ExpectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpectOptions")
            .field("wait", &self.wait)
            .field("interval", &self.interval)
            .field("message", &self.message)
            .field("ignore_case", &self.ignore_case)
            .field("trim", &self.trim)
            .field("containing", &self.containing)
            .field("at_start", &self.at_start)
            .field("at_end", &self.at_end)
            .field("at_index", &self.at_index)
            .finish_non_exhaustive()
    }
}

impl ExpectOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wait budget in milliseconds
    #[must_use]
    pub const fn with_wait(mut self, wait_ms: u64) -> Self {
        self.wait = Some(wait_ms);
        self
    }

    /// Set the poll interval in milliseconds
    #[must_use]
    pub const fn with_interval(mut self, interval_ms: u64) -> Self {
        self.interval = Some(interval_ms);
        self
    }

    /// Set a custom message prefix
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Enable case-insensitive comparison
    #[must_use]
    pub const fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    /// Trim the actual value before comparison
    #[must_use]
    pub const fn trimmed(mut self) -> Self {
        self.trim = true;
        self
    }

    /// Substring containment instead of equality
    #[must_use]
    pub const fn containing(mut self) -> Self {
        self.containing = true;
        self
    }

    /// Match at the start of the actual value
    #[must_use]
    pub const fn at_start(mut self) -> Self {
        self.at_start = true;
        self
    }

    /// Match at the end of the actual value
    #[must_use]
    pub const fn at_end(mut self) -> Self {
        self.at_end = true;
        self
    }

    /// Restrict a collection assertion to one index
    #[must_use]
    pub const fn at_index(mut self, index: usize) -> Self {
        self.at_index = Some(index);
        self
    }

    /// Append a replace rule
    #[must_use]
    pub fn with_replace(mut self, rule: ReplaceRule) -> Self {
        self.replace.push(rule);
        self
    }

    /// Set the before-assertion hook
    #[must_use]
    pub fn on_before(mut self, hook: impl Fn(&AssertionContext) + Send + Sync + 'static) -> Self {
        self.before_assertion = Some(Arc::new(hook));
        self
    }

    /// Set the after-assertion hook
    #[must_use]
    pub fn on_after(
        mut self,
        hook: impl Fn(&AssertionContext, &MatcherResult) + Send + Sync + 'static,
    ) -> Self {
        self.after_assertion = Some(Arc::new(hook));
        self
    }

    /// Polling budget for this invocation
    #[must_use]
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            wait_ms: self.wait.unwrap_or(DEFAULT_WAIT_MS),
            interval_ms: self.interval.unwrap_or(DEFAULT_INTERVAL_MS),
        }
    }

    /// Apply replace rules and trimming to an actual value. Used both for
    /// comparison and for display, so failure messages show what was
    /// compared.
    #[must_use]
    pub fn normalize_actual(&self, actual: &str) -> String {
        let mut value = self
            .replace
            .iter()
            .fold(actual.to_string(), |acc, rule| rule.apply(&acc));
        if self.trim {
            value = value.trim().to_string();
        }
        value
    }

    /// Compare a normalized actual value against an expected string,
    /// honoring `ignore_case`, `containing`, `at_start`, and `at_end`.
    #[must_use]
    pub fn text_matches(&self, actual: &str, expected: &str) -> bool {
        let (actual, expected) = if self.ignore_case {
            (actual.to_lowercase(), expected.to_lowercase())
        } else {
            (actual.to_string(), expected.to_string())
        };

        if self.at_start {
            actual.starts_with(&expected)
        } else if self.at_end {
            actual.ends_with(&expected)
        } else if self.containing {
            actual.contains(&expected)
        } else {
            actual == expected
        }
    }
}
