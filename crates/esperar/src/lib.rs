//! Esperar: polling assertions for browser-automation tests.
//!
//! Esperar (Spanish: "to wait/expect") is an expect/matcher library aware
//! of browser and element semantics: every matcher retries its comparison
//! until it holds or a wait budget elapses, negation threads into the retry
//! loop itself, and a soft mode collects failures per logical test instead
//! of stopping at the first one.
//!
//! # Example
//!
//! ```
//! use esperar::{expect_element, ExpectOptions, MockElement};
//!
//! let save = MockElement::new("#save").enabled([false, true]);
//! let options = ExpectOptions::new().with_wait(200).with_interval(10);
//! expect_element(save).to_be_enabled(&options)?;
//! # Ok::<(), esperar::EsperarError>(())
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod driver;
mod element;
mod expect;
mod format;
mod matcher;
mod matchers;
mod network;
mod number_matcher;
mod options;
mod poll;
mod result;
mod snapshot;
mod soft;

pub use driver::{BrowserOps, ElementOps, ElementSize, MockBrowser, MockElement};
pub use element::{
    run_each, ElementCollection, ElementRef, LazyElement, RefetchFn, Subject,
};
pub use expect::{expect, expect_browser, expect_element, expect_soft, Expect};
pub use format::{
    build_message, collection_diff, empty_collection_body, expected_received, format_value,
    heading,
};
pub use matcher::MatcherResult;
pub use network::{HttpMethod, NetworkMock, RecordedCall, RequestShape, UrlPattern};
pub use number_matcher::{symmetric_match, CountOperand, NumberMatcher};
pub use options::{
    AfterHook, AssertionContext, BeforeHook, ExpectOptions, ReplacePattern, ReplaceRule,
    Replacement,
};
pub use poll::{
    wait_until, Attempt, PollConfig, PollStatus, DEFAULT_INTERVAL_MS, DEFAULT_WAIT_MS,
};
pub use result::{EsperarError, EsperarResult};
pub use snapshot::{ElementSnapshot, SnapshotConfig, SnapshotStore};
pub use soft::{
    assert_soft_failures, clear_current_test, clear_soft_failures, get_soft_failures,
    set_current_test, SoftFailure, SoftRegistry, SoftSummary, TestMeta, TestOutcome,
};
