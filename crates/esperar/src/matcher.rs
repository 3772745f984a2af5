//! The uniform matcher result contract.
//!
//! Every matcher produces a [`MatcherResult`] with a pass flag and a lazily
//! computed message. Diff formatting is costly and depends on actual/expected
//! snapshots captured at call time, so the message closure is only evaluated
//! on the failure path.

use crate::result::{EsperarError, EsperarResult};

type MessageFn = Box<dyn Fn() -> String + Send + Sync>;

/// Result of a matcher invocation
pub struct MatcherResult {
    pass: bool,
    message: MessageFn,
}

impl MatcherResult {
    /// Create a result with a lazy message
    #[must_use]
    pub fn new(pass: bool, message: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            pass,
            message: Box::new(message),
        }
    }

    /// Create a passing result
    #[must_use]
    pub fn pass() -> Self {
        Self::new(true, String::new)
    }

    /// Create a failing result with a lazy message
    #[must_use]
    pub fn fail(message: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self::new(false, message)
    }

    /// Whether the matcher passed
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.pass
    }

    /// Evaluate the message closure
    #[must_use]
    pub fn message(&self) -> String {
        (self.message)()
    }

    /// Convert into a hard-assertion outcome: `Err` with the formatted
    /// message on failure, `Ok(())` on pass.
    pub fn into_result(self) -> EsperarResult<()> {
        if self.pass {
            Ok(())
        } else {
            Err(EsperarError::AssertionFailed {
                message: self.message(),
            })
        }
    }
}

impl std::fmt::Debug for MatcherResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatcherResult")
            .field("pass", &self.pass)
            .finish_non_exhaustive()
    }
}
