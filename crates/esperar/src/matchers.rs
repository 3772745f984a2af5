//! Matcher engines.
//!
//! Each engine pairs one comparison shape (boolean condition, string value,
//! attribute/property, collection size, browser query, request ledger) with
//! the polling loop and the failure formatter. The public matcher methods on
//! [`crate::expect::Expect`] are thin wrappers choosing a verb, a command,
//! and an expected value.
//!
//! Collection subjects are unanimous: every element must satisfy the
//! comparison, and the failure diff marks only the divergent indexes. An
//! empty collection is its own failure, except under negation where it
//! passes vacuously.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::driver::BrowserOps;
use crate::element::{run_each, ElementCollection, ElementRef, Subject};
use crate::format;
use crate::matcher::MatcherResult;
use crate::network::RequestShape;
use crate::number_matcher::NumberMatcher;
use crate::options::ExpectOptions;
use crate::poll::{wait_until, Attempt};
use crate::result::{EsperarError, EsperarResult};
use crate::snapshot::{ElementSnapshot, SnapshotStore};

fn invalid_subject(verb: &str) -> EsperarError {
    EsperarError::InvalidOptions {
        message: format!("matcher \"{verb}\" does not apply to this subject"),
    }
}

fn fail_message(
    options: &ExpectOptions,
    label: &str,
    invert: bool,
    verb: &str,
    body: String,
) -> MatcherResult {
    let prefix = options.message.clone();
    let heading = format::heading(label, invert, verb);
    MatcherResult::fail(move || format::build_message(prefix.as_deref(), &heading, &body))
}

/// What one collection poll attempt observed
enum CollectionSeen<T> {
    Empty,
    Single(usize, T),
    All(Vec<T>),
}

/// Boolean condition over element subjects (`displayed`, `enabled`, ...).
pub(crate) fn condition_matcher(
    subject: &Subject,
    invert: bool,
    options: &ExpectOptions,
    verb: &str,
    command: impl Fn(&ElementRef) -> EsperarResult<bool>,
) -> EsperarResult<MatcherResult> {
    let config = options.poll_config();
    let label = subject.label();
    match subject {
        Subject::Element(element) => {
            let element = Arc::clone(element);
            let status = wait_until(
                || {
                    let satisfied = command(&element)?;
                    Ok(Attempt::new(satisfied, satisfied))
                },
                invert,
                &config,
            )?;
            if status.stopped_on(invert) {
                return Ok(MatcherResult::pass());
            }
            Ok(fail_message(
                options,
                &label,
                invert,
                verb,
                format::expected_received(&json!(true), &json!(status.value), invert),
            ))
        }
        Subject::Lazy(lazy) => {
            let lazy = lazy.clone();
            let status = wait_until(
                || {
                    let element = lazy.resolve()?;
                    let satisfied = command(&element)?;
                    Ok(Attempt::new(satisfied, satisfied))
                },
                invert,
                &config,
            )?;
            if status.stopped_on(invert) {
                return Ok(MatcherResult::pass());
            }
            Ok(fail_message(
                options,
                &label,
                invert,
                verb,
                format::expected_received(&json!(true), &json!(status.value), invert),
            ))
        }
        Subject::Collection(collection) => collection_poll(
            collection,
            invert,
            options,
            verb,
            json!(true),
            |e| command(e),
            |v| *v,
            |v| json!(v),
        ),
        _ => Err(invalid_subject(verb)),
    }
}

/// Generic collection poll: run `fetch` per element, require unanimity of
/// `matched`, and render per-index diffs with `render`.
#[allow(clippy::too_many_arguments)]
fn collection_poll<T: Clone + 'static>(
    collection: &ElementCollection,
    invert: bool,
    options: &ExpectOptions,
    verb: &str,
    expected_display: Value,
    fetch: impl Fn(&ElementRef) -> EsperarResult<T>,
    matched: impl Fn(&T) -> bool,
    render: impl Fn(&T) -> Value,
) -> EsperarResult<MatcherResult> {
    let config = options.poll_config();
    let label = collection.label();
    let at_index = options.at_index;
    let selector = collection.selector().to_string();

    let status = wait_until(
        || {
            let items = collection.items();
            if let Some(index) = at_index {
                let Some(element) = items.get(index).cloned() else {
                    return Err(EsperarError::IndexOutOfBounds {
                        selector: selector.clone(),
                        index,
                        length: items.len(),
                    });
                };
                let value = fetch(&element)?;
                let ok = matched(&value);
                return Ok(Attempt::new(ok, CollectionSeen::Single(index, value)));
            }
            if items.is_empty() {
                return Ok(Attempt::new(false, CollectionSeen::Empty));
            }
            let values = run_each(&items, |e| fetch(e))?;
            let all = values.iter().all(&matched);
            Ok(Attempt::new(all, CollectionSeen::All(values)))
        },
        invert,
        &config,
    )?;

    if status.stopped_on(invert) {
        return Ok(MatcherResult::pass());
    }

    let body = match status.value {
        CollectionSeen::Empty => format::empty_collection_body(),
        CollectionSeen::Single(index, value) => format!(
            "At index {index}:\n{}",
            format::expected_received(&expected_display, &render(&value), invert)
        ),
        CollectionSeen::All(values) => {
            let actuals: Vec<Value> = values.iter().map(&render).collect();
            let failing: Vec<bool> = values
                .iter()
                .map(|v| matched(v) == invert)
                .collect();
            format::collection_diff(&expected_display, &actuals, &failing, invert)
        }
    };
    Ok(fail_message(options, &label, invert, verb, body))
}

fn option_string_display(value: &Option<String>) -> Value {
    value.as_ref().map_or(Value::Null, |v| json!(v))
}

/// String comparison over element subjects (`getText`, attribute values,
/// CSS properties). `fetch` returns `None` when the underlying value is
/// absent; absent never matches.
pub(crate) fn string_matcher(
    subject: &Subject,
    invert: bool,
    options: &ExpectOptions,
    verb: &str,
    expected: &str,
    fetch: impl Fn(&ElementRef) -> EsperarResult<Option<String>>,
) -> EsperarResult<MatcherResult> {
    let config = options.poll_config();
    let label = subject.label();
    let expected_display = json!(expected);
    let normalize = |raw: Option<String>| raw.map(|v| options.normalize_actual(&v));
    let matched =
        |actual: &Option<String>| actual.as_deref().is_some_and(|a| options.text_matches(a, expected));

    match subject {
        Subject::Element(element) => {
            let element = Arc::clone(element);
            let status = wait_until(
                || {
                    let actual = normalize(fetch(&element)?);
                    Ok(Attempt::new(matched(&actual), actual))
                },
                invert,
                &config,
            )?;
            if status.stopped_on(invert) {
                return Ok(MatcherResult::pass());
            }
            Ok(fail_message(
                options,
                &label,
                invert,
                verb,
                format::expected_received(
                    &expected_display,
                    &option_string_display(&status.value),
                    invert,
                ),
            ))
        }
        Subject::Lazy(lazy) => {
            let lazy = lazy.clone();
            let status = wait_until(
                || {
                    let element = lazy.resolve()?;
                    let actual = normalize(fetch(&element)?);
                    Ok(Attempt::new(matched(&actual), actual))
                },
                invert,
                &config,
            )?;
            if status.stopped_on(invert) {
                return Ok(MatcherResult::pass());
            }
            Ok(fail_message(
                options,
                &label,
                invert,
                verb,
                format::expected_received(
                    &expected_display,
                    &option_string_display(&status.value),
                    invert,
                ),
            ))
        }
        Subject::Collection(collection) => collection_poll(
            collection,
            invert,
            options,
            verb,
            expected_display,
            |e| Ok(normalize(fetch(e)?)),
            matched,
            option_string_display,
        ),
        _ => Err(invalid_subject(verb)),
    }
}

/// DOM property comparison. `expected == None` asserts presence; a value
/// compares by JSON equality, except strings which honor the text options.
pub(crate) fn property_matcher(
    subject: &Subject,
    invert: bool,
    options: &ExpectOptions,
    name: &str,
    expected: Option<Value>,
) -> EsperarResult<MatcherResult> {
    let verb = format!("have property \"{name}\"");
    let Some(expected) = expected else {
        let name = name.to_string();
        return condition_matcher(subject, invert, options, &verb, move |e| {
            Ok(e.get_property(&name)?.is_some())
        });
    };

    let config = options.poll_config();
    let label = subject.label();
    let matched = |actual: &Option<Value>| match (actual, &expected) {
        (Some(Value::String(a)), Value::String(e)) => {
            options.text_matches(&options.normalize_actual(a), e)
        }
        (Some(a), e) => a == e,
        (None, _) => false,
    };
    let render = |actual: &Option<Value>| actual.clone().unwrap_or(Value::Null);

    match subject {
        Subject::Element(element) => {
            let element = Arc::clone(element);
            let status = wait_until(
                || {
                    let actual = element.get_property(name)?;
                    Ok(Attempt::new(matched(&actual), actual))
                },
                invert,
                &config,
            )?;
            if status.stopped_on(invert) {
                return Ok(MatcherResult::pass());
            }
            Ok(fail_message(
                options,
                &label,
                invert,
                &verb,
                format::expected_received(&expected, &render(&status.value), invert),
            ))
        }
        Subject::Lazy(lazy) => {
            let lazy = lazy.clone();
            let status = wait_until(
                || {
                    let element = lazy.resolve()?;
                    let actual = element.get_property(name)?;
                    Ok(Attempt::new(matched(&actual), actual))
                },
                invert,
                &config,
            )?;
            if status.stopped_on(invert) {
                return Ok(MatcherResult::pass());
            }
            Ok(fail_message(
                options,
                &label,
                invert,
                &verb,
                format::expected_received(&expected, &render(&status.value), invert),
            ))
        }
        Subject::Collection(collection) => collection_poll(
            collection,
            invert,
            options,
            &verb,
            expected.clone(),
            |e| e.get_property(name),
            matched,
            render,
        ),
        _ => Err(invalid_subject(&verb)),
    }
}

/// JSON equality over element subjects, for structured values like sizes.
pub(crate) fn json_matcher(
    subject: &Subject,
    invert: bool,
    options: &ExpectOptions,
    verb: &str,
    expected: Value,
    fetch: impl Fn(&ElementRef) -> EsperarResult<Value>,
) -> EsperarResult<MatcherResult> {
    let config = options.poll_config();
    let label = subject.label();
    let matched = |actual: &Value| actual == &expected;

    match subject {
        Subject::Element(element) => {
            let element = Arc::clone(element);
            let status = wait_until(
                || {
                    let actual = fetch(&element)?;
                    Ok(Attempt::new(matched(&actual), actual))
                },
                invert,
                &config,
            )?;
            if status.stopped_on(invert) {
                return Ok(MatcherResult::pass());
            }
            Ok(fail_message(
                options,
                &label,
                invert,
                verb,
                format::expected_received(&expected, &status.value, invert),
            ))
        }
        Subject::Lazy(lazy) => {
            let lazy = lazy.clone();
            let status = wait_until(
                || {
                    let element = lazy.resolve()?;
                    let actual = fetch(&element)?;
                    Ok(Attempt::new(matched(&actual), actual))
                },
                invert,
                &config,
            )?;
            if status.stopped_on(invert) {
                return Ok(MatcherResult::pass());
            }
            Ok(fail_message(
                options,
                &label,
                invert,
                verb,
                format::expected_received(&expected, &status.value, invert),
            ))
        }
        Subject::Collection(collection) => collection_poll(
            collection,
            invert,
            options,
            verb,
            expected.clone(),
            |e| fetch(e),
            matched,
            Clone::clone,
        ),
        _ => Err(invalid_subject(verb)),
    }
}

/// Collection size comparison. Refetches the originating query in place on
/// every attempt, so growth is observed through the shared storage.
pub(crate) fn array_size_matcher(
    subject: &Subject,
    invert: bool,
    options: &ExpectOptions,
    matcher: NumberMatcher,
) -> EsperarResult<MatcherResult> {
    let verb = format!("be elements array of size {matcher}");
    let Subject::Collection(collection) = subject else {
        return Err(invalid_subject(&verb));
    };
    let config = options.poll_config();
    let label = collection.label();

    let status = wait_until(
        || {
            collection.refetch_in_place()?;
            let len = collection.len();
            #[allow(clippy::cast_precision_loss)]
            let satisfied = matcher.equals(Some(len as f64));
            Ok(Attempt::new(satisfied, len))
        },
        invert,
        &config,
    )?;

    if status.stopped_on(invert) {
        return Ok(MatcherResult::pass());
    }
    let expected = serde_json::to_value(matcher).unwrap_or(Value::Null);
    Ok(fail_message(
        options,
        &label,
        invert,
        &verb,
        format::expected_received(&expected, &json!(status.value), invert),
    ))
}

/// Browser string query (`getTitle`, `getUrl`). Every remote target must
/// satisfy the comparison; each failing target contributes its own
/// formatted block.
pub(crate) fn browser_string_matcher(
    subject: &Subject,
    invert: bool,
    options: &ExpectOptions,
    verb: &str,
    expected: &str,
    fetch: impl Fn(&dyn BrowserOps) -> EsperarResult<Vec<String>>,
) -> EsperarResult<MatcherResult> {
    let Subject::Browser(browser) = subject else {
        return Err(invalid_subject(verb));
    };
    let config = options.poll_config();
    let label = subject.label();

    let status = wait_until(
        || {
            let values: Vec<String> = fetch(browser.as_ref())?
                .into_iter()
                .map(|v| options.normalize_actual(&v))
                .collect();
            let all = values.iter().all(|v| options.text_matches(v, expected));
            Ok(Attempt::new(all, values))
        },
        invert,
        &config,
    )?;

    if status.stopped_on(invert) {
        return Ok(MatcherResult::pass());
    }

    let blocks: Vec<String> = status
        .value
        .iter()
        .filter(|v| options.text_matches(v, expected) == invert)
        .map(|v| {
            format::build_message(
                None,
                &format::heading(&label, invert, verb),
                &format::expected_received(&json!(expected), &json!(v), invert),
            )
        })
        .collect();
    let prefix = options.message.clone();
    Ok(MatcherResult::fail(move || match &prefix {
        Some(prefix) => format!("{prefix}\n{}", blocks.join("\n\n")),
        None => blocks.join("\n\n"),
    }))
}

/// Total recorded call count against a [`NumberMatcher`].
pub(crate) fn requested_times_matcher(
    subject: &Subject,
    invert: bool,
    options: &ExpectOptions,
    matcher: NumberMatcher,
) -> EsperarResult<MatcherResult> {
    let verb = format!("be requested {matcher} times");
    let Subject::Network(mock) = subject else {
        return Err(invalid_subject(&verb));
    };
    let config = options.poll_config();
    let label = subject.label();

    let status = wait_until(
        || {
            let count = mock.call_count();
            #[allow(clippy::cast_precision_loss)]
            let satisfied = matcher.equals(Some(count as f64));
            Ok(Attempt::new(satisfied, count))
        },
        invert,
        &config,
    )?;

    if status.stopped_on(invert) {
        return Ok(MatcherResult::pass());
    }
    let expected = serde_json::to_value(matcher).unwrap_or(Value::Null);
    Ok(fail_message(
        options,
        &label,
        invert,
        &verb,
        format::expected_received(&expected, &json!(status.value), invert),
    ))
}

/// At least one recorded call matching a [`RequestShape`].
pub(crate) fn requested_with_matcher(
    subject: &Subject,
    invert: bool,
    options: &ExpectOptions,
    shape: &RequestShape,
) -> EsperarResult<MatcherResult> {
    let verb = format!("be requested with {}", shape.describe());
    let Subject::Network(mock) = subject else {
        return Err(invalid_subject(&verb));
    };
    let config = options.poll_config();
    let label = subject.label();

    let status = wait_until(
        || {
            let satisfied = mock.matching_count(shape) > 0;
            Ok(Attempt::new(satisfied, mock.calls()))
        },
        invert,
        &config,
    )?;

    if status.stopped_on(invert) {
        return Ok(MatcherResult::pass());
    }
    let expected = json!(shape.describe());
    let received = serde_json::to_value(&status.value).unwrap_or(Value::Null);
    Ok(fail_message(
        options,
        &label,
        invert,
        &verb,
        format::expected_received(&expected, &received, invert),
    ))
}

/// Compare the subject against a stored snapshot baseline. Not polled;
/// snapshot comparison observes one state.
pub(crate) fn snapshot_matcher(
    subject: &Subject,
    store: &SnapshotStore,
    name: &str,
) -> EsperarResult<MatcherResult> {
    let actual = match subject {
        Subject::Element(element) => {
            serde_json::to_value(ElementSnapshot::capture(element.as_ref())?)?
        }
        Subject::Lazy(lazy) => {
            let element = lazy.resolve()?;
            serde_json::to_value(ElementSnapshot::capture(element.as_ref())?)?
        }
        Subject::Value(value) => value.clone(),
        _ => return Err(invalid_subject("match snapshot")),
    };
    store.assert_matches(name, &actual)
}

/// Helper shared by network mocks: an unbounded count matcher
pub(crate) fn called_at_all() -> NumberMatcher {
    NumberMatcher::at_least(1.0)
}
