//! Failure-message formatting.
//!
//! Builds the human-readable block a failed matcher reports: an
//! `Expect <subject> [not ]to <verb …>` heading, an `Expected:`/`Received:`
//! body, per-index diffs for collection subjects, and JSON-ish value
//! rendering with truncation for very large payloads.

use serde_json::Value;

/// Items rendered before an array/object is truncated
const MAX_RENDER_ITEMS: usize = 16;

/// Render a JSON value for display: strings quoted, arrays and objects
/// capped at [`MAX_RENDER_ITEMS`] entries with a `... N more items` tail.
#[must_use]
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Array(items) if items.len() > MAX_RENDER_ITEMS => {
            let shown: Vec<String> = items[..MAX_RENDER_ITEMS].iter().map(format_value).collect();
            format!(
                "[{}, ... {} more items]",
                shown.join(", "),
                items.len() - MAX_RENDER_ITEMS
            )
        }
        Value::Array(items) => {
            let shown: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", shown.join(", "))
        }
        Value::Object(map) if map.len() > MAX_RENDER_ITEMS => {
            let shown: Vec<String> = map
                .iter()
                .take(MAX_RENDER_ITEMS)
                .map(|(k, v)| format!("{k:?}: {}", format_value(v)))
                .collect();
            format!(
                "{{{}, ... {} more items}}",
                shown.join(", "),
                map.len() - MAX_RENDER_ITEMS
            )
        }
        Value::Object(map) => {
            let shown: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k:?}: {}", format_value(v)))
                .collect();
            format!("{{{}}}", shown.join(", "))
        }
        // String, number, bool, null all render via their JSON form
        // ("undefined"-like inputs arrive as null).
        other => other.to_string(),
    }
}

/// Build the heading line: `Expect <subject> [not ]to <verb phrase>`.
/// `containing` is the caller's concern; it arrives folded into the verb
/// phrase (e.g. `have text containing`).
#[must_use]
pub fn heading(subject_label: &str, is_not: bool, verb_phrase: &str) -> String {
    let negation = if is_not { "not " } else { "" };
    format!("Expect {subject_label} {negation}to {verb_phrase}")
}

/// Build the `Expected`/`Received` body for a single subject.
///
/// The negated framing shows the unwanted value on both lines with aligned
/// columns: the "failure" of a negated assertion is defined as "value still
/// equals the thing we didn't want", so the alignment is cosmetic, not a
/// semantic diff.
#[must_use]
pub fn expected_received(expected: &Value, actual: &Value, is_not: bool) -> String {
    if is_not {
        format!(
            "Expected [not]: {}\nReceived      : {}",
            format_value(expected),
            format_value(actual)
        )
    } else {
        format!(
            "Expected: {}\nReceived: {}",
            format_value(expected),
            format_value(actual)
        )
    }
}

/// Build a per-index body for a collection subject. Each index is compared
/// independently; only divergent indexes carry the `✗` marker so a partially
/// failing collection is not rewritten wholesale.
#[must_use]
pub fn collection_diff(expected: &Value, actuals: &[Value], failing: &[bool], is_not: bool) -> String {
    let label = if is_not { "Expected [not]" } else { "Expected" };
    let mut out = format!("{label}: {}\nReceived:", format_value(expected));
    for (index, actual) in actuals.iter().enumerate() {
        let marker = if failing.get(index).copied().unwrap_or(false) {
            " ✗"
        } else {
            ""
        };
        out.push_str(&format!("\n  [{index}]: {}{marker}", format_value(actual)));
    }
    out
}

/// Body used when a collection subject resolved to no elements at all.
/// Distinct from the "all indexes failed" case.
#[must_use]
pub fn empty_collection_body() -> String {
    "Expected: at least one result\nReceived: []".to_string()
}

/// Assemble the final message: optional custom prefix line, heading, blank
/// line, body.
#[must_use]
pub fn build_message(prefix: Option<&str>, heading: &str, body: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}\n{heading}\n\n{body}"),
        None => format!("{heading}\n\n{body}"),
    }
}
