//! Driver capability traits and in-crate mocks.
//!
//! Matchers never talk to a real browser. They consume two narrow traits,
//! [`ElementOps`] and [`BrowserOps`], implemented by whatever automation
//! backend the caller uses. [`MockElement`] and [`MockBrowser`] implement
//! them with scripted per-call results so matcher wiring can be tested
//! without a browser.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::result::{EsperarError, EsperarResult};

/// Rendered size of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSize {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

impl ElementSize {
    /// Create a size
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Per-element commands matchers poll against.
///
/// Every method is fallible. A backend whose element has gone stale reports
/// [`EsperarError::ElementNotFound`]; the polling engine treats that as a
/// hard failure and does not retry it.
pub trait ElementOps: std::fmt::Debug + Send + Sync {
    /// Selector this element was located with
    fn selector(&self) -> &str;

    /// Whether the element is rendered and visible
    fn is_displayed(&self) -> EsperarResult<bool>;

    /// Whether the element exists in the DOM
    fn is_existing(&self) -> EsperarResult<bool>;

    /// Whether the element accepts interaction
    fn is_enabled(&self) -> EsperarResult<bool>;

    /// Whether the element is visible, enabled, and not obscured
    fn is_clickable(&self) -> EsperarResult<bool>;

    /// Whether the element has keyboard focus
    fn is_focused(&self) -> EsperarResult<bool>;

    /// Whether the element (option, checkbox, radio) is selected
    fn is_selected(&self) -> EsperarResult<bool>;

    /// Visible text content
    fn get_text(&self) -> EsperarResult<String>;

    /// HTML attribute value, `None` when absent
    fn get_attribute(&self, name: &str) -> EsperarResult<Option<String>>;

    /// DOM property value, `None` when absent
    fn get_property(&self, name: &str) -> EsperarResult<Option<serde_json::Value>>;

    /// Computed CSS property value, `None` when absent
    fn get_css_property(&self, name: &str) -> EsperarResult<Option<String>>;

    /// Rendered size
    fn get_size(&self) -> EsperarResult<ElementSize>;

    /// Accessible name
    fn get_computed_label(&self) -> EsperarResult<String>;

    /// Accessible role
    fn get_computed_role(&self) -> EsperarResult<String>;

    /// Tag name, lowercased
    fn get_tag_name(&self) -> EsperarResult<String>;

    /// Outer HTML
    fn get_html(&self) -> EsperarResult<String>;
}

/// Browser-level queries. Each returns one value per remote target; a
/// single-browser session returns a one-element vector.
pub trait BrowserOps: Send + Sync {
    /// Current page title, per target
    fn get_title(&self) -> EsperarResult<Vec<String>>;

    /// Current URL, per target
    fn get_url(&self) -> EsperarResult<Vec<String>>;
}

/// Scripted sequence of per-call results. The last value repeats forever,
/// so a script of `[false, true]` answers `false` once and `true` from then
/// on.
#[derive(Debug, Clone)]
struct Script<T> {
    queue: VecDeque<T>,
}

impl<T: Clone> Script<T> {
    fn constant(value: T) -> Self {
        Self {
            queue: VecDeque::from(vec![value]),
        }
    }

    fn sequence(values: impl IntoIterator<Item = T>) -> Self {
        Self {
            queue: values.into_iter().collect(),
        }
    }

    /// Advance the script by one call
    fn next(&mut self) -> Option<T> {
        if self.queue.len() > 1 {
            self.queue.pop_front()
        } else {
            self.queue.front().cloned()
        }
    }

    /// Current value without consuming a step
    fn peek(&self) -> Option<T> {
        self.queue.front().cloned()
    }
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }
}

#[derive(Debug, Default)]
struct MockElementState {
    existing: Script<bool>,
    displayed: Script<bool>,
    enabled: Script<bool>,
    clickable: Script<bool>,
    focused: Script<bool>,
    selected: Script<bool>,
    text: Script<String>,
    attributes: HashMap<String, String>,
    properties: HashMap<String, serde_json::Value>,
    css: HashMap<String, String>,
    size: Option<ElementSize>,
    computed_label: String,
    computed_role: String,
    tag_name: String,
    html: String,
    call_history: Vec<String>,
}

/// Mock element with scripted command results.
///
/// Boolean commands and `getText` consume one script step per call, so a
/// test can model state that changes while a matcher polls. Value commands
/// on an element currently scripted as non-existing fail with
/// [`EsperarError::ElementNotFound`], matching what a real backend reports.
pub struct MockElement {
    selector: String,
    state: Mutex<MockElementState>,
}

impl std::fmt::Debug for MockElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockElement")
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl MockElement {
    /// Create an existing, displayed, enabled element
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        let state = MockElementState {
            existing: Script::constant(true),
            displayed: Script::constant(true),
            enabled: Script::constant(true),
            clickable: Script::constant(true),
            focused: Script::constant(false),
            selected: Script::constant(false),
            tag_name: "div".to_string(),
            ..MockElementState::default()
        };
        Self {
            selector: selector.into(),
            state: Mutex::new(state),
        }
    }

    /// Create an element that does not exist
    #[must_use]
    pub fn missing(selector: impl Into<String>) -> Self {
        let element = Self::new(selector);
        element.with_state(|s| {
            s.existing = Script::constant(false);
            s.displayed = Script::constant(false);
            s.clickable = Script::constant(false);
        });
        element
    }

    fn with_state(&self, f: impl FnOnce(&mut MockElementState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    fn read_state<R>(&self, f: impl FnOnce(&mut MockElementState) -> R) -> EsperarResult<R> {
        self.state
            .lock()
            .map(|mut state| f(&mut state))
            .map_err(|_| EsperarError::CommandFailed {
                command: "lock".to_string(),
                selector: self.selector.clone(),
                message: "mock state poisoned".to_string(),
            })
    }

    /// Script `isDisplayed` results, one per call, last repeating
    #[must_use]
    pub fn displayed(self, values: impl IntoIterator<Item = bool>) -> Self {
        self.with_state(|s| s.displayed = Script::sequence(values));
        self
    }

    /// Script `isExisting` results
    #[must_use]
    pub fn existing(self, values: impl IntoIterator<Item = bool>) -> Self {
        self.with_state(|s| s.existing = Script::sequence(values));
        self
    }

    /// Script `isEnabled` results
    #[must_use]
    pub fn enabled(self, values: impl IntoIterator<Item = bool>) -> Self {
        self.with_state(|s| s.enabled = Script::sequence(values));
        self
    }

    /// Script `isClickable` results
    #[must_use]
    pub fn clickable(self, values: impl IntoIterator<Item = bool>) -> Self {
        self.with_state(|s| s.clickable = Script::sequence(values));
        self
    }

    /// Script `isFocused` results
    #[must_use]
    pub fn focused(self, values: impl IntoIterator<Item = bool>) -> Self {
        self.with_state(|s| s.focused = Script::sequence(values));
        self
    }

    /// Script `isSelected` results
    #[must_use]
    pub fn selected(self, values: impl IntoIterator<Item = bool>) -> Self {
        self.with_state(|s| s.selected = Script::sequence(values));
        self
    }

    /// Script `getText` results
    #[must_use]
    pub fn text(self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.with_state(|s| s.text = Script::sequence(values.into_iter().map(Into::into)));
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn attribute(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_state(|s| {
            s.attributes.insert(name.into(), value.into());
        });
        self
    }

    /// Set a DOM property
    #[must_use]
    pub fn property(self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.with_state(|s| {
            s.properties.insert(name.into(), value);
        });
        self
    }

    /// Set a computed CSS property
    #[must_use]
    pub fn css(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_state(|s| {
            s.css.insert(name.into(), value.into());
        });
        self
    }

    /// Set the rendered size
    #[must_use]
    pub fn size(self, width: u32, height: u32) -> Self {
        self.with_state(|s| s.size = Some(ElementSize::new(width, height)));
        self
    }

    /// Set the accessible label
    #[must_use]
    pub fn computed_label(self, label: impl Into<String>) -> Self {
        self.with_state(|s| s.computed_label = label.into());
        self
    }

    /// Set the accessible role
    #[must_use]
    pub fn computed_role(self, role: impl Into<String>) -> Self {
        self.with_state(|s| s.computed_role = role.into());
        self
    }

    /// Set the tag name
    #[must_use]
    pub fn tag(self, tag: impl Into<String>) -> Self {
        self.with_state(|s| s.tag_name = tag.into());
        self
    }

    /// Set the outer HTML
    #[must_use]
    pub fn html(self, html: impl Into<String>) -> Self {
        self.with_state(|s| s.html = html.into());
        self
    }

    /// Recorded command invocations
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.call_history.clone())
            .unwrap_or_default()
    }

    /// Whether a command was invoked
    #[must_use]
    pub fn was_called(&self, command: &str) -> bool {
        self.history().iter().any(|c| c.starts_with(command))
    }

    /// How many times a command was invoked
    #[must_use]
    pub fn call_count(&self, command: &str) -> usize {
        self.history()
            .iter()
            .filter(|c| c.starts_with(command))
            .count()
    }

    /// Run a value command, failing when the element is scripted as missing
    fn value_command<R>(
        &self,
        command: &str,
        f: impl FnOnce(&mut MockElementState) -> R,
    ) -> EsperarResult<R> {
        let (exists, value) = self.read_state(|s| {
            s.call_history.push(command.to_string());
            (s.existing.peek().unwrap_or(false), f(s))
        })?;
        if exists {
            Ok(value)
        } else {
            Err(EsperarError::ElementNotFound {
                command: command.to_string(),
                selector: self.selector.clone(),
            })
        }
    }

    fn bool_command(
        &self,
        command: &str,
        f: impl FnOnce(&mut MockElementState) -> Option<bool>,
    ) -> EsperarResult<bool> {
        self.read_state(|s| {
            s.call_history.push(command.to_string());
            f(s).unwrap_or(false)
        })
    }
}

impl ElementOps for MockElement {
    fn selector(&self) -> &str {
        &self.selector
    }

    fn is_displayed(&self) -> EsperarResult<bool> {
        self.bool_command("isDisplayed", |s| s.displayed.next())
    }

    fn is_existing(&self) -> EsperarResult<bool> {
        self.bool_command("isExisting", |s| s.existing.next())
    }

    fn is_enabled(&self) -> EsperarResult<bool> {
        self.bool_command("isEnabled", |s| s.enabled.next())
    }

    fn is_clickable(&self) -> EsperarResult<bool> {
        self.bool_command("isClickable", |s| s.clickable.next())
    }

    fn is_focused(&self) -> EsperarResult<bool> {
        self.bool_command("isFocused", |s| s.focused.next())
    }

    fn is_selected(&self) -> EsperarResult<bool> {
        self.bool_command("isSelected", |s| s.selected.next())
    }

    fn get_text(&self) -> EsperarResult<String> {
        self.value_command("getText", |s| s.text.next().unwrap_or_default())
    }

    fn get_attribute(&self, name: &str) -> EsperarResult<Option<String>> {
        self.value_command("getAttribute", |s| s.attributes.get(name).cloned())
    }

    fn get_property(&self, name: &str) -> EsperarResult<Option<serde_json::Value>> {
        self.value_command("getProperty", |s| s.properties.get(name).cloned())
    }

    fn get_css_property(&self, name: &str) -> EsperarResult<Option<String>> {
        self.value_command("getCSSProperty", |s| s.css.get(name).cloned())
    }

    fn get_size(&self) -> EsperarResult<ElementSize> {
        self.value_command("getSize", |s| s.size)?
            .ok_or_else(|| EsperarError::CommandFailed {
                command: "getSize".to_string(),
                selector: self.selector.clone(),
                message: "no size set".to_string(),
            })
    }

    fn get_computed_label(&self) -> EsperarResult<String> {
        self.value_command("getComputedLabel", |s| s.computed_label.clone())
    }

    fn get_computed_role(&self) -> EsperarResult<String> {
        self.value_command("getComputedRole", |s| s.computed_role.clone())
    }

    fn get_tag_name(&self) -> EsperarResult<String> {
        self.value_command("getTagName", |s| s.tag_name.clone())
    }

    fn get_html(&self) -> EsperarResult<String> {
        self.value_command("getHTML", |s| s.html.clone())
    }
}

#[derive(Debug, Default)]
struct MockBrowserState {
    titles: Script<Vec<String>>,
    urls: Script<Vec<String>>,
    call_history: Vec<String>,
}

/// Mock browser with scripted title/URL answers.
///
/// Each answer is one value per remote target; multi-remote sessions script
/// multi-element vectors.
#[derive(Debug, Default)]
pub struct MockBrowser {
    state: Mutex<MockBrowserState>,
}

impl MockBrowser {
    /// Create a browser with no scripted answers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a single-target browser with a fixed title and URL
    #[must_use]
    pub fn single(title: impl Into<String>, url: impl Into<String>) -> Self {
        let browser = Self::new();
        browser.with_state(|s| {
            s.titles = Script::constant(vec![title.into()]);
            s.urls = Script::constant(vec![url.into()]);
        });
        browser
    }

    fn with_state(&self, f: impl FnOnce(&mut MockBrowserState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    /// Script `getTitle` answers, one vector per call, last repeating
    #[must_use]
    pub fn titles(self, values: impl IntoIterator<Item = Vec<String>>) -> Self {
        self.with_state(|s| s.titles = Script::sequence(values));
        self
    }

    /// Script `getUrl` answers
    #[must_use]
    pub fn urls(self, values: impl IntoIterator<Item = Vec<String>>) -> Self {
        self.with_state(|s| s.urls = Script::sequence(values));
        self
    }

    /// Recorded command invocations
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.call_history.clone())
            .unwrap_or_default()
    }

    /// Whether a command was invoked
    #[must_use]
    pub fn was_called(&self, command: &str) -> bool {
        self.history().iter().any(|c| c.starts_with(command))
    }

    fn command(
        &self,
        command: &str,
        f: impl FnOnce(&mut MockBrowserState) -> Option<Vec<String>>,
    ) -> EsperarResult<Vec<String>> {
        self.state
            .lock()
            .map_err(|_| EsperarError::BrowserError {
                command: command.to_string(),
                message: "mock state poisoned".to_string(),
            })
            .and_then(|mut s| {
                s.call_history.push(command.to_string());
                f(&mut s).ok_or_else(|| EsperarError::BrowserError {
                    command: command.to_string(),
                    message: "no scripted answer".to_string(),
                })
            })
    }
}

impl BrowserOps for MockBrowser {
    fn get_title(&self) -> EsperarResult<Vec<String>> {
        self.command("getTitle", |s| s.titles.next())
    }

    fn get_url(&self) -> EsperarResult<Vec<String>> {
        self.command("getUrl", |s| s.urls.next())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod scripting {
        use super::*;

        #[test]
        fn test_last_script_value_repeats() {
            let element = MockElement::new("#save").enabled([false, true]);
            assert!(!element.is_enabled().unwrap());
            assert!(element.is_enabled().unwrap());
            assert!(element.is_enabled().unwrap());
        }

        #[test]
        fn test_text_sequence() {
            let element = MockElement::new("#status").text(["loading", "done"]);
            assert_eq!(element.get_text().unwrap(), "loading");
            assert_eq!(element.get_text().unwrap(), "done");
            assert_eq!(element.get_text().unwrap(), "done");
        }
    }

    mod missing_elements {
        use super::*;

        #[test]
        fn test_value_command_fails_with_selector_in_message() {
            let element = MockElement::missing("#gone");
            let err = element.get_text().unwrap_err();
            assert_eq!(
                err.to_string(),
                "Can't call getText on element with selector \"#gone\" because element wasn't found"
            );
        }

        #[test]
        fn test_existence_checks_do_not_fail() {
            let element = MockElement::missing("#gone");
            assert!(!element.is_existing().unwrap());
            assert!(!element.is_displayed().unwrap());
        }
    }

    mod call_history {
        use super::*;

        #[test]
        fn test_history_records_commands() {
            let element = MockElement::new("#btn");
            let _ = element.is_displayed();
            let _ = element.get_text();
            assert!(element.was_called("isDisplayed"));
            assert!(element.was_called("getText"));
            assert!(!element.was_called("isEnabled"));
        }

        #[test]
        fn test_call_count() {
            let element = MockElement::new("#btn");
            let _ = element.is_enabled();
            let _ = element.is_enabled();
            assert_eq!(element.call_count("isEnabled"), 2);
        }
    }

    mod element_values {
        use super::*;

        #[test]
        fn test_attribute_and_property() {
            let element = MockElement::new("input")
                .attribute("type", "text")
                .property("value", serde_json::json!("hello"));
            assert_eq!(element.get_attribute("type").unwrap().unwrap(), "text");
            assert_eq!(
                element.get_property("value").unwrap().unwrap(),
                serde_json::json!("hello")
            );
            assert!(element.get_attribute("missing").unwrap().is_none());
        }

        #[test]
        fn test_size() {
            let element = MockElement::new("img").size(32, 32);
            assert_eq!(element.get_size().unwrap(), ElementSize::new(32, 32));
        }
    }

    mod browser {
        use super::*;

        #[test]
        fn test_single_target() {
            let browser = MockBrowser::single("Home", "https://example.org/");
            assert_eq!(browser.get_title().unwrap(), vec!["Home".to_string()]);
            assert_eq!(
                browser.get_url().unwrap(),
                vec!["https://example.org/".to_string()]
            );
        }

        #[test]
        fn test_multi_remote_titles() {
            let browser = MockBrowser::new()
                .titles([vec!["A".to_string(), "B".to_string()]]);
            assert_eq!(browser.get_title().unwrap().len(), 2);
        }

        #[test]
        fn test_title_sequence_for_polling() {
            let browser = MockBrowser::new().titles([
                vec!["Loading".to_string()],
                vec!["Ready".to_string()],
            ]);
            assert_eq!(browser.get_title().unwrap(), vec!["Loading".to_string()]);
            assert_eq!(browser.get_title().unwrap(), vec!["Ready".to_string()]);
            assert!(browser.was_called("getTitle"));
        }

        #[test]
        fn test_unscripted_answer_is_error() {
            let browser = MockBrowser::new();
            assert!(browser.get_title().is_err());
        }
    }
}
