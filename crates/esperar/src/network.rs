//! Recorded network calls for request matchers.
//!
//! A [`NetworkMock`] is a read-only ledger of request/response records the
//! test harness fills as traffic passes through its interception layer.
//! Request matchers poll the ledger; they never intercept anything
//! themselves.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// HTTP methods for request matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// DELETE request
    Delete,
    /// PATCH request
    Patch,
    /// HEAD request
    Head,
    /// OPTIONS request
    Options,
    /// Any method
    Any,
}

impl HttpMethod {
    /// Parse from string, unknown methods map to `Any`
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            _ => Self::Any,
        }
    }

    /// Convert to string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Any => "*",
        }
    }

    /// Check if this method matches another
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        *self == Self::Any || *other == Self::Any || *self == *other
    }
}

/// Pattern for matching request URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Contains substring
    Contains(String),
    /// Regex match
    Regex(String),
    /// Glob pattern (e.g., "**/api/users/*")
    Glob(String),
    /// Match any URL
    Any,
}

impl UrlPattern {
    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(pattern) => url == pattern,
            Self::Prefix(pattern) => url.starts_with(pattern),
            Self::Contains(pattern) => url.contains(pattern),
            Self::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(url))
                .unwrap_or(false),
            Self::Glob(pattern) => Self::glob_matches(pattern, url),
            Self::Any => true,
        }
    }

    /// Simple glob matching for URLs
    fn glob_matches(pattern: &str, url: &str) -> bool {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.is_empty() {
            return url.is_empty();
        }

        let mut pos = 0;
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            if let Some(found) = url[pos..].find(part) {
                if i == 0 && found != 0 {
                    return false;
                }
                pos += found + part.len();
            } else {
                return false;
            }
        }

        // A pattern not ending in '*' must consume the whole URL
        if let Some(last) = parts.last() {
            if !last.is_empty() && pos != url.len() {
                return false;
            }
        }
        true
    }
}

/// One recorded request/response pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedCall {
    /// Request URL
    pub url: String,
    /// Request method
    pub method: HttpMethod,
    /// Response status code
    pub status: u16,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body parsed as JSON, `None` for empty or non-JSON bodies
    pub body: Option<serde_json::Value>,
}

impl RecordedCall {
    /// Create a bodyless call record
    #[must_use]
    pub fn new(url: impl Into<String>, method: HttpMethod, status: u16) -> Self {
        Self {
            url: url.into(),
            method,
            status,
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Attach a JSON body
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }
}

/// Expected shape of a recorded request
#[derive(Debug, Clone, Default)]
pub struct RequestShape {
    /// URL pattern, `None` matches any URL
    pub url: Option<UrlPattern>,
    /// Method, `None` matches any method
    pub method: Option<HttpMethod>,
    /// JSON body, `None` matches any body
    pub body: Option<serde_json::Value>,
}

impl RequestShape {
    /// Match any request
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Require a URL pattern
    #[must_use]
    pub fn with_url(mut self, pattern: UrlPattern) -> Self {
        self.url = Some(pattern);
        self
    }

    /// Require a method
    #[must_use]
    pub const fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Require an exact JSON body
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Whether a recorded call satisfies this shape
    #[must_use]
    pub fn matches(&self, call: &RecordedCall) -> bool {
        if let Some(url) = &self.url {
            if !url.matches(&call.url) {
                return false;
            }
        }
        if let Some(method) = &self.method {
            if !method.matches(&call.method) {
                return false;
            }
        }
        if let Some(body) = &self.body {
            if call.body.as_ref() != Some(body) {
                return false;
            }
        }
        true
    }

    /// Short description used in failure messages
    #[must_use]
    pub fn describe(&self) -> String {
        let url = self
            .url
            .as_ref()
            .map_or("any url".to_string(), |u| format!("{u:?}"));
        let method = self.method.map_or("any method", |m| m.as_str());
        match &self.body {
            Some(body) => format!("{method} {url} with body {body}"),
            None => format!("{method} {url}"),
        }
    }
}

/// Ledger of recorded calls, shared with the interception layer that fills
/// it. Clones observe the same ledger.
#[derive(Debug, Clone, Default)]
pub struct NetworkMock {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl NetworkMock {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a recorded call
    pub fn record(&self, call: RecordedCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    /// Snapshot of all recorded calls, in arrival order
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Total number of recorded calls
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Number of recorded calls matching a shape
    #[must_use]
    pub fn matching_count(&self, shape: &RequestShape) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.iter().filter(|c| shape.matches(c)).count())
            .unwrap_or(0)
    }

    /// Clear the ledger
    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }
}
