//! Assertion subjects: single elements, collections, lazy references, and
//! plain values.
//!
//! Collections keep their elements in shared storage. Size-sensitive
//! matchers refetch the originating query in place, so every clone of the
//! collection observes the new length through the same storage. Filtered
//! lists built from individual elements get fresh storage and per-element
//! labels instead.

use std::sync::{Arc, Mutex};

use crate::driver::{BrowserOps, ElementOps};
use crate::network::NetworkMock;
use crate::result::{EsperarError, EsperarResult};

/// Shared handle to one element
pub type ElementRef = Arc<dyn ElementOps>;

/// Closure re-running a collection's originating query
pub type RefetchFn = Arc<dyn Fn() -> EsperarResult<Vec<ElementRef>> + Send + Sync>;

/// Ordered element collection with shared storage.
///
/// Cloning is shallow: clones see in-place refetches. A collection built
/// from a query carries a refetch closure; a filtered list does not and
/// keeps whatever elements it was built with.
#[derive(Clone)]
pub struct ElementCollection {
    selector: String,
    items: Arc<Mutex<Vec<ElementRef>>>,
    refetch: Option<RefetchFn>,
    filtered: bool,
}

impl std::fmt::Debug for ElementCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementCollection")
            .field("selector", &self.selector)
            .field("len", &self.len())
            .field("filtered", &self.filtered)
            .finish_non_exhaustive()
    }
}

impl ElementCollection {
    /// Create a collection with fixed contents and no refetch closure
    #[must_use]
    pub fn new(selector: impl Into<String>, items: Vec<ElementRef>) -> Self {
        Self {
            selector: selector.into(),
            items: Arc::new(Mutex::new(items)),
            refetch: None,
            filtered: false,
        }
    }

    /// Create a collection from a query closure, running it once to seed
    /// the storage
    pub fn from_query(
        selector: impl Into<String>,
        refetch: impl Fn() -> EsperarResult<Vec<ElementRef>> + Send + Sync + 'static,
    ) -> EsperarResult<Self> {
        let initial = refetch()?;
        Ok(Self {
            selector: selector.into(),
            items: Arc::new(Mutex::new(initial)),
            refetch: Some(Arc::new(refetch)),
            filtered: false,
        })
    }

    /// Create a filtered list from individual elements. Gets fresh storage
    /// and a comma-separated label of per-element selectors.
    #[must_use]
    pub fn filtered(items: Vec<ElementRef>) -> Self {
        let label = items
            .iter()
            .map(|e| e.selector().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            selector: label,
            items: Arc::new(Mutex::new(items)),
            refetch: None,
            filtered: true,
        }
    }

    /// Selector the collection was queried with (or the comma list for a
    /// filtered collection)
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Display label: `` $$(`sel`) `` for queried collections, the raw
    /// comma list for filtered ones
    #[must_use]
    pub fn label(&self) -> String {
        if self.filtered {
            self.selector.clone()
        } else {
            format!("$$(`{}`)", self.selector)
        }
    }

    /// Current length
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().map(|v| v.len()).unwrap_or(0)
    }

    /// Whether the collection currently holds no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the current elements, in query order
    #[must_use]
    pub fn items(&self) -> Vec<ElementRef> {
        self.items.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Element at an index, if present
    #[must_use]
    pub fn get(&self, index: usize) -> Option<ElementRef> {
        self.items.lock().ok().and_then(|v| v.get(index).cloned())
    }

    /// Re-run the originating query and replace the shared storage in
    /// place. Clones of this collection observe the new contents. A
    /// collection without a refetch closure keeps its contents.
    pub fn refetch_in_place(&self) -> EsperarResult<()> {
        let Some(refetch) = &self.refetch else {
            return Ok(());
        };
        let fresh = refetch()?;
        if let Ok(mut items) = self.items.lock() {
            *items = fresh;
        }
        Ok(())
    }

    /// Whether two collections share the same underlying storage
    #[must_use]
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

/// Deferred reference to one index of a collection. Resolution happens at
/// assertion time, so the element queried when the reference was created is
/// not the one asserted on.
#[derive(Clone)]
pub struct LazyElement {
    collection: ElementCollection,
    index: usize,
}

impl std::fmt::Debug for LazyElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyElement")
            .field("selector", &self.collection.selector)
            .field("index", &self.index)
            .finish()
    }
}

impl LazyElement {
    /// Create a lazy reference to `collection[index]`
    #[must_use]
    pub const fn new(collection: ElementCollection, index: usize) -> Self {
        Self { collection, index }
    }

    /// Display label, e.g. `` $$(`li`)[2] ``
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}[{}]", self.collection.label(), self.index)
    }

    /// Refetch the backing collection and resolve the index. An index past
    /// the current length is an error, not a silent miss.
    pub fn resolve(&self) -> EsperarResult<ElementRef> {
        self.collection.refetch_in_place()?;
        self.collection
            .get(self.index)
            .ok_or_else(|| EsperarError::IndexOutOfBounds {
                selector: self.collection.selector.clone(),
                index: self.index,
                length: self.collection.len(),
            })
    }
}

/// What an assertion is about
#[derive(Clone)]
pub enum Subject {
    /// A single located element
    Element(ElementRef),
    /// An ordered element collection
    Collection(ElementCollection),
    /// A deferred index into a collection
    Lazy(LazyElement),
    /// A browser session (one or more remote targets)
    Browser(Arc<dyn BrowserOps>),
    /// A network-mock call ledger
    Network(NetworkMock),
    /// An opaque value compared as JSON
    Value(serde_json::Value),
}

impl std::fmt::Debug for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Element(e) => f.debug_tuple("Element").field(&e.selector()).finish(),
            Self::Collection(c) => f.debug_tuple("Collection").field(c).finish(),
            Self::Lazy(l) => f.debug_tuple("Lazy").field(l).finish(),
            Self::Browser(_) => f.write_str("Browser(..)"),
            Self::Network(n) => f.debug_tuple("Network").field(n).finish(),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

impl Subject {
    /// Display label used in failure-message headings
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Element(e) => format!("$(`{}`)", e.selector()),
            Self::Collection(c) => c.label(),
            Self::Lazy(l) => l.label(),
            Self::Browser(_) => "window".to_string(),
            Self::Network(_) => "mock".to_string(),
            Self::Value(v) => crate::format::format_value(v),
        }
    }
}

impl From<ElementRef> for Subject {
    fn from(element: ElementRef) -> Self {
        Self::Element(element)
    }
}

impl From<ElementCollection> for Subject {
    fn from(collection: ElementCollection) -> Self {
        Self::Collection(collection)
    }
}

impl From<LazyElement> for Subject {
    fn from(lazy: LazyElement) -> Self {
        Self::Lazy(lazy)
    }
}

impl From<Arc<dyn BrowserOps>> for Subject {
    fn from(browser: Arc<dyn BrowserOps>) -> Self {
        Self::Browser(browser)
    }
}

impl From<NetworkMock> for Subject {
    fn from(mock: NetworkMock) -> Self {
        Self::Network(mock)
    }
}

impl From<serde_json::Value> for Subject {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

/// Run a command against every element, preserving input order. The first
/// command error aborts the fan-out.
pub fn run_each<R>(
    elements: &[ElementRef],
    mut command: impl FnMut(&ElementRef) -> EsperarResult<R>,
) -> EsperarResult<Vec<R>> {
    let mut results = Vec::with_capacity(elements.len());
    for element in elements {
        results.push(command(element)?);
    }
    Ok(results)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::driver::MockElement;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn refs(selectors: &[&str]) -> Vec<ElementRef> {
        selectors
            .iter()
            .map(|s| Arc::new(MockElement::new(*s)) as ElementRef)
            .collect()
    }

    mod labels {
        use super::*;

        #[test]
        fn test_element_label() {
            let subject = Subject::Element(Arc::new(MockElement::new("#login")));
            assert_eq!(subject.label(), "$(`#login`)");
        }

        #[test]
        fn test_collection_label() {
            let collection = ElementCollection::new("li.item", refs(&["li.item"]));
            assert_eq!(collection.label(), "$$(`li.item`)");
        }

        #[test]
        fn test_filtered_label_is_comma_list() {
            let collection = ElementCollection::filtered(refs(&["#a", "#b"]));
            assert_eq!(collection.label(), "#a, #b");
        }

        #[test]
        fn test_lazy_label_carries_index() {
            let lazy = LazyElement::new(ElementCollection::new("li", refs(&["li"])), 2);
            assert_eq!(lazy.label(), "$$(`li`)[2]");
        }

        #[test]
        fn test_value_label_is_json() {
            let subject = Subject::Value(serde_json::json!("plain"));
            assert_eq!(subject.label(), "\"plain\"");
        }
    }

    mod shared_storage {
        use super::*;

        #[test]
        fn test_clones_share_storage() {
            let collection = ElementCollection::new("li", refs(&["li", "li"]));
            let clone = collection.clone();
            assert!(collection.shares_storage(&clone));
        }

        #[test]
        fn test_refetch_grows_in_place() {
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&calls);
            let collection = ElementCollection::from_query("li", move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let len = if n == 0 { 2 } else { 5 };
                Ok((0..len)
                    .map(|_| Arc::new(MockElement::new("li")) as ElementRef)
                    .collect())
            })
            .unwrap();

            let clone = collection.clone();
            assert_eq!(clone.len(), 2);

            collection.refetch_in_place().unwrap();
            assert_eq!(clone.len(), 5);
            assert!(collection.shares_storage(&clone));
        }

        #[test]
        fn test_filtered_collection_has_fresh_storage() {
            let items = refs(&["#a"]);
            let a = ElementCollection::filtered(items.clone());
            let b = ElementCollection::filtered(items);
            assert!(!a.shares_storage(&b));
        }

        #[test]
        fn test_refetch_without_closure_keeps_contents() {
            let collection = ElementCollection::new("li", refs(&["li"]));
            collection.refetch_in_place().unwrap();
            assert_eq!(collection.len(), 1);
        }
    }

    mod lazy_resolution {
        use super::*;

        #[test]
        fn test_resolves_current_contents() {
            let collection = ElementCollection::new("li", refs(&["first", "second"]));
            let lazy = LazyElement::new(collection, 1);
            assert_eq!(lazy.resolve().unwrap().selector(), "second");
        }

        #[test]
        fn test_out_of_bounds_names_length() {
            let collection = ElementCollection::new("li", refs(&["li"]));
            let lazy = LazyElement::new(collection, 3);
            let err = lazy.resolve().unwrap_err();
            assert_eq!(
                err.to_string(),
                "Index 3 out of bounds for $$(`li`) of length 1"
            );
        }

        #[test]
        fn test_resolution_sees_refetched_elements() {
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&calls);
            let collection = ElementCollection::from_query("li", move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let len = if n == 0 { 1 } else { 3 };
                Ok((0..len)
                    .map(|i| Arc::new(MockElement::new(format!("li-{i}"))) as ElementRef)
                    .collect())
            })
            .unwrap();

            let lazy = LazyElement::new(collection, 2);
            assert_eq!(lazy.resolve().unwrap().selector(), "li-2");
        }
    }

    mod fan_out {
        use super::*;

        #[test]
        fn test_preserves_order() {
            let elements = refs(&["#a", "#b", "#c"]);
            let selectors =
                run_each(&elements, |e| Ok(e.selector().to_string())).unwrap();
            assert_eq!(selectors, vec!["#a", "#b", "#c"]);
        }

        #[test]
        fn test_first_error_aborts() {
            let elements = refs(&["#a", "#b"]);
            let mut seen = 0;
            let result: EsperarResult<Vec<()>> = run_each(&elements, |_| {
                seen += 1;
                Err(EsperarError::CommandFailed {
                    command: "getText".to_string(),
                    selector: "#a".to_string(),
                    message: "boom".to_string(),
                })
            });
            assert!(result.is_err());
            assert_eq!(seen, 1);
        }
    }
}
