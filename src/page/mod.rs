//! Page abstraction
//!
//! Both features manipulate the hosting page only through the [`Dom`] trait.
//! [`MemoryDom`] is the in-process implementation used by the `serve`
//! command (loaded from a JSON fixture) and by the tests.

pub mod memory;
pub mod selector;

pub use memory::{MemoryDom, NodeSpec};

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Opaque handle to a page element
pub type NodeId = usize;

/// Elements whose layout the overlay captures and restores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// `<html>`
    Root,
    /// `<body>`
    Body,
}

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::Root, Scope::Body];
}

/// Layout properties captured before the overlay takes over the page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayoutStyle {
    pub overflow: Option<String>,
    pub overflow_x: Option<String>,
    pub overflow_y: Option<String>,
    pub margin: Option<String>,
    pub padding: Option<String>,
}

impl LayoutStyle {
    /// CSS property names in capture order
    pub const PROPERTIES: [&'static str; 5] =
        ["overflow", "overflow-x", "overflow-y", "margin", "padding"];

    /// Read the computed layout of `node`
    pub fn capture<D: Dom + ?Sized>(dom: &D, node: NodeId) -> Self {
        let [overflow, overflow_x, overflow_y, margin, padding] =
            Self::PROPERTIES.map(|p| dom.computed_style(node, p));
        Self {
            overflow,
            overflow_x,
            overflow_y,
            margin,
            padding,
        }
    }

    /// Clear every inline override of these properties on `node`
    pub fn clear_inline<D: Dom + ?Sized>(dom: &D, node: NodeId) {
        for property in Self::PROPERTIES {
            dom.set_inline_style(node, property, None);
        }
    }
}

/// Synchronous page operations
///
/// Methods take `&self`; implementations use interior mutability so the
/// page can be shared between a controller and its timers.
pub trait Dom: Send + Sync {
    /// First element in document order matching `selector`
    fn query(&self, selector: &str) -> Option<NodeId>;

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.query(&format!("#{id}"))
    }

    /// First descendant of `node` with the given tag name
    fn first_descendant(&self, node: NodeId, tag: &str) -> Option<NodeId>;

    /// `<html>` or `<body>`
    fn scope(&self, scope: Scope) -> NodeId;

    fn head(&self) -> NodeId;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str);

    fn remove_attribute(&self, node: NodeId, name: &str);

    fn text_content(&self, node: NodeId) -> String;

    fn set_text(&self, node: NodeId, text: &str);

    fn inline_style(&self, node: NodeId, property: &str) -> Option<String>;

    /// `None` removes the inline declaration
    fn set_inline_style(&self, node: NodeId, property: &str, value: Option<&str>);

    fn computed_style(&self, node: NodeId, property: &str) -> Option<String>;

    /// Detached element; `id` sets the `id` attribute
    fn create_element(&self, tag: &str, id: Option<&str>) -> NodeId;

    fn append_child(&self, parent: NodeId, child: NodeId);

    /// Detached deep copy of `node`
    fn deep_clone(&self, node: NodeId) -> NodeId;

    /// Detach `node` (and its subtree) from the page
    fn remove(&self, node: NodeId);

    /// Whether `node` is attached to the document
    fn is_connected(&self, node: NodeId) -> bool;

    /// Remove the element with `id`; `false` when absent
    fn remove_by_id(&self, id: &str) -> bool {
        match self.element_by_id(id) {
            Some(node) => {
                self.remove(node);
                true
            }
            None => false,
        }
    }
}

/// First element matching any of `selectors`, in selector order
pub fn find_first<D: Dom + ?Sized>(dom: &D, selectors: &[&str]) -> Option<NodeId> {
    selectors.iter().find_map(|selector| dom.query(selector))
}

/// Look for an element up to `retries` times, waiting `period` before each.
///
/// Resolves to the element and the retry number that found it, or `None`
/// once every retry failed. The returned future owns everything it needs so
/// it can be stored and polled later.
pub fn poll_for_element<D>(
    dom: std::sync::Arc<D>,
    selectors: &'static [&'static str],
    retries: u32,
    period: Duration,
) -> impl Future<Output = Option<(NodeId, u32)>> + Send + 'static
where
    D: Dom + ?Sized + 'static,
{
    async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        for retry in 1..=retries {
            interval.tick().await;
            if let Some(node) = find_first(dom.as_ref(), selectors) {
                info!(retry, "Found background element after retry");
                return Some((node, retry));
            }
            debug!(retry, "Background element not present yet");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_find_first_respects_selector_order() {
        let dom = MemoryDom::from_body(vec![
            NodeSpec::new("div").with_id("b_sydBgCont"),
            NodeSpec::new("div").with_id("bgDiv"),
        ]);
        let found = find_first(&dom, &[".img_cont", "#bgDiv", "#b_sydBgCont"]).unwrap();
        assert_eq!(dom.attribute(found, "id").as_deref(), Some("bgDiv"));
    }

    #[test]
    fn test_layout_capture_reads_computed_values() {
        let dom = MemoryDom::from_body(vec![]);
        let body = dom.scope(Scope::Body);
        dom.set_computed_style(body, "margin", "8px");
        dom.set_computed_style(body, "overflow", "auto");

        let layout = LayoutStyle::capture(&dom, body);
        assert_eq!(layout.margin.as_deref(), Some("8px"));
        assert_eq!(layout.overflow.as_deref(), Some("auto"));
        assert_eq!(layout.padding, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_waits_before_first_lookup() {
        let dom = Arc::new(MemoryDom::from_body(vec![NodeSpec::new("div").with_class("img_cont")]));
        let started = tokio::time::Instant::now();
        let found = poll_for_element(dom, &[".img_cont"], 10, Duration::from_secs(1)).await;
        assert_eq!(found.map(|(_, retry)| retry), Some(1));
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_gives_up_after_retries() {
        let dom = Arc::new(MemoryDom::from_body(vec![]));
        let started = tokio::time::Instant::now();
        let found = poll_for_element(dom, &["#bgDiv"], 10, Duration::from_secs(1)).await;
        assert_eq!(found, None);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_finds_late_element() {
        let dom = Arc::new(MemoryDom::from_body(vec![]));
        let inserter = dom.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            let body = inserter.scope(Scope::Body);
            let bg = inserter.create_element("div", Some("bgDiv"));
            inserter.append_child(body, bg);
        });

        let found = poll_for_element(dom, &["#bgDiv"], 10, Duration::from_secs(1)).await;
        // Lookups at t=1s, 2s, 3s; the element appears at 2.5s
        assert_eq!(found.map(|(_, retry)| retry), Some(3));
    }
}
