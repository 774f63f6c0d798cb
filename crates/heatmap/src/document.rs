//! Document capability seam
//!
//! The resolver and aggregator never talk to a browser; they talk to
//! this trait. Production wires in a `dom::Document` snapshot of the
//! observed page, tests build small fixture documents from JSON.

use crate::types::ActionStep;
use dom::{Document, NodeId, SelectorError};

/// Marker id carried by the overlay's own injected chrome. Nodes under
/// it never count as heatmap targets.
pub const OVERLAY_ID: &str = "__heatmap_overlay__";

/// Tags that make a meaningful click container
const CLICK_TARGETS: &[&str] = &["a", "button", "input", "select", "textarea", "label"];

/// Inline formatting wrappers to skip when walking up
const INLINE_WRAPPERS: &[&str] = &[
    "span", "em", "strong", "b", "i", "u", "small", "code", "svg", "path", "img",
];

/// Structural tags that are never a sensible aggregation target
const STRUCTURAL_TAGS: &[&str] = &["html", "body", "head"];

/// What the heatmap pipeline needs from a live document
pub trait QueryableDocument {
    /// All elements matching the selector, in document order.
    /// Malformed selectors are an error, not an empty result.
    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError>;

    /// Canonicalize a node to its meaningful container, or `None` when
    /// there is none (overlay chrome, structural elements)
    fn trim_to_container(&self, node: NodeId) -> Option<NodeId>;

    /// Derive an action-step template for a node
    fn action_step(&self, node: NodeId) -> ActionStep;
}

impl QueryableDocument for Document {
    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        self.query_str(selector)
    }

    fn trim_to_container(&self, node: NodeId) -> Option<NodeId> {
        // Overlay chrome never aggregates, no matter how deep
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if self.attr(id, "id") == Some(OVERLAY_ID) {
                return None;
            }
            cursor = self.parent_element(id);
        }

        let mut current = node;
        loop {
            let tag = self.tag(current)?;
            if CLICK_TARGETS.contains(&tag) {
                return Some(current);
            }
            if INLINE_WRAPPERS.contains(&tag) {
                match self.parent_element(current) {
                    Some(parent) => {
                        current = parent;
                        continue;
                    }
                    None => break,
                }
            }
            break;
        }

        let tag = self.tag(current)?;
        if STRUCTURAL_TAGS.contains(&tag) {
            None
        } else {
            Some(current)
        }
    }

    fn action_step(&self, node: NodeId) -> ActionStep {
        let mut step = ActionStep::autocapture();
        step.tag_name = self.tag(node).map(str::to_string);
        step.href = self.attr(node, "href").map(str::to_string);
        step.name = self.attr(node, "name").map(str::to_string);

        let text = self.text_content(node);
        if !text.is_empty() {
            step.text = Some(dom::utils::cap_text_length(&text, 200));
        }

        step.selector = Some(node_selector(self, node));
        step
    }
}

/// Build a stable selector for a live node: walk up emitting
/// `tag:nth-child(k)` pieces, stopping early at the first id'd element.
fn node_selector(doc: &Document, node: NodeId) -> String {
    let mut pieces: Vec<String> = Vec::new();
    let mut current = Some(node);

    while let Some(id) = current {
        let Some(tag) = doc.tag(id) else { break };
        if let Some(id_attr) = doc.attr(id, "id").filter(|s| !s.is_empty()) {
            pieces.push(format!("{tag}[id=\"{}\"]", id_attr.replace('"', "\\\"")));
            break;
        }
        match doc.arena().nth_child(id) {
            Some(n) => pieces.push(format!("{tag}:nth-child({n})")),
            None => pieces.push(tag.to_string()),
        }
        current = doc.parent_element(id);
    }

    pieces.reverse();
    pieces.join(" > ")
}
