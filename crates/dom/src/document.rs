//! Document - arena wrapper plus the query engine
//!
//! A `Document` is built from a JSON tree description (element objects
//! with `tag` / `attributes` / `children`, bare strings as text nodes)
//! and answers `query_selector_all`-style questions over the arena.
//!
//! Query results are a snapshot in document order. Because every
//! combinator in the selector grammar is `>`, matching a chain is a
//! straight walk up the parent elements, no backtracking.

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::selector::{Selector, SelectorError, SelectorPart};
use crate::types::{DomNode, NodeId, NodeType};
use serde_json::Value;

#[derive(Debug, Default)]
pub struct Document {
    arena: DomArena,
}

impl Document {
    pub fn new() -> Self {
        Self {
            arena: DomArena::new(),
        }
    }

    /// Build a document from a JSON tree.
    ///
    /// ```
    /// # use dom::Document;
    /// let doc = Document::from_json(&serde_json::json!({
    ///     "tag": "html",
    ///     "children": [
    ///         { "tag": "body", "children": [
    ///             { "tag": "a", "attributes": { "href": "/x" }, "children": ["go"] }
    ///         ]}
    ///     ]
    /// })).unwrap();
    /// assert_eq!(doc.query_str("a").unwrap().len(), 1);
    /// ```
    pub fn from_json(value: &Value) -> Result<Self> {
        let mut doc = Self::new();
        let mut root = DomNode::new(0, NodeType::Document, "#document".to_string());
        root.parent_id = None;
        let root_id = doc.arena.add_node(root);
        doc.arena.set_root(root_id)?;

        let child_id = doc.parse_node(value, root_id)?;
        if let Ok(root) = doc.arena.get_mut(root_id) {
            root.children_ids.push(child_id);
        }
        Ok(doc)
    }

    /// Build a document from JSON text (convenience for fixtures)
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    fn parse_node(&mut self, value: &Value, parent_id: NodeId) -> Result<NodeId> {
        // Bare strings are text nodes
        if let Some(text) = value.as_str() {
            let mut node = DomNode::new(0, NodeType::Text, "#text".to_string());
            node.node_value = text.to_string();
            node.parent_id = Some(parent_id);
            return Ok(self.arena.add_node(node));
        }

        let obj = value
            .as_object()
            .ok_or_else(|| DomError::InvalidDescription(format!("expected object or string, got {value}")))?;

        let tag = obj
            .get("tag")
            .and_then(|t| t.as_str())
            .ok_or_else(|| DomError::InvalidDescription("element is missing `tag`".to_string()))?;

        let mut node = DomNode::new(0, NodeType::Element, tag.to_ascii_lowercase());
        node.parent_id = Some(parent_id);

        if let Some(attrs) = obj.get("attributes") {
            let attrs = attrs.as_object().ok_or_else(|| {
                DomError::InvalidDescription("`attributes` must be an object".to_string())
            })?;
            for (name, attr_value) in attrs {
                let attr_value = attr_value.as_str().ok_or_else(|| {
                    DomError::InvalidDescription(format!("attribute `{name}` must be a string"))
                })?;
                node.attributes
                    .insert(name.clone(), attr_value.to_string());
            }
        }

        let node_id = self.arena.add_node(node);

        if let Some(children) = obj.get("children") {
            let children = children.as_array().ok_or_else(|| {
                DomError::InvalidDescription("`children` must be an array".to_string())
            })?;
            let mut child_ids = smallvec::SmallVec::new();
            for child in children {
                child_ids.push(self.parse_node(child, node_id)?);
            }
            if let Ok(node) = self.arena.get_mut(node_id) {
                node.children_ids = child_ids;
            }
        }

        Ok(node_id)
    }

    pub fn arena(&self) -> &DomArena {
        &self.arena
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.arena.root_id()
    }

    /// Tag of an element node
    pub fn tag(&self, node_id: NodeId) -> Option<&str> {
        self.arena.get(node_id).ok()?.tag_name()
    }

    /// Attribute of an element node
    pub fn attr(&self, node_id: NodeId, name: &str) -> Option<&str> {
        self.arena.get(node_id).ok()?.attr(name)
    }

    pub fn parent_element(&self, node_id: NodeId) -> Option<NodeId> {
        self.arena.parent_element(node_id)
    }

    /// Concatenated text of the node's subtree, whitespace-trimmed
    pub fn text_content(&self, node_id: NodeId) -> String {
        crate::utils::text_content(&self.arena, node_id).unwrap_or_default()
    }

    /// All elements matching the selector, in document order
    pub fn query(&self, selector: &Selector) -> Vec<NodeId> {
        let Some(target) = selector.target() else {
            return Vec::new();
        };

        // `#id` on the target compound narrows the scan to the id index
        if let Some(id) = &target.id {
            return self
                .arena
                .nodes_with_id(id)
                .iter()
                .copied()
                .filter(|&node_id| self.matches_chain(node_id, &selector.parts))
                .collect();
        }

        self.arena
            .node_ids()
            .filter(|&node_id| self.matches_chain(node_id, &selector.parts))
            .collect()
    }

    /// Parse-and-query in one step
    pub fn query_str(&self, selector: &str) -> std::result::Result<Vec<NodeId>, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(self.query(&selector))
    }

    fn matches_chain(&self, node_id: NodeId, parts: &[SelectorPart]) -> bool {
        let mut current = Some(node_id);
        for part in parts.iter().rev() {
            let Some(id) = current else {
                return false;
            };
            if !self.matches_part(id, part) {
                return false;
            }
            current = self.parent_element(id);
        }
        true
    }

    fn matches_part(&self, node_id: NodeId, part: &SelectorPart) -> bool {
        let Ok(node) = self.arena.get(node_id) else {
            return false;
        };
        if !node.is_element() {
            return false;
        }

        if let Some(tag) = &part.tag {
            if !node.node_name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &part.id {
            if node.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !part.classes.iter().all(|class| node.has_class(class)) {
            return false;
        }
        if !part
            .attributes
            .iter()
            .all(|(name, value)| node.attr(name) == Some(value.as_str()))
        {
            return false;
        }
        if let Some(n) = part.nth_child {
            if self.arena.nth_child(node_id) != Some(n) {
                return false;
            }
        }
        if let Some(n) = part.nth_of_type {
            if self.arena.nth_of_type(node_id) != Some(n) {
                return false;
            }
        }
        true
    }
}
