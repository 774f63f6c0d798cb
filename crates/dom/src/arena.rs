//! Arena-based document storage
//!
//! All nodes live in one `Vec<DomNode>`, addressed by `NodeId` indices:
//!
//! ```text
//! Arena: Vec<DomNode>
//!        [Node0][Node1][Node2]...
//!         ↑ 4-byte index, not 8-byte pointer
//! ```
//!
//! Nodes are inserted in document pre-order, so iterating ids 0..len
//! yields document order; the query engine relies on this.

use crate::error::{DomError, Result};
use crate::types::{DomNode, NodeId, NodeType};
use ahash::AHashMap;
use smallvec::SmallVec;

/// Arena allocator for document nodes
///
/// Design:
/// - Single Vec<DomNode> for sequential allocation
/// - AHashMap from `id` attribute to node ids (fast `#id` lookups;
///   duplicate ids are legal in real documents, so the value is a list)
/// - No Rc/Arc: use indices everywhere
#[derive(Debug, Default)]
pub struct DomArena {
    nodes: Vec<DomNode>,
    id_index: AHashMap<String, SmallVec<[NodeId; 1]>>,
    root_id: Option<NodeId>,
}

impl DomArena {
    pub fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(256),
            id_index: AHashMap::new(),
            root_id: None,
        }
    }

    /// Add a node to the arena, returns its ID
    pub fn add_node(&mut self, mut node: DomNode) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        node.node_id = node_id;
        if let Some(id_attr) = node.attr("id") {
            self.id_index
                .entry(id_attr.to_string())
                .or_default()
                .push(node_id);
        }
        self.nodes.push(node);
        node_id
    }

    /// Get node by ID (immutable)
    pub fn get(&self, node_id: NodeId) -> Result<&DomNode> {
        self.nodes
            .get(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get node by ID (mutable)
    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Set root node
    pub fn set_root(&mut self, node_id: NodeId) -> Result<()> {
        self.get(node_id)?;
        self.root_id = Some(node_id);
        Ok(())
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root_id
    }

    pub fn root(&self) -> Result<&DomNode> {
        let root_id = self.root_id.ok_or(DomError::NoRoot)?;
        self.get(root_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterator over all nodes in document order
    pub fn iter(&self) -> impl Iterator<Item = &DomNode> {
        self.nodes.iter()
    }

    /// Iterator over all node IDs in document order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|i| i as NodeId)
    }

    /// Nodes carrying the given `id` attribute, in document order
    pub fn nodes_with_id(&self, id: &str) -> &[NodeId] {
        self.id_index.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Parent of a node, if any
    pub fn parent(&self, node_id: NodeId) -> Result<Option<&DomNode>> {
        let node = self.get(node_id)?;
        match node.parent_id {
            Some(parent_id) => Ok(Some(self.get(parent_id)?)),
            None => Ok(None),
        }
    }

    /// Parent of a node, only if the parent is itself an element
    pub fn parent_element(&self, node_id: NodeId) -> Option<NodeId> {
        let node = self.get(node_id).ok()?;
        let parent_id = node.parent_id?;
        let parent = self.get(parent_id).ok()?;
        parent.is_element().then_some(parent_id)
    }

    /// 1-based position of an element among its parent's element children
    pub fn nth_child(&self, node_id: NodeId) -> Option<usize> {
        self.sibling_position(node_id, |_| true)
    }

    /// 1-based position of an element among same-tag element siblings
    pub fn nth_of_type(&self, node_id: NodeId) -> Option<usize> {
        let tag = self.get(node_id).ok()?.tag_name()?.to_string();
        self.sibling_position(node_id, |n| n.node_name == tag)
    }

    fn sibling_position<F>(&self, node_id: NodeId, accept: F) -> Option<usize>
    where
        F: Fn(&DomNode) -> bool,
    {
        let node = self.get(node_id).ok()?;
        if !node.is_element() {
            return None;
        }
        // An element without a parent counts as position 1 of its kind.
        let Some(parent_id) = node.parent_id else {
            return Some(1);
        };
        let parent = self.get(parent_id).ok()?;
        let mut position = 0;
        for &sibling_id in &parent.children_ids {
            let sibling = self.get(sibling_id).ok()?;
            if sibling.is_element() && accept(sibling) {
                position += 1;
            }
            if sibling_id == node_id {
                return Some(position);
            }
        }
        None
    }

    /// Traverse tree depth-first (iterative, no recursion)
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(&DomNode) -> Result<()>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            // Push children in reverse order (so they're visited left-to-right)
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// Find nodes matching predicate, in document order
    pub fn find<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&DomNode) -> bool,
    {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, node)| predicate(node).then_some(idx as NodeId))
            .collect()
    }

    /// Clear arena (reuse allocation)
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.id_index.clear();
        self.root_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tag: &str) -> DomNode {
        DomNode::new(0, NodeType::Element, tag.to_string())
    }

    #[test]
    fn test_arena_basic() {
        let mut arena = DomArena::new();

        let id = arena.add_node(element("div"));
        assert_eq!(id, 0);

        let retrieved = arena.get(id).unwrap();
        assert_eq!(retrieved.node_name, "div");
        assert!(retrieved.is_element());
    }

    #[test]
    fn test_id_index() {
        let mut arena = DomArena::new();

        let mut node = element("div");
        node.attributes.insert("id".to_string(), "main".to_string());
        let id = arena.add_node(node);

        assert_eq!(arena.nodes_with_id("main"), &[id]);
        assert!(arena.nodes_with_id("other").is_empty());
    }

    #[test]
    fn test_sibling_positions() {
        let mut arena = DomArena::new();

        let parent_id = arena.add_node(element("ul"));
        let a = arena.add_node(element("li"));
        let b = arena.add_node(element("span"));
        let c = arena.add_node(element("li"));
        for &child in &[a, b, c] {
            arena.get_mut(child).unwrap().parent_id = Some(parent_id);
            arena.get_mut(parent_id).unwrap().children_ids.push(child);
        }

        assert_eq!(arena.nth_child(c), Some(3));
        assert_eq!(arena.nth_of_type(c), Some(2));
        assert_eq!(arena.nth_child(b), Some(2));
        assert_eq!(arena.nth_of_type(b), Some(1));
    }

    #[test]
    fn test_traverse_df() {
        let mut arena = DomArena::new();

        let root_id = arena.add_node(element("div"));
        let id1 = arena.add_node(element("span"));
        let id2 = arena.add_node(element("span"));

        for &child in &[id1, id2] {
            arena.get_mut(child).unwrap().parent_id = Some(root_id);
            arena.get_mut(root_id).unwrap().children_ids.push(child);
        }

        let mut visited = Vec::new();
        arena
            .traverse_df(root_id, |node| {
                visited.push(node.node_name.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(visited, vec!["div", "span", "span"]);
    }
}
