//! Wire and pipeline types
//!
//! `ElementDescription`/`EventRecord` mirror the element-stats endpoint
//! payload: one record per aggregated interaction, carrying the clicked
//! element's ancestor chain from the leaf upward.

use dom::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The attribute-map key marking an explicit `data-attr` annotation
pub const DATA_ATTR_KEY: &str = "attr__data-attr";

/// Serialized description of one element in a recorded ancestor chain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementDescription {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub attr_class: Option<Vec<String>>,
    #[serde(default)]
    pub attr_id: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub nth_child: Option<u32>,
    #[serde(default)]
    pub nth_of_type: Option<u32>,
    /// Arbitrary recorded attributes, keys prefixed `attr__`
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// Index within the recorded chain (0 = clicked leaf)
    #[serde(default)]
    pub order: Option<u32>,
}

impl ElementDescription {
    pub fn data_attr(&self) -> Option<&str> {
        self.attributes.get(DATA_ATTR_KEY).map(|s| s.as_str())
    }
}

/// One recorded interaction: the element chain (leaf first) plus how
/// often it was clicked
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default)]
    pub elements: Vec<ElementDescription>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
}

/// A record matched back to a live node.
///
/// `node` borrows its meaning from the current document snapshot; a
/// resolved element must not be carried across a page change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedElement {
    pub node: NodeId,
    pub selector: String,
    pub count: u64,
    /// 1-based rank, -1 until assigned
    pub position: i32,
}

/// Deduplicated, counted element ready for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedElement {
    pub node: NodeId,
    pub count: u64,
    /// Selector of the first record that contributed to this node
    pub selector: String,
    pub action_step: ActionStep,
    /// 1-based rank, -1 until assigned
    pub position: i32,
}

/// Template for creating an action from a heatmap element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStep {
    pub event: String,
    pub tag_name: Option<String>,
    pub href: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub selector: Option<String>,
    pub url_matching: String,
}

impl ActionStep {
    pub fn autocapture() -> Self {
        Self {
            event: "$autocapture".to_string(),
            tag_name: None,
            href: None,
            name: None,
            text: None,
            selector: None,
            url_matching: "exact".to_string(),
        }
    }
}
