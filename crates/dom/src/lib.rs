//! In-memory document model and selector matching
//!
//! This crate is the substrate the heatmap resolver runs on: a live page
//! snapshot stored as an arena of nodes, queried with the CSS subset the
//! selector builder emits.
//!
//! ## Core Design
//!
//! ```text
//! JSON tree → DomArena (owned) → Selector → query() → Vec<NodeId>
//!                  ↓
//!            NodeId (u32 surrogate handle)
//! ```
//!
//! - **Handles, not pointers**: callers hold `NodeId` indices; identity
//!   comparisons and aggregation keys are plain integers.
//! - **Document order everywhere**: the arena stores nodes in pre-order,
//!   so scans and query results come back in document order for free.
//! - **Strict selectors**: the parser accepts exactly the grammar the
//!   builder produces; anything else is a `SelectorError`, never a skip.

pub mod arena;
pub mod document;
pub mod error;
pub mod selector;
pub mod types;
pub mod utils;

pub use arena::DomArena;
pub use document::Document;
pub use error::{DomError, Result};
pub use selector::{Selector, SelectorError, SelectorPart};
pub use types::{DomNode, NodeId, NodeType};
