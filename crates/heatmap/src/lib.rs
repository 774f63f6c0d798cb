//! Click heatmap pipeline: match recorded events back onto live DOM
//! nodes and rank them for the overlay.
//!
//! ## Data flow
//!
//! ```text
//! stats API → EventRecord (ancestor chain + count)
//!                 ↓ resolve (selector builder + chain walk)
//!           ResolvedElement (NodeId, selector, count)
//!                 ↓ aggregate (trim → sum → rank)
//!           AggregatedElement / HeatmapView
//!                 ↑ orchestrated by HeatmapStore (enable/disable,
//!                   page-URL tracking, epoch-tagged fetches, tooltip)
//! ```
//!
//! The pipeline never touches a browser: documents come in through the
//! `QueryableDocument` trait, so everything is testable against
//! in-memory fixtures (see the `dom` crate).

pub mod aggregate;
pub mod client;
pub mod document;
pub mod error;
pub mod resolve;
pub mod selector;
pub mod store;
pub mod types;

pub use aggregate::{aggregate, HeatmapView};
pub use client::{Authenticator, HttpStatsClient, StatsClient};
pub use document::{QueryableDocument, OVERLAY_ID};
pub use error::{HeatmapError, Result};
pub use resolve::{resolve_batch, resolve_record};
pub use selector::{build_selector, is_too_generic};
pub use store::{HeatmapEvent, HeatmapPhase, HeatmapState, HeatmapStore, TOOLTIP_HIDE_DELAY};
pub use types::{ActionStep, AggregatedElement, ElementDescription, EventRecord, ResolvedElement};
