//! Element Aggregator
//!
//! Folds resolved records onto canonical containers: trim each node,
//! sum counts per surviving `NodeId`, keep the first contributor's
//! selector, rank by count. Node identity is the arena handle, so "same
//! element" is reference identity, never structural equality.

use crate::document::QueryableDocument;
use crate::error::Result;
use crate::resolve::resolve_batch;
use crate::types::{AggregatedElement, EventRecord, ResolvedElement};
use ahash::AHashMap;
use dom::NodeId;

/// Merge resolved elements by canonical node.
///
/// Elements whose node has no meaningful container are dropped (not an
/// error). Output is sorted by count descending; the sort is stable, so
/// ties keep first-encounter order. Ranks are dense 1..N.
pub fn aggregate(
    doc: &(impl QueryableDocument + ?Sized),
    resolved: &[ResolvedElement],
) -> Vec<AggregatedElement> {
    let mut counts: AHashMap<NodeId, u64> = AHashMap::new();
    let mut selectors: AHashMap<NodeId, String> = AHashMap::new();
    // encounter order; hash maps alone would make ranking nondeterministic
    let mut order: Vec<NodeId> = Vec::new();

    for element in resolved {
        let Some(canonical) = doc.trim_to_container(element.node) else {
            continue;
        };
        if !counts.contains_key(&canonical) {
            selectors.insert(canonical, element.selector.clone());
            order.push(canonical);
        }
        *counts.entry(canonical).or_insert(0) += element.count;
    }

    let mut aggregated: Vec<AggregatedElement> = order
        .into_iter()
        .filter_map(|node| {
            let count = counts.get(&node).copied()?;
            let selector = selectors.get(&node)?.clone();
            Some(AggregatedElement {
                node,
                count,
                selector,
                action_step: doc.action_step(node),
                position: -1,
            })
        })
        .collect();

    aggregated.sort_by(|a, b| b.count.cmp(&a.count));

    for (i, element) in aggregated.iter_mut().enumerate() {
        element.position = i as i32 + 1;
    }

    aggregated
}

/// Everything the rendering layer needs for one fetched batch
#[derive(Debug, Clone, Default)]
pub struct HeatmapView {
    /// Per-record resolutions, provisional ranks 1..N
    pub elements: Vec<ResolvedElement>,
    /// Canonicalized, counted, final ranks 1..N
    pub counted_elements: Vec<AggregatedElement>,
    pub element_count: usize,
    pub click_count: u64,
    pub highest_click_count: u64,
}

impl HeatmapView {
    /// Derive the full view from fetched records. Recomputed whenever
    /// the records or the observed document change; nothing is cached.
    pub fn compute(
        doc: &(impl QueryableDocument + ?Sized),
        records: &[EventRecord],
    ) -> Result<Self> {
        let elements = resolve_batch(doc, records)?;
        let counted_elements = aggregate(doc, &elements);

        let element_count = counted_elements.len();
        let click_count = counted_elements.iter().map(|e| e.count).sum();
        let highest_click_count = counted_elements.iter().map(|e| e.count).max().unwrap_or(0);

        Ok(Self {
            elements,
            counted_elements,
            element_count,
            click_count,
            highest_click_count,
        })
    }
}
