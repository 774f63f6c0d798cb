//! Ancestor-Chain Resolver
//!
//! Matches a recorded event back to the one live node it was captured
//! on. The chain is walked leaf-to-root, prefixing each ancestor's own
//! selector onto the accumulated child selector:
//!
//! ```text
//! step 0:  a.btn
//! step 1:  li:nth-child(2) > a.btn
//! step 2:  ul#nav > li:nth-child(2) > a.btn
//! ```
//!
//! - exactly one match → accept, unless it is the leaf step and the leaf
//!   description is too generic to trust
//! - zero matches mid-chain → widen the missing ancestor to `*` and keep
//!   going (treat it as an unknown intermediate)
//! - zero matches at the root → drop the record
//! - several matches → keep narrowing with the next ancestor
//!
//! Selector syntax failures are construction bugs and always propagate.

use crate::document::QueryableDocument;
use crate::error::{HeatmapError, Result};
use crate::selector::{build_selector, is_too_generic};
use crate::types::{EventRecord, ResolvedElement};
use tracing::{debug, warn};

/// Resolve one record against the live document.
///
/// `Ok(None)` means the record could not be matched and is dropped; an
/// `Err` aborts the batch (malformed selector).
pub fn resolve_record(
    doc: &(impl QueryableDocument + ?Sized),
    record: &EventRecord,
) -> Result<Option<ResolvedElement>> {
    let mut last_selector: Option<String> = None;

    for (i, desc) in record.elements.iter().enumerate() {
        let selector = build_selector(desc);
        let combined = match &last_selector {
            Some(last) => format!("{selector} > {last}"),
            None => selector.clone(),
        };

        let matches =
            doc.query_selector_all(&combined)
                .map_err(|source| HeatmapError::Selector {
                    selector: combined.clone(),
                    source,
                })?;

        match matches.len() {
            1 => {
                // An element like a bare `svg` as the leaf: uniquely
                // matched today, but too generic to pin counts on.
                if i == 0 && is_too_generic(desc) {
                    // keep refining with the parent instead
                } else {
                    return Ok(Some(ResolvedElement {
                        node: matches[0],
                        selector,
                        count: record.count,
                        position: -1,
                    }));
                }
            }
            0 => {
                if i == record.elements.len() - 1 {
                    warn!(selector = %combined, "no live element matches the full chain");
                    return Ok(None);
                } else if i > 0 && last_selector.is_some() {
                    // The accumulated selector still matched, but this
                    // ancestor broke it. Treat it as unknown and retry
                    // with the next one.
                    last_selector = last_selector.map(|last| format!("* > {last}"));
                    continue;
                } else {
                    debug!(selector = %combined, "leaf selector matches nothing yet");
                }
            }
            n => {
                debug!(selector = %combined, matches = n, "ambiguous, narrowing further");
            }
        }

        last_selector = Some(combined);
    }

    // Ran out of ancestors while still ambiguous (or stuck on a generic
    // leaf): never accept an ambiguous match.
    Ok(None)
}

/// Resolve a whole fetched batch in record order.
///
/// Unresolvable records are skipped; survivors get provisional 1..N
/// positions (the aggregator assigns the final ranking).
pub fn resolve_batch(
    doc: &(impl QueryableDocument + ?Sized),
    records: &[EventRecord],
) -> Result<Vec<ResolvedElement>> {
    let mut resolved = Vec::with_capacity(records.len());

    for record in records {
        if let Some(element) = resolve_record(doc, record)? {
            resolved.push(element);
        }
    }

    for (i, element) in resolved.iter_mut().enumerate() {
        element.position = i as i32 + 1;
    }

    Ok(resolved)
}
