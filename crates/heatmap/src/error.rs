//! Error types for the heatmap pipeline
//!
//! Only genuinely fatal conditions become errors. A record whose chain
//! matches nothing is dropped with a warning, not an `Err`; see
//! `resolve::resolve_record`.

use dom::SelectorError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HeatmapError>;

#[derive(Debug, Error)]
pub enum HeatmapError {
    /// A combined selector failed to parse. This means the builder (or
    /// the recorded element data) is broken; never swallowed.
    #[error("invalid selector `{selector}`: {source}")]
    Selector {
        selector: String,
        #[source]
        source: SelectorError,
    },

    /// The stats endpoint rejected the session token (HTTP 403)
    #[error("authentication required")]
    AuthRequired,

    #[error("invalid stats endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed stats payload: {0}")]
    Payload(#[from] serde_json::Error),
}
