//! Error kinds raised while storing and resolving cached VAST.
//!
//! None of these are fatal. A failed store narrows which bids reach their
//! auction; a failed fetch means no combined VAST is available.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Store response body is not valid JSON.
    #[error("failed to parse cache response: {0}")]
    Parse(String),

    /// Store response parsed but has no `responses` array.
    #[error("cache response must contain an array of responses: {0}")]
    Protocol(String),

    /// Network-level failure or non-success status.
    #[error("cache request failed (status {status:?}): {body}")]
    Transport { status: Option<u16>, body: String },

    /// Response identifier count differs from the number of stored bids.
    #[error("cache returned {actual} identifiers, expected {expected}")]
    CountMismatch { expected: usize, actual: usize },

    /// Ad-server wrapper fetch failed.
    #[error("failed to fetch ad server VAST: {0}")]
    Fetch(String),

    /// Bid carries no usable VAST content.
    #[error("invalid bid: {0}")]
    InvalidBid(String),

    /// Ad-server tag URL is unparsable or lacks targeting.
    #[error("invalid ad server tag url: {0}")]
    InvalidTagUrl(String),

    #[error("invalid cache config: {0}")]
    Config(String),
}

impl CacheError {
    pub fn transport(status: Option<u16>, body: impl Into<String>) -> Self {
        CacheError::Transport {
            status,
            body: body.into(),
        }
    }
}
