//! Core bid types and collaborator interfaces shared across the cache engine.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since UNIX epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ================================================================================================
// BID
// ================================================================================================

/// A video bid as produced by a bidder adapter.
///
/// The auction layer owns bids. The cache engine moves a bid through a batch
/// and hands it back through [`BidAcceptor`], writing `video_cache_key` (and
/// possibly `vast_url`) on the way.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Bid {
    pub auction_id: String,
    pub request_id: String,
    pub bidder: String,
    pub ad_id: String,

    /// Inline VAST document. Takes precedence over `vast_url`.
    pub vast_xml: Option<String>,
    /// Direct playback URL of a VAST document.
    pub vast_url: Option<String>,
    /// Impression trackers to attach when wrapping `vast_url`.
    pub vast_imp_urls: Vec<String>,

    /// Seconds the bid stays valid.
    pub ttl: u32,
    /// Caller-supplied cache key, honored by the store when non-empty.
    pub custom_cache_key: Option<String>,
    /// Identifier assigned by the cache store.
    pub video_cache_key: Option<String>,
}

impl Bid {
    /// Key under which locally cached VAST for this bid is stored.
    pub fn local_key(&self) -> String {
        local_key(&self.bidder, &self.ad_id)
    }

    pub(crate) fn has_vast_url(&self) -> bool {
        self.vast_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// `bidder_adId` key shared by the local cache and its tag-URL lookups.
pub fn local_key(bidder: &str, ad_id: &str) -> String {
    format!("{}_{}", bidder, ad_id)
}

// ================================================================================================
// AUCTION COLLABORATORS
// ================================================================================================

/// Handle to a running auction. Owned by the auction manager.
pub trait Auction: Send + Sync {
    fn auction_id(&self) -> &str;
}

pub type AuctionRef = Arc<dyn Auction>;

/// Resolves the owning auction's start time for a bid.
pub trait AuctionLookup: Send + Sync {
    /// Start timestamp (ms) of the bid's auction, or `None` if unresolved.
    fn auction_start(&self, bid: &Bid) -> Option<u64>;
}

/// Lookup that never resolves an auction.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuctionLookup;

impl AuctionLookup for NoAuctionLookup {
    fn auction_start(&self, _bid: &Bid) -> Option<u64> {
        None
    }
}

/// Admits a finalized bid into its auction's result set.
pub trait BidAcceptor: Send + Sync {
    fn accept(&self, auction: &AuctionRef, bid: Bid);
}

/// Completion callback invoked after a bid has been admitted.
pub type OnDone = Box<dyn FnOnce() + Send + 'static>;
