//! Shared fakes for integration tests: an in-memory cache server and
//! collecting auction collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use videocache::{Auction, AuctionRef, Bid, BidAcceptor, CacheError, CacheTransport};

pub const CACHE_URL: &str = "https://cache.example/v1/cache";

/// How the fake cache answers store calls.
#[derive(Debug, Clone)]
pub enum StoreBehavior {
    /// One fresh uuid per put
    Echo,
    /// Echo, but the put at this index gets an empty uuid
    RejectAt(usize),
    /// One uuid fewer than requested
    ShortByOne,
    /// Fail with a 500
    ServerError,
    /// Reply with a non-JSON body
    Garbage,
}

pub struct FakeCacheServer {
    behavior: Mutex<StoreBehavior>,
    wrapper: Mutex<Option<String>>,
    posts: Mutex<Vec<serde_json::Value>>,
    gets: Mutex<Vec<String>>,
    next_id: AtomicUsize,
}

impl FakeCacheServer {
    pub fn new(behavior: StoreBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            wrapper: Mutex::new(None),
            posts: Mutex::new(Vec::new()),
            gets: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        })
    }

    pub fn set_behavior(&self, behavior: StoreBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Document served for GET requests; `None` makes them fail.
    pub fn serve_wrapper(&self, doc: Option<&str>) {
        *self.wrapper.lock() = doc.map(str::to_string);
    }

    /// Parsed bodies of every store call, in arrival order.
    pub fn posts(&self) -> Vec<serde_json::Value> {
        self.posts.lock().clone()
    }

    /// Number of puts in each store call.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.posts
            .lock()
            .iter()
            .map(|body| body["puts"].as_array().map_or(0, Vec::len))
            .collect()
    }

    pub fn gets(&self) -> Vec<String> {
        self.gets.lock().clone()
    }
}

#[async_trait]
impl CacheTransport for FakeCacheServer {
    async fn post_json(&self, _url: &str, body: String) -> Result<String, CacheError> {
        let parsed: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| CacheError::Parse(e.to_string()))?;
        let puts = parsed["puts"].as_array().map_or(0, Vec::len);
        self.posts.lock().push(parsed);

        let behavior = self.behavior.lock().clone();
        let count = match behavior {
            StoreBehavior::ServerError => {
                return Err(CacheError::transport(Some(500), "internal error"))
            }
            StoreBehavior::Garbage => return Ok("<html>502</html>".to_string()),
            StoreBehavior::ShortByOne => puts.saturating_sub(1),
            _ => puts,
        };

        let responses: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                let uuid = match behavior {
                    StoreBehavior::RejectAt(idx) if idx == i => String::new(),
                    _ => format!("uuid-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
                };
                serde_json::json!({ "uuid": uuid })
            })
            .collect();

        Ok(serde_json::json!({ "responses": responses }).to_string())
    }

    async fn get(&self, url: &str) -> Result<String, CacheError> {
        self.gets.lock().push(url.to_string());
        self.wrapper
            .lock()
            .clone()
            .ok_or_else(|| CacheError::Fetch("connection refused".to_string()))
    }
}

pub struct TestAuction(pub String);

impl Auction for TestAuction {
    fn auction_id(&self) -> &str {
        &self.0
    }
}

pub fn auction(id: &str) -> AuctionRef {
    Arc::new(TestAuction(id.to_string()))
}

/// Records admitted bids with the auction they were admitted to.
#[derive(Default)]
pub struct CollectingAcceptor {
    admitted: Mutex<Vec<(String, Bid)>>,
}

impl CollectingAcceptor {
    pub fn bids(&self) -> Vec<Bid> {
        self.admitted.lock().iter().map(|(_, b)| b.clone()).collect()
    }

    pub fn request_ids(&self) -> Vec<String> {
        self.admitted
            .lock()
            .iter()
            .map(|(_, b)| b.request_id.clone())
            .collect()
    }

    pub fn auctions(&self) -> Vec<String> {
        self.admitted.lock().iter().map(|(a, _)| a.clone()).collect()
    }
}

impl BidAcceptor for CollectingAcceptor {
    fn accept(&self, auction: &AuctionRef, bid: Bid) {
        self.admitted
            .lock()
            .push((auction.auction_id().to_string(), bid));
    }
}

pub fn video_bid(n: usize) -> Bid {
    Bid {
        auction_id: "auction-1".to_string(),
        request_id: format!("req-{}", n),
        bidder: "nexverse".to_string(),
        ad_id: format!("ad-{}", n),
        vast_url: Some(format!("http://x/vast-{}.xml", n)),
        ttl: 60,
        ..Default::default()
    }
}

/// Completion callback that bumps a shared counter.
pub fn counter() -> (Arc<AtomicUsize>, impl Fn() -> videocache::OnDone) {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&count);
    let make = move || -> videocache::OnDone {
        let count = Arc::clone(&handle);
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    };
    (count, make)
}
