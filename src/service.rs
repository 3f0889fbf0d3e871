//! Video cache service - the root that wires batching, remote storage and
//! the local fallback together for one auction manager.
//!
//! The service is owned by whatever owns the auction manager and is handed
//! to callers; nothing in this crate is process-global.

use crate::batcher::Batcher;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::local_cache::LocalCacheStore;
use crate::orchestrator::{CacheStats, StoreOrchestrator};
use crate::scheduler::Scheduler;
use crate::translator::vast_content;
use crate::transport::CacheTransport;
use crate::types::{AuctionLookup, AuctionRef, Bid, BidAcceptor, OnDone};
use log::{info, warn};
use std::sync::Arc;

/// How a bid was routed by [`VideoCacheService::cache_bid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheRoute {
    /// Stored in process and admitted immediately
    Local,
    /// Bidder-assigned cache key kept, admitted immediately
    BidderKey,
    /// Queued for the remote store
    Batched,
}

/// Entry point for caching video bids: routes each bid to the local store,
/// its bidder key, or the batched remote store.
pub struct VideoCacheService {
    config: CacheConfig,
    transport: Arc<dyn CacheTransport>,
    orchestrator: Arc<StoreOrchestrator>,
    batcher: Batcher,
    local: LocalCacheStore,
}

impl VideoCacheService {
    pub fn new(
        config: CacheConfig,
        transport: Arc<dyn CacheTransport>,
        scheduler: Arc<dyn Scheduler>,
        lookup: Arc<dyn AuctionLookup>,
        acceptor: Arc<dyn BidAcceptor>,
    ) -> Result<Self, CacheError> {
        config.validate()?;

        let orchestrator = Arc::new(StoreOrchestrator::new(
            config.clone(),
            Arc::clone(&transport),
            lookup,
            acceptor,
        ));
        let batcher = Batcher::new(
            Arc::clone(&orchestrator),
            scheduler,
            config.batch_size,
            config.batch_timeout(),
        );
        let local = LocalCacheStore::new(config.local_placeholder_prefix.clone());

        info!(
            "Video cache ready: url={} batch_size={} batch_timeout={}ms local={}",
            config.url, config.batch_size, config.batch_timeout_ms, config.use_local
        );

        Ok(Self {
            config,
            transport,
            orchestrator,
            batcher,
            local,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn local_cache(&self) -> &LocalCacheStore {
        &self.local
    }

    pub fn orchestrator(&self) -> &Arc<StoreOrchestrator> {
        &self.orchestrator
    }

    pub fn stats(&self) -> CacheStats {
        self.orchestrator.stats()
    }

    /// Bids waiting in the batch queue.
    pub fn queued(&self) -> usize {
        self.batcher.queued()
    }

    /// Cache a video bid and admit it to `auction` once it has a playable URL.
    ///
    /// - local mode: VAST kept in process, bid admitted now
    /// - bid already keyed by its bidder (and keys are not ignored): admitted now
    /// - otherwise: queued for the next batch flush
    pub fn cache_bid(
        &self,
        auction: AuctionRef,
        mut bid: Bid,
        on_done: OnDone,
    ) -> Result<CacheRoute, CacheError> {
        if self.config.use_local {
            self.local.store_locally(&mut bid)?;
            self.orchestrator.admit(&auction, bid, on_done);
            return Ok(CacheRoute::Local);
        }

        let has_key = bid.video_cache_key.as_deref().is_some_and(|k| !k.is_empty());
        if has_key && !self.config.ignore_bidder_cache_key {
            self.orchestrator.admit(&auction, bid, on_done);
            return Ok(CacheRoute::BidderKey);
        }

        if let Err(e) = vast_content(&bid) {
            warn!(
                "Bid {} from {} has no cacheable VAST, skipping: {}",
                bid.request_id, bid.bidder, e
            );
            return Err(e);
        }

        self.batcher.submit(auction, bid, on_done);
        Ok(CacheRoute::Batched)
    }

    /// Forward an auction-expiry notification to the local cache.
    pub fn handle_auction_expired(&self, bids: &[Bid]) {
        self.local.on_auction_expired(bids);
    }

    /// Combined ad-server wrapper with locally stored VAST spliced in.
    pub async fn resolve_local(&self, ad_server_tag_url: &str) -> Option<String> {
        self.local
            .resolve_via_ad_server(self.transport.as_ref(), ad_server_tag_url)
            .await
    }
}
