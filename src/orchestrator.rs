//! Store orchestration: one network call per batch, results attributed back
//! to the bids that produced them.
//!
//! A batch is all-or-nothing at the protocol level. Transport failures,
//! malformed responses and identifier-count mismatches discard every bid in
//! it. A bid that cannot be translated is dropped before the call, and a
//! rejected key (empty identifier) drops a single bid after it. Failed
//! batches are not retried here.

use crate::adapter;
use crate::batcher::BatchEntry;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::translator::{cache_url, to_payload, StoragePayload, StoreRequest};
use crate::transport::CacheTransport;
use crate::types::{AuctionLookup, AuctionRef, Bid, BidAcceptor, OnDone};
use log::{debug, error, warn};
use parking_lot::RwLock;
use std::sync::Arc;

/// Outcome of one successful flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Bids handed to the acceptance path
    pub admitted: usize,
    /// Bids dropped because the store rejected their key
    pub rejected: usize,
    /// Bids dropped before the store call because they had no usable VAST
    pub invalid: usize,
}

/// Running counters across all flushes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub batches_flushed: u64,
    pub batches_failed: u64,
    pub bids_admitted: u64,
    pub keys_rejected: u64,
    pub bids_invalid: u64,
}

/// Sends batches to the remote store and admits each bid under the
/// identifier the store returned for it.
pub struct StoreOrchestrator {
    transport: Arc<dyn CacheTransport>,
    lookup: Arc<dyn AuctionLookup>,
    acceptor: Arc<dyn BidAcceptor>,
    config: CacheConfig,
    stats: RwLock<CacheStats>,
}

impl StoreOrchestrator {
    pub fn new(
        config: CacheConfig,
        transport: Arc<dyn CacheTransport>,
        lookup: Arc<dyn AuctionLookup>,
        acceptor: Arc<dyn BidAcceptor>,
    ) -> Self {
        Self {
            transport,
            lookup,
            acceptor,
            config,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.read()
    }

    /// Store `bids` with a single call and return their identifiers in order.
    ///
    /// No attribution happens here and the identifier count is not checked.
    pub async fn store(&self, bids: &[Bid]) -> Result<Vec<String>, CacheError> {
        let puts = bids
            .iter()
            .map(|bid| to_payload(bid, self.lookup.as_ref(), self.config.vast_track))
            .collect::<Result<Vec<_>, _>>()?;
        self.send(puts).await
    }

    async fn send(&self, puts: Vec<StoragePayload>) -> Result<Vec<String>, CacheError> {
        let body = serde_json::to_string(&StoreRequest { puts })
            .map_err(|e| CacheError::Parse(format!("Failed to serialize store request: {}", e)))?;

        adapter::interpret(self.transport.post_json(&self.config.url, body).await)
    }

    /// Store one batch and admit every bid that received an identifier.
    ///
    /// Bids that fail translation are dropped with a warning and the rest of
    /// the batch is still sent. Errors are logged here and returned for the
    /// caller's bookkeeping; no bid of a failed batch reaches the acceptance
    /// path.
    pub async fn flush(&self, batch: Vec<BatchEntry>) -> Result<FlushReport, CacheError> {
        if batch.is_empty() {
            return Ok(FlushReport::default());
        }

        let mut report = FlushReport::default();
        let mut valid = Vec::with_capacity(batch.len());
        let mut puts = Vec::with_capacity(batch.len());
        for entry in batch {
            match to_payload(&entry.bid, self.lookup.as_ref(), self.config.vast_track) {
                Ok(put) => {
                    puts.push(put);
                    valid.push(entry);
                }
                Err(e) => {
                    warn!(
                        "Dropping bid {} from {} before store: {}",
                        entry.bid.request_id, entry.bid.bidder, e
                    );
                    report.invalid += 1;
                }
            }
        }

        if report.invalid > 0 {
            self.stats.write().bids_invalid += report.invalid as u64;
        }
        if valid.is_empty() {
            debug!("No storable bids left in batch of {}", report.invalid);
            return Ok(report);
        }

        let expected = valid.len();
        debug!("Flushing batch of {} bids to {}", expected, self.config.url);

        let result = self.send(puts).await.and_then(|ids| {
            if ids.len() == expected {
                Ok(ids)
            } else {
                Err(CacheError::CountMismatch {
                    expected,
                    actual: ids.len(),
                })
            }
        });

        let ids = match result {
            Ok(ids) => ids,
            Err(e) => {
                self.stats.write().batches_failed += 1;
                error!("Discarding batch of {} bids: {}", expected, e);
                return Err(e);
            }
        };

        for (entry, id) in valid.into_iter().zip(ids) {
            let BatchEntry {
                auction,
                mut bid,
                on_done,
            } = entry;

            if id.is_empty() {
                warn!(
                    "Cache rejected key for bid {} from {}, bid not admitted",
                    bid.request_id, bid.bidder
                );
                report.rejected += 1;
                continue;
            }

            bid.video_cache_key = Some(id);
            self.admit(&auction, bid, on_done);
            report.admitted += 1;
        }

        {
            let mut stats = self.stats.write();
            stats.batches_flushed += 1;
            stats.bids_admitted += report.admitted as u64;
            stats.keys_rejected += report.rejected as u64;
        }

        debug!(
            "Batch flushed: {} admitted, {} rejected, {} invalid",
            report.admitted, report.rejected, report.invalid
        );
        Ok(report)
    }

    /// Admit a bid that already carries its cache key.
    ///
    /// A bid without its own playback URL gets the retrieval URL for its key.
    pub fn admit(&self, auction: &AuctionRef, mut bid: Bid, on_done: OnDone) {
        if !bid.has_vast_url() {
            if let Some(key) = bid.video_cache_key.as_deref() {
                bid.vast_url = Some(cache_url(&self.config.url, key));
            }
        }
        self.acceptor.accept(auction, bid);
        on_done();
    }
}
