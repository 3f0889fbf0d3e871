//! Debounced, size-bounded batching of store requests.
//!
//! Bids arrive one at a time. The first bid after an idle period opens a
//! debounce window; every bid submitted before the window elapses joins the
//! queue. When it fires, each accumulated batch is flushed with its own store
//! call and the queue resets.
//!
//! Queue mutation happens under a short lock that is never held across an
//! await. Flushes from different windows may overlap; each batch is flushed
//! exactly once and nothing orders their completion.

use crate::orchestrator::StoreOrchestrator;
use crate::scheduler::Scheduler;
use crate::types::{AuctionRef, Bid, OnDone};
use futures::future::join_all;
use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// One bid waiting to be stored, with the auction it belongs to and the
/// callback to run once it is admitted.
pub struct BatchEntry {
    pub auction: AuctionRef,
    pub bid: Bid,
    pub on_done: OnDone,
}

impl std::fmt::Debug for BatchEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEntry")
            .field("auction", &self.auction.auction_id())
            .field("request_id", &self.bid.request_id)
            .field("bidder", &self.bid.bidder)
            .finish()
    }
}

#[derive(Default)]
struct BatchQueue {
    batches: Vec<Vec<BatchEntry>>,
    window_active: bool,
}

impl BatchQueue {
    /// Append to the last batch, opening a new one when it is full.
    fn push(&mut self, entry: BatchEntry, max_size: usize) {
        let needs_new = self
            .batches
            .last()
            .map_or(true, |batch| batch.len() >= max_size);
        if needs_new {
            self.batches.push(Vec::with_capacity(max_size));
        }
        if let Some(batch) = self.batches.last_mut() {
            batch.push(entry);
        }
    }

    /// Take every non-empty batch and close the window.
    fn drain(&mut self) -> Vec<Vec<BatchEntry>> {
        self.window_active = false;
        std::mem::take(&mut self.batches)
            .into_iter()
            .filter(|batch| !batch.is_empty())
            .collect()
    }
}

/// Collects submitted bids into batches of at most `max_size` and flushes
/// them through the orchestrator when the debounce window elapses.
pub struct Batcher {
    queue: Arc<Mutex<BatchQueue>>,
    orchestrator: Arc<StoreOrchestrator>,
    scheduler: Arc<dyn Scheduler>,
    max_size: usize,
    delay: Duration,
}

impl Batcher {
    /// `max_size` below one is treated as one.
    pub fn new(
        orchestrator: Arc<StoreOrchestrator>,
        scheduler: Arc<dyn Scheduler>,
        max_size: usize,
        delay: Duration,
    ) -> Self {
        Self {
            queue: Arc::new(Mutex::new(BatchQueue::default())),
            orchestrator,
            scheduler,
            max_size: max_size.max(1),
            delay,
        }
    }

    /// Queue a bid for storage.
    ///
    /// `on_done` runs after the bid has been admitted to `auction`. It never
    /// runs for a bid whose batch fails or whose key the store rejects.
    pub fn submit(&self, auction: AuctionRef, bid: Bid, on_done: OnDone) {
        let open_window = {
            let mut queue = self.queue.lock();
            queue.push(
                BatchEntry {
                    auction,
                    bid,
                    on_done,
                },
                self.max_size,
            );
            !std::mem::replace(&mut queue.window_active, true)
        };

        if open_window {
            debug!("Opening {}ms batch window", self.delay.as_millis());
            let queue = Arc::clone(&self.queue);
            let orchestrator = Arc::clone(&self.orchestrator);
            self.scheduler
                .schedule(self.delay, Box::pin(flush_all(queue, orchestrator)));
        }
    }

    /// Bids queued and not yet flushed.
    pub fn queued(&self) -> usize {
        self.queue.lock().batches.iter().map(Vec::len).sum()
    }
}

async fn flush_all(queue: Arc<Mutex<BatchQueue>>, orchestrator: Arc<StoreOrchestrator>) {
    let batches = queue.lock().drain();
    debug!("Batch window elapsed, flushing {} batches", batches.len());

    let flushes = batches.into_iter().map(|batch| {
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.flush(batch).await }
    });

    let results = join_all(flushes).await;
    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        debug!("{} of {} batches discarded", failed, results.len());
    }
}
