//! # Video Cache CLI
//!
//! Stores the VAST URLs given on the command line through the batching path
//! and prints the retrieval URL each one received.
//!
//! Configuration comes from `VIDEO_CACHE_*` environment variables; logging
//! is controlled by `RUST_LOG`.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use videocache::types::now_ms;
use videocache::{
    cache_url, Auction, AuctionLookup, AuctionRef, Bid, BidAcceptor, CacheConfig,
    HttpTransport, TokioScheduler, VideoCacheService,
};

struct CliAuction {
    id: String,
}

impl Auction for CliAuction {
    fn auction_id(&self) -> &str {
        &self.id
    }
}

/// Every bid belongs to the one auction started at launch.
struct CliLookup {
    started_at: u64,
}

impl AuctionLookup for CliLookup {
    fn auction_start(&self, _bid: &Bid) -> Option<u64> {
        Some(self.started_at)
    }
}

struct PrintingAcceptor {
    cache_base: String,
    admitted: Mutex<Vec<Bid>>,
}

impl BidAcceptor for PrintingAcceptor {
    fn accept(&self, auction: &AuctionRef, bid: Bid) {
        println!(
            "  ✓ [{}] {} -> {}",
            auction.auction_id(),
            bid.request_id,
            bid.video_cache_key
                .as_deref()
                .map(|key| cache_url(&self.cache_base, key))
                .unwrap_or_else(|| "-".to_string())
        );
        self.admitted.lock().push(bid);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let vast_urls: Vec<String> = std::env::args().skip(1).collect();
    if vast_urls.is_empty() {
        eprintln!("usage: video-cache-cli <vast-url>...");
        std::process::exit(2);
    }

    let config = match CacheConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {}", e);
            return Err(e.into());
        }
    };

    println!("=================================================");
    println!("  Video Cache - storing {} VAST URLs", vast_urls.len());
    println!("=================================================");
    println!("  - Endpoint: {}", config.url);
    println!("  - Batch size: {}", config.batch_size);
    println!("  - Batch window: {}ms", config.batch_timeout_ms);
    println!();

    let transport = Arc::new(HttpTransport::new(config.timeout())?);
    let acceptor = Arc::new(PrintingAcceptor {
        cache_base: config.url.clone(),
        admitted: Mutex::new(Vec::new()),
    });
    let wait = config.timeout() + config.batch_timeout() + Duration::from_millis(250);

    let service = VideoCacheService::new(
        config,
        transport,
        Arc::new(TokioScheduler),
        Arc::new(CliLookup {
            started_at: now_ms(),
        }),
        acceptor.clone(),
    )?;

    let auction: AuctionRef = Arc::new(CliAuction {
        id: Uuid::new_v4().to_string(),
    });
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let mut submitted = 0;
    for url in vast_urls {
        let bid = Bid {
            auction_id: auction.auction_id().to_string(),
            request_id: Uuid::new_v4().to_string(),
            bidder: "cli".to_string(),
            ad_id: Uuid::new_v4().to_string(),
            vast_url: Some(url.clone()),
            ttl: 300,
            ..Default::default()
        };
        let tx = tx.clone();
        match service.cache_bid(Arc::clone(&auction), bid, Box::new(move || {
            let _ = tx.send(());
        })) {
            Ok(_) => submitted += 1,
            Err(e) => eprintln!("  ✗ {}: {}", url, e),
        }
    }
    drop(tx);

    let mut done = 0;
    let _ = tokio::time::timeout(wait, async {
        while done < submitted && rx.recv().await.is_some() {
            done += 1;
        }
    })
    .await;

    let stats = service.stats();
    println!();
    println!("Cache Statistics:");
    println!("  - Admitted: {}/{}", acceptor.admitted.lock().len(), submitted);
    println!("  - Batches flushed: {}", stats.batches_flushed);
    println!("  - Batches failed: {}", stats.batches_failed);
    println!("  - Keys rejected: {}", stats.keys_rejected);
    println!("  - Invalid bids: {}", stats.bids_invalid);

    Ok(())
}
