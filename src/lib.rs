//! # Video Cache
//!
//! Stores oversized VAST documents for video bids on a remote cache server
//! and hands back short identifiers that fit inside ad-server request
//! parameters, with an in-process fallback that needs no remote store.
//!
//! ## Layout
//! - [`vast`]: wrapper VAST documents
//! - [`translator`]: bid → store payload
//! - [`adapter`]: raw store response → identifier list
//! - [`batcher`]: debounced, size-bounded batching
//! - [`orchestrator`]: one store call per batch, per-bid attribution
//! - [`local_cache`]: in-process VAST keyed by bidder and ad id
//! - [`service`]: the wiring owned by an auction manager

pub mod adapter;
pub mod batcher;
pub mod config;
pub mod error;
pub mod local_cache;
pub mod orchestrator;
pub mod scheduler;
pub mod service;
pub mod translator;
pub mod transport;
pub mod types;
pub mod vast;

pub use batcher::{BatchEntry, Batcher};
pub use config::CacheConfig;
pub use error::CacheError;
pub use local_cache::LocalCacheStore;
pub use orchestrator::{CacheStats, FlushReport, StoreOrchestrator};
pub use scheduler::{ManualScheduler, ScheduledTask, Scheduler, TokioScheduler};
pub use service::{CacheRoute, VideoCacheService};
pub use translator::{cache_url, to_payload, StoragePayload, StoreRequest};
pub use transport::{CacheTransport, HttpTransport};
pub use types::{Auction, AuctionLookup, AuctionRef, Bid, BidAcceptor, NoAuctionLookup, OnDone};
pub use vast::wrap;
