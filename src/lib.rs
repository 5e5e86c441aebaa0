//! Queue-driven file ingestion: OCR/extraction, thumbnailing, embedding,
//! and search indexing, horizontally scaled across worker processes.

pub mod backfill;
pub mod broker;
pub mod config;
pub mod dlq;
pub mod enrichment;
pub mod error;
pub mod health;
pub mod index;
pub mod model;
pub mod object_store;
pub mod ocr;
pub mod preview;
pub mod processor;
pub mod resource;
pub mod state;
pub mod worker_runtime;

pub use error::ProcessingError;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shared logging bootstrap for every binary: `RUST_LOG`/`LOG_LEVEL`-driven
/// `EnvFilter` plus the default `fmt` layer, matching the reference crate's
/// `main.rs` setup.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_level.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
