/*!
Crawl-facing peer info provider interface.

This module defines:
- `CrawlError`: the error kinds a single seed or probe can end with.
- `InfoSource`: an async trait that returns the raw body of a peer's info endpoint.

Transports (e.g. plain HTTP) implement `InfoSource`; decoding happens in the crawl controller.
*/

use async_trait::async_trait;
use thiserror::Error;

use crate::{network::peer::PeerId, parsers::info_payload::MalformedPayload};

/// Error type for a single seed or probe. None of them leave a partial ingest behind.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    MalformedPayload(#[from] MalformedPayload),
    #[error("network failure for {address}: {reason}")]
    NetworkFailure { address: String, reason: String },
    #[error("no address known for peer {0}")]
    UnknownAddress(PeerId),
    #[error("peer at {address} answered as {reported}, expected {requested}")]
    IdMismatch {
        address: String,
        requested: PeerId,
        reported: PeerId,
    },
}

impl CrawlError {
    pub fn network(address: &str, reason: impl ToString) -> Self {
        CrawlError::NetworkFailure {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A small async interface for retrieving a peer's `/info` body.
#[async_trait]
pub trait InfoSource: Send + Sync {
    async fn fetch_info(&self, address: &str) -> Result<String, CrawlError>;
}

/// Convenience result alias for crawl operations.
pub type CrawlResult<T> = Result<T, CrawlError>;
