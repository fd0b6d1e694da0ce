/*!
Seeding and probing peers.

A crawl step is split in two so that the network part can run on the async runtime while
the store is only touched from the control loop:
- `fetch`: network + decode, no store access, yields a `CrawlCompletion`.
- `apply`: ingests a completion into the `TopologyStore` in one go.

`seed` and `probe` chain both halves for callers that own the store across the await.
*/

use std::{collections::HashSet, sync::Arc};

use tracing::{debug, info};

use crate::{
    network::peer::{PeerId, PeerInfo},
    parsers::info_payload,
    topology::{
        source::{CrawlError, CrawlResult, InfoSource},
        store::TopologyStore,
    },
};

/// What to fetch and how to ingest the answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CrawlRequest {
    /// Initial fetch; the address is recorded as the peer's address.
    Seed { address: String },
    /// Re-probe of a known peer; its address is never overwritten.
    Probe { id: PeerId, address: String },
}

impl CrawlRequest {
    pub fn address(&self) -> &str {
        match self {
            CrawlRequest::Seed { address } => address,
            CrawlRequest::Probe { address, .. } => address,
        }
    }
}

/// Outcome of the network half of a crawl step.
#[derive(Debug)]
pub struct CrawlCompletion {
    pub request: CrawlRequest,
    pub result: CrawlResult<PeerInfo>,
}

impl CrawlCompletion {
    /// The peer a failed probe was aimed at.
    pub fn failed_peer(&self) -> Option<&PeerId> {
        match (&self.request, &self.result) {
            (CrawlRequest::Probe { id, .. }, Err(_)) => Some(id),
            _ => None,
        }
    }
}

/// Peers whose last probe failed. They stay out of the frontier until probed by hand.
#[derive(Debug, Clone, Default)]
pub struct FailedPeers(HashSet<PeerId>);

impl FailedPeers {
    /// Records the outcome of a completion before it is applied.
    pub fn note(&mut self, completion: &CrawlCompletion) {
        match (&completion.request, completion.failed_peer()) {
            (_, Some(id)) => {
                self.0.insert(id.clone());
            }
            (CrawlRequest::Probe { id, .. }, None) => {
                self.0.remove(id);
            }
            (CrawlRequest::Seed { .. }, None) => {}
        }
    }

    pub fn forget(&mut self, id: &PeerId) {
        self.0.remove(id);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Signals emitted after a completion has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    TopologyChanged,
    SelectionChanged(PeerId),
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Probe every newly discovered peer automatically.
    pub auto_crawl: bool,
    /// Number of frontier waves the automatic crawl may follow from the seed.
    pub max_depth: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            auto_crawl: false,
            max_depth: 3,
        }
    }
}

#[derive(Clone)]
pub struct CrawlController {
    source: Arc<dyn InfoSource>,
}

impl CrawlController {
    pub fn new(source: Arc<dyn InfoSource>) -> Self {
        Self { source }
    }

    pub fn seed_request(&self, address: &str) -> CrawlRequest {
        CrawlRequest::Seed {
            address: address.to_string(),
        }
    }

    /// Fails with `UnknownAddress` if no address was ever learned for `id`.
    pub fn probe_request(&self, store: &TopologyStore, id: &PeerId) -> CrawlResult<CrawlRequest> {
        let address = store
            .node_by_id(id)
            .and_then(|node| node.address.clone())
            .ok_or_else(|| CrawlError::UnknownAddress(id.clone()))?;
        Ok(CrawlRequest::Probe {
            id: id.clone(),
            address,
        })
    }

    /// Probe requests for every known-but-unprobed peer that has not failed already.
    pub fn frontier_requests(&self, store: &TopologyStore, failed: &FailedPeers) -> Vec<CrawlRequest> {
        store
            .unprobed_with_address()
            .filter(|node| !failed.contains(&node.id))
            .filter_map(|node| {
                node.address.as_ref().map(|address| CrawlRequest::Probe {
                    id: node.id.clone(),
                    address: address.clone(),
                })
            })
            .collect()
    }

    /// Network and decode half. Never touches the store.
    pub async fn fetch(&self, request: CrawlRequest) -> CrawlCompletion {
        let result = match self.source.fetch_info(request.address()).await {
            Ok(body) => info_payload::decode(&body)
                .map_err(CrawlError::from)
                .and_then(|info| check_identity(&request, info)),
            Err(e) => Err(e),
        };
        CrawlCompletion { request, result }
    }

    /// Ingests a completion. A failed completion leaves the store untouched.
    pub fn apply(
        &self,
        store: &mut TopologyStore,
        completion: CrawlCompletion,
    ) -> CrawlResult<Vec<CrawlEvent>> {
        let info = check_identity(&completion.request, completion.result?)?;
        match completion.request {
            CrawlRequest::Seed { address } => {
                let report = store.ingest(info, Some(&address));
                info!(%address, new_nodes = report.new_nodes, new_edges = report.new_edges, "seeded");
                Ok(vec![CrawlEvent::TopologyChanged])
            }
            CrawlRequest::Probe { id, address } => {
                let report = store.ingest(info, None);
                info!(peer = %id, %address, new_nodes = report.new_nodes, new_edges = report.new_edges, "probed");
                Ok(vec![CrawlEvent::TopologyChanged, CrawlEvent::SelectionChanged(id)])
            }
        }
    }

    #[cfg(test)]
    pub async fn seed(
        &self,
        store: &mut TopologyStore,
        address: &str,
    ) -> CrawlResult<Vec<CrawlEvent>> {
        let completion = self.fetch(self.seed_request(address)).await;
        self.apply(store, completion)
    }

    #[cfg(test)]
    pub async fn probe(&self, store: &mut TopologyStore, id: &PeerId) -> CrawlResult<Vec<CrawlEvent>> {
        let request = self.probe_request(store, id)?;
        let completion = self.fetch(request).await;
        self.apply(store, completion)
    }
}

/// A probe answer must come from the peer that was asked.
fn check_identity(request: &CrawlRequest, info: PeerInfo) -> CrawlResult<PeerInfo> {
    match request {
        CrawlRequest::Probe { id, address } if info.id != *id => {
            debug!(requested = %id, reported = %info.id, "peer answered with a different id");
            Err(CrawlError::IdMismatch {
                address: address.clone(),
                requested: id.clone(),
                reported: info.id,
            })
        }
        _ => Ok(info),
    }
}
