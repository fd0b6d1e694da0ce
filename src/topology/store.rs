/*!
This module provides the authoritative in-memory model of the crawled DHT.

This module defines:
- `TopologyStore`: peers keyed by `PeerId` plus the append-only log of observed edges.
- `IngestReport`: what a single `ingest` call added.

Nodes are materialized on first reference (as a crawl target or as someone's neighbor) and
are never removed during a session.
*/

use std::{
    collections::{HashMap, HashSet},
    time::SystemTime,
};

use serde::Serialize;

use crate::network::{
    edge::Edge,
    peer::{PeerId, PeerInfo, PeerNode},
};

/// Counts of what an `ingest` call added to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub new_nodes: usize,
    pub new_edges: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct TopologyStore {
    /// Nodes in first-observation order.
    nodes: Vec<PeerNode>,
    #[serde(skip)]
    index: HashMap<PeerId, usize>,
    /// Every observed edge, duplicates included.
    edge_log: Vec<Edge>,
}

impl TopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successfully decoded snapshot of `info.id`.
    pub fn ingest(&mut self, info: PeerInfo, source_address: Option<&str>) -> IngestReport {
        self.ingest_at(info, source_address, SystemTime::now())
    }

    /// Same as `ingest` with an explicit probe timestamp.
    pub fn ingest_at(
        &mut self,
        info: PeerInfo,
        source_address: Option<&str>,
        timestamp: SystemTime,
    ) -> IngestReport {
        let nodes_before = self.nodes.len();
        let edges_before = self.edge_log.len();

        let origin = info.id.clone();
        {
            let node = self.upsert(&origin);
            if node.address.is_none() {
                node.address = source_address.map(str::to_string);
            }
        }

        for (_, entry) in info.neighbors() {
            let neighbor = self.upsert(&entry.id);
            // first address learned wins, later reports never overwrite it
            if neighbor.address.is_none() {
                neighbor.address = Some(entry.address.clone());
            }
            self.edge_log.push(Edge::new(origin.clone(), entry.id.clone()));
        }

        let node = self.upsert(&origin);
        node.last_info = Some(info);
        node.last_probed = Some(timestamp);

        IngestReport {
            new_nodes: self.nodes.len() - nodes_before,
            new_edges: self.edge_log.len() - edges_before,
        }
    }

    fn upsert(&mut self, id: &PeerId) -> &mut PeerNode {
        let position = match self.index.get(id) {
            Some(&position) => position,
            None => {
                self.nodes.push(PeerNode::new(id.clone()));
                let position = self.nodes.len() - 1;
                self.index.insert(id.clone(), position);
                position
            }
        };
        &mut self.nodes[position]
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &PeerNode> {
        self.nodes.iter()
    }

    pub fn node_by_id(&self, id: &PeerId) -> Option<&PeerNode> {
        self.index.get(id).map(|&position| &self.nodes[position])
    }

    /// Edges with duplicate `from-to` keys removed, in order of first observation.
    pub fn deduped_edges(&self) -> Vec<Edge> {
        let mut seen = HashSet::with_capacity(self.edge_log.len());
        self.edge_log
            .iter()
            .filter(|edge| seen.insert(edge.key()))
            .cloned()
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_log_len(&self) -> usize {
        self.edge_log.len()
    }

    /// Peers with a known address whose own snapshot has not been ingested yet.
    pub fn unprobed_with_address(&self) -> impl Iterator<Item = &PeerNode> {
        self.nodes
            .iter()
            .filter(|node| !node.is_probed() && node.address.is_some())
    }
}
