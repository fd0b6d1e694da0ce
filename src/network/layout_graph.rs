use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
};

use egui::{Pos2, Vec2};
use petgraph::{
    Directed,
    stable_graph::{EdgeIndex, NodeIndex, StableGraph},
};
use tracing::debug;

use crate::{
    network::{edge::EdgeKey, peer::PeerId},
    topology::store::TopologyStore,
};

/// Physics state of a peer in the layout. Lives as long as the peer stays in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub id: PeerId,
    /// `None` until the simulation places the node.
    pub position: Option<Pos2>,
    pub velocity: Vec2,
}

impl LayoutNode {
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            position: None,
            velocity: Vec2::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEdge {
    pub key: EdgeKey,
}

/// Per-frame copy of positions handed to the renderer.
#[derive(Debug, Clone, Default)]
pub struct RenderProjection {
    pub nodes: Vec<RenderedNode>,
    pub links: Vec<RenderedLink>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedNode {
    pub id: PeerId,
    pub position: Pos2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedLink {
    pub key: EdgeKey,
    pub from: Pos2,
    pub to: Pos2,
}

/// What a reconcile pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added_nodes: Vec<PeerId>,
    pub removed_nodes: Vec<PeerId>,
    pub added_edges: Vec<EdgeKey>,
    pub removed_edges: Vec<EdgeKey>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
    }
}

/// The layout engine's view of the topology.
///
/// Node and edge indices are stable for as long as the entity exists, which is what keeps
/// positions and velocities alive across reconcile passes.
#[derive(Default)]
pub struct LayoutGraph {
    pub graph: StableGraph<LayoutNode, LayoutEdge, Directed>,
    pub node_id_to_index_map: HashMap<PeerId, NodeIndex>,
    pub edge_key_to_index_map: HashMap<EdgeKey, EdgeIndex>,
    pub projection: RenderProjection,
}

impl LayoutGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_index(&self, id: &PeerId) -> Option<NodeIndex> {
        self.node_id_to_index_map.get(id).copied()
    }

    #[cfg(test)]
    pub fn node(&self, id: &PeerId) -> Option<&LayoutNode> {
        self.node_index(id).and_then(|index| self.graph.node_weight(index))
    }

    #[cfg(test)]
    pub fn node_mut(&mut self, id: &PeerId) -> Option<&mut LayoutNode> {
        let index = self.node_index(id)?;
        self.graph.node_weight_mut(index)
    }

    #[cfg(test)]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[cfg(test)]
    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.edge_key_to_index_map.contains_key(key)
    }

    // Reconcile the graph in place to match the store.
    // - Keeps index, position and velocity of nodes that persist
    // - Adds new nodes unplaced
    // - Removes vanished nodes (and their edges)
    // - Diffs edges by key instead of rebuilding them
    pub fn reconcile(&mut self, store: &TopologyStore) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        // 1) Nodes
        let desired_nodes: HashSet<&PeerId> = store.all_nodes().map(|node| &node.id).collect();

        let to_remove: Vec<PeerId> = self
            .node_id_to_index_map
            .keys()
            .filter(|id| !desired_nodes.contains(id))
            .cloned()
            .collect();
        for id in to_remove {
            if let Some(index) = self.node_id_to_index_map.remove(&id) {
                // removing a node drops its incident edges
                self.graph.remove_node(index);
                report.removed_nodes.push(id);
            }
        }
        // forget edge keys whose edge went away with a node
        let graph = &self.graph;
        let mut dropped_with_nodes = Vec::new();
        self.edge_key_to_index_map.retain(|key, index| {
            let alive = graph.edge_weight(*index).is_some_and(|edge| &edge.key == key);
            if !alive {
                dropped_with_nodes.push(key.clone());
            }
            alive
        });
        report.removed_edges.extend(dropped_with_nodes);

        for node in store.all_nodes() {
            if !self.node_id_to_index_map.contains_key(&node.id) {
                let index = self.graph.add_node(LayoutNode::new(node.id.clone()));
                self.node_id_to_index_map.insert(node.id.clone(), index);
                report.added_nodes.push(node.id.clone());
            }
        }

        // 2) Edges
        let desired_edges = store.deduped_edges();
        let desired_keys: HashSet<EdgeKey> = desired_edges.iter().map(|edge| edge.key()).collect();

        let stale_edges: Vec<EdgeKey> = self
            .edge_key_to_index_map
            .keys()
            .filter(|key| !desired_keys.contains(*key))
            .cloned()
            .collect();
        for key in stale_edges {
            if let Some(index) = self.edge_key_to_index_map.remove(&key) {
                self.graph.remove_edge(index);
                report.removed_edges.push(key);
            }
        }

        for edge in desired_edges {
            let key = edge.key();
            if self.edge_key_to_index_map.contains_key(&key) {
                continue;
            }
            let (Some(from), Some(to)) = (self.node_index(&edge.from), self.node_index(&edge.to))
            else {
                // store invariant guarantees both endpoints, skip rather than panic
                continue;
            };
            let index = self.graph.add_edge(from, to, LayoutEdge { key: key.clone() });
            self.edge_key_to_index_map.insert(key.clone(), index);
            report.added_edges.push(key);
        }

        debug!(
            added_nodes = report.added_nodes.len(),
            removed_nodes = report.removed_nodes.len(),
            added_edges = report.added_edges.len(),
            removed_edges = report.removed_edges.len(),
            "layout reconciled"
        );
        report
    }

    /// Copies current positions into the render projection, recomputing link endpoints.
    pub fn refresh_projection(&mut self) {
        self.projection.nodes.clear();
        self.projection.links.clear();

        for index in self.graph.node_indices() {
            let node = &self.graph[index];
            if let Some(position) = node.position {
                self.projection.nodes.push(RenderedNode {
                    id: node.id.clone(),
                    position,
                });
            }
        }

        for index in self.graph.edge_indices() {
            let Some((from, to)) = self.graph.edge_endpoints(index) else {
                continue;
            };
            if let (Some(from_pos), Some(to_pos)) =
                (self.graph[from].position, self.graph[to].position)
            {
                self.projection.links.push(RenderedLink {
                    key: self.graph[index].key.clone(),
                    from: from_pos,
                    to: to_pos,
                });
            }
        }
    }
}

impl Display for LayoutGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "LayoutGraph: {} nodes, {} edges",
            self.graph.node_count(),
            self.graph.edge_count()
        )?;
        for index in self.graph.node_indices() {
            let node = &self.graph[index];
            match node.position {
                Some(pos) => writeln!(f, "  {} @ ({:.1}, {:.1})", node.id, pos.x, pos.y)?,
                None => writeln!(f, "  {} (unplaced)", node.id)?,
            }
        }
        for index in self.graph.edge_indices() {
            writeln!(f, "  {}", self.graph[index].key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::store::tests::info;

    fn seeded_store() -> TopologyStore {
        let mut store = TopologyStore::new();
        store.ingest(info("A", &[&[("B", "h2")]]), Some("h1"));
        store
    }

    #[test]
    fn test_reconcile_from_empty() {
        let store = seeded_store();
        let mut layout = LayoutGraph::new();

        let report = layout.reconcile(&store);
        assert_eq!(report.added_nodes, [PeerId::from("A"), PeerId::from("B")]);
        assert_eq!(report.added_edges, [EdgeKey::from("A-B")]);
        assert_eq!(layout.node_count(), 2);
        assert_eq!(layout.edge_count(), 1);
        assert!(layout.node(&"A".into()).unwrap().position.is_none());
    }

    #[test]
    fn test_reconcile_preserves_existing_nodes() {
        let mut store = seeded_store();
        let mut layout = LayoutGraph::new();
        layout.reconcile(&store);

        let b_index = layout.node_index(&"B".into()).unwrap();
        {
            let b = layout.node_mut(&"B".into()).unwrap();
            b.position = Some(Pos2::new(12.0, -4.0));
            b.velocity = Vec2::new(0.5, 0.25);
        }
        let before = layout.node(&"B".into()).unwrap().clone();

        // new edge pointing at the already known B
        store.ingest(info("C", &[&[("B", "h2"), ("A", "h1")]]), None);
        let report = layout.reconcile(&store);

        assert_eq!(report.added_nodes, [PeerId::from("C")]);
        assert_eq!(report.added_edges, [EdgeKey::from("C-B"), EdgeKey::from("C-A")]);
        assert_eq!(layout.node_index(&"B".into()), Some(b_index));
        assert_eq!(layout.node(&"B".into()).unwrap(), &before);

        let c_to_b = layout.edge_key_to_index_map[&EdgeKey::from("C-B")];
        let (_, target) = layout.graph.edge_endpoints(c_to_b).unwrap();
        assert_eq!(target, b_index);
    }

    #[test]
    fn test_reconcile_twice_is_a_no_op() {
        let store = seeded_store();
        let mut layout = LayoutGraph::new();
        layout.reconcile(&store);

        let report = layout.reconcile(&store);
        assert!(report.is_empty());
        assert_eq!(layout.edge_count(), 1);
    }

    #[test]
    fn test_reconcile_removes_what_the_store_lacks() {
        let mut layout = LayoutGraph::new();
        layout.reconcile(&seeded_store());

        let mut other = TopologyStore::new();
        other.ingest(info("A", &[&[("C", "h3")]]), Some("h1"));
        let a_index = layout.node_index(&"A".into()).unwrap();

        let report = layout.reconcile(&other);
        assert_eq!(report.removed_nodes, [PeerId::from("B")]);
        assert_eq!(report.removed_edges, [EdgeKey::from("A-B")]);
        assert_eq!(report.added_edges, [EdgeKey::from("A-C")]);
        assert_eq!(layout.node_index(&"A".into()), Some(a_index));
        assert!(layout.node(&"B".into()).is_none());
        assert!(!layout.contains_edge(&EdgeKey::from("A-B")));
        assert_eq!(layout.node_count(), 2);
        assert_eq!(layout.edge_count(), 1);
    }

    #[test]
    fn test_mutual_neighbors_get_two_links() {
        let mut store = seeded_store();
        store.ingest(info("B", &[&[("A", "h1")]]), None);
        let mut layout = LayoutGraph::new();
        layout.reconcile(&store);

        assert!(layout.contains_edge(&EdgeKey::from("A-B")));
        assert!(layout.contains_edge(&EdgeKey::from("B-A")));
        assert_eq!(layout.edge_count(), 2);
    }

    #[test]
    fn test_projection_skips_unplaced_nodes() {
        let store = seeded_store();
        let mut layout = LayoutGraph::new();
        layout.reconcile(&store);
        layout.node_mut(&"A".into()).unwrap().position = Some(Pos2::new(1.0, 2.0));

        layout.refresh_projection();
        assert_eq!(layout.projection.nodes.len(), 1);
        assert!(layout.projection.links.is_empty());

        layout.node_mut(&"B".into()).unwrap().position = Some(Pos2::new(3.0, 4.0));
        layout.refresh_projection();
        assert_eq!(
            layout.projection.links,
            [RenderedLink {
                key: "A-B".into(),
                from: Pos2::new(1.0, 2.0),
                to: Pos2::new(3.0, 4.0),
            }]
        );
    }
}
