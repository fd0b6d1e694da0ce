use std::fmt::Display;

use serde::Serialize;

use crate::network::peer::PeerId;

/// Directed observation: `from` lists `to` in one of its buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: PeerId,
    pub to: PeerId,
}

impl Edge {
    pub fn new(from: PeerId, to: PeerId) -> Self {
        Self { from, to }
    }

    /// Dedup identity. Ordered, so `A-B` and `B-A` are different edges.
    pub fn key(&self) -> EdgeKey {
        EdgeKey(format!("{}-{}", self.from, self.to))
    }
}

/// String identity of an edge (`"{from}-{to}"`), shared by the store and the layout graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeKey(String);

impl EdgeKey {
    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EdgeKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
