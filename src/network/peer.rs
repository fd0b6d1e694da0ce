use std::{collections::BTreeMap, fmt::Display, time::SystemTime};

use serde::{Deserialize, Serialize};

/// Identity of a DHT peer as reported in its own `/info` and in its neighbors' buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One bucket of a peer's routing table, neighbors kept in the order the peer reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub entries: Vec<BucketEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntry {
    pub id: PeerId,
    pub address: String,
}

impl Bucket {
    pub fn new(entries: Vec<BucketEntry>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BucketEntry> {
        self.entries.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<I, S> FromIterator<(I, S)> for Bucket
where
    I: Into<PeerId>,
    S: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (I, S)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(id, address)| BucketEntry { id: id.into(), address: address.into() })
                .collect(),
        }
    }
}

/// Decoded `/info` snapshot of a single peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: PeerId,
    pub port: i64,
    pub buckets: Vec<Bucket>,
    pub storage: BTreeMap<String, serde_json::Value>,
}

impl PeerInfo {
    /// All `(neighbor, address)` pairs with their bucket index, in bucket order.
    pub fn neighbors(&self) -> impl Iterator<Item = (usize, &BucketEntry)> {
        self.buckets
            .iter()
            .enumerate()
            .flat_map(|(index, bucket)| bucket.iter().map(move |entry| (index, entry)))
    }
}

/// A peer known to the visualizer, either probed directly or seen in someone's bucket.
#[derive(Debug, Clone, Serialize)]
pub struct PeerNode {
    pub id: PeerId,
    pub address: Option<String>,
    pub last_info: Option<PeerInfo>,
    pub last_probed: Option<SystemTime>,
}

impl PeerNode {
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            address: None,
            last_info: None,
            last_probed: None,
        }
    }

    pub fn is_probed(&self) -> bool {
        self.last_info.is_some()
    }
}
