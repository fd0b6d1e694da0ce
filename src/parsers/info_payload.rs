/*!
This module decodes the `/info` response served by every DHT peer.

JSON structure:
{
    "ID": [string],
    "Port": [int],
    "Buckets": [string holding a JSON array of strings, each string holding a JSON object
                {
                    "<neighbor id>": "<neighbor address>",
                    ...
                }],
    "Storage": [string holding a JSON object of arbitrary values]
}

`Buckets` is encoded twice: the outer string is an array, and every element of that
array is itself an encoded object. Decoding is all-or-nothing.
*/

use std::{collections::BTreeMap, fmt::Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::peer::{Bucket, BucketEntry, PeerId, PeerInfo};

/// Wire envelope, field names as sent by the peers.
#[derive(Debug, Deserialize, Serialize)]
struct InfoEnvelope {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Port")]
    port: i64,
    #[serde(rename = "Buckets")]
    buckets: String,
    #[serde(rename = "Storage")]
    storage: String,
}

/// Which decode pass rejected the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    Envelope,
    BucketList,
    Bucket { index: usize },
    Storage,
}

impl Display for DecodeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeStage::Envelope => write!(f, "envelope"),
            DecodeStage::BucketList => write!(f, "bucket list"),
            DecodeStage::Bucket { index } => write!(f, "bucket {index}"),
            DecodeStage::Storage => write!(f, "storage"),
        }
    }
}

#[derive(Debug, Error)]
#[error("malformed info payload ({stage}): {source}")]
pub struct MalformedPayload {
    pub stage: DecodeStage,
    #[source]
    pub source: serde_json::Error,
}

impl MalformedPayload {
    fn at(stage: DecodeStage) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| MalformedPayload { stage, source }
    }
}

/// Decodes a raw `/info` body into a `PeerInfo`.
pub fn decode(raw: &str) -> Result<PeerInfo, MalformedPayload> {
    let envelope: InfoEnvelope =
        serde_json::from_str(raw).map_err(MalformedPayload::at(DecodeStage::Envelope))?;

    let encoded_buckets: Vec<String> = serde_json::from_str(&envelope.buckets)
        .map_err(MalformedPayload::at(DecodeStage::BucketList))?;

    let mut buckets = Vec::with_capacity(encoded_buckets.len());
    for (index, encoded) in encoded_buckets.iter().enumerate() {
        // serde_json's preserve_order keeps neighbors in the order the peer wrote them
        let entries: serde_json::Map<String, serde_json::Value> = serde_json::from_str(encoded)
            .map_err(MalformedPayload::at(DecodeStage::Bucket { index }))?;
        let mut bucket = Vec::with_capacity(entries.len());
        for (id, address) in entries {
            let address: String = serde_json::from_value(address)
                .map_err(MalformedPayload::at(DecodeStage::Bucket { index }))?;
            bucket.push(BucketEntry { id: PeerId::new(id), address });
        }
        buckets.push(Bucket::new(bucket));
    }

    let storage: BTreeMap<String, serde_json::Value> = serde_json::from_str(&envelope.storage)
        .map_err(MalformedPayload::at(DecodeStage::Storage))?;

    Ok(PeerInfo {
        id: PeerId::new(envelope.id),
        port: envelope.port,
        buckets,
        storage,
    })
}

/// Encodes a `PeerInfo` in the same double-encoded shape the peers serve.
#[cfg(test)]
pub fn encode(info: &PeerInfo) -> Result<String, serde_json::Error> {
    let mut encoded_buckets = Vec::with_capacity(info.buckets.len());
    for bucket in &info.buckets {
        let mut map = serde_json::Map::with_capacity(bucket.len());
        for entry in bucket.iter() {
            map.insert(entry.id.to_string(), serde_json::Value::String(entry.address.clone()));
        }
        encoded_buckets.push(serde_json::to_string(&map)?);
    }

    let envelope = InfoEnvelope {
        id: info.id.to_string(),
        port: info.port,
        buckets: serde_json::to_string(&encoded_buckets)?,
        storage: serde_json::to_string(&info.storage)?,
    };
    serde_json::to_string(&envelope)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn wire(id: &str, buckets: &[serde_json::Value]) -> String {
        let encoded: Vec<String> = buckets.iter().map(|b| b.to_string()).collect();
        json!({
            "ID": id,
            "Port": 9000,
            "Buckets": serde_json::to_string(&encoded).unwrap(),
            "Storage": json!({"a1b2": "file.txt"}).to_string(),
        })
        .to_string()
    }

    #[test]
    fn test_decode_double_encoded_buckets() {
        let raw = wire(
            "A",
            &[json!({"B": "h2", "Z": "h9", "C": "h3"}), json!({}), json!({"D": "h4"})],
        );

        let info = decode(&raw).unwrap();
        assert_eq!(info.id.as_str(), "A");
        assert_eq!(info.port, 9000);
        assert_eq!(info.buckets.len(), 3);

        let first: Vec<_> = info.buckets[0].iter().map(|e| e.id.as_str()).collect();
        assert_eq!(first, ["B", "Z", "C"]);
        assert!(info.buckets[1].is_empty());
        assert_eq!(info.buckets[2].entries[0].address, "h4");
        assert_eq!(info.storage.get("a1b2"), Some(&json!("file.txt")));
    }

    #[test]
    fn test_encode_then_decode_keeps_bucket_order() {
        let info = PeerInfo {
            id: "A".into(),
            port: 9001,
            buckets: vec![
                [("Q", "h7"), ("B", "h2")].into_iter().collect(),
                [("C", "h3")].into_iter().collect(),
            ],
            storage: BTreeMap::new(),
        };

        let decoded = decode(&encode(&info).unwrap()).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn test_not_json_is_rejected() {
        let err = decode("{not json").unwrap_err();
        assert_eq!(err.stage, DecodeStage::Envelope);
    }

    #[test]
    fn test_single_encoded_buckets_are_rejected() {
        // Buckets sent as a plain array instead of a string
        let raw = json!({
            "ID": "A",
            "Port": 1,
            "Buckets": [{"B": "h2"}],
            "Storage": "{}",
        })
        .to_string();
        assert_eq!(decode(&raw).unwrap_err().stage, DecodeStage::Envelope);

        // Elements of the bucket list not encoded a second time
        let raw = json!({
            "ID": "A",
            "Port": 1,
            "Buckets": json!([{"B": "h2"}]).to_string(),
            "Storage": "{}",
        })
        .to_string();
        assert_eq!(decode(&raw).unwrap_err().stage, DecodeStage::BucketList);
    }

    #[test]
    fn test_bad_bucket_reports_its_index() {
        let raw = json!({
            "ID": "A",
            "Port": 1,
            "Buckets": serde_json::to_string(&["{\"B\":\"h2\"}", "[1,2]"]).unwrap(),
            "Storage": "{}",
        })
        .to_string();
        assert_eq!(decode(&raw).unwrap_err().stage, DecodeStage::Bucket { index: 1 });

        let raw = json!({
            "ID": "A",
            "Port": 1,
            "Buckets": serde_json::to_string(&["{\"B\":42}"]).unwrap(),
            "Storage": "{}",
        })
        .to_string();
        assert_eq!(decode(&raw).unwrap_err().stage, DecodeStage::Bucket { index: 0 });
    }

    #[test]
    fn test_bad_storage_is_rejected() {
        let raw = json!({
            "ID": "A",
            "Port": 1,
            "Buckets": "[]",
            "Storage": "not an object",
        })
        .to_string();
        assert_eq!(decode(&raw).unwrap_err().stage, DecodeStage::Storage);
    }
}
