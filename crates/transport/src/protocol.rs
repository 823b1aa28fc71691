//! Control-plane payloads as they appear on the wire.

use corelib::Snapshot;
use serde::{Deserialize, Serialize};

/// Body of `POST /add` and `DELETE /rm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalePayload {
    /// Number of servers to add or remove.
    pub n: usize,
    /// Hostnames to use first; at most `n`.
    #[serde(default)]
    pub hostnames: Vec<String>,
}

/// Pool summary returned by every successful control-plane call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSet {
    #[serde(rename = "N")]
    pub n: usize,
    pub replicas: Vec<String>,
}

impl From<Snapshot> for ReplicaSet {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            n: snapshot.count,
            replicas: snapshot.replicas,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_hostnames_default_to_empty() {
        let payload: ScalePayload = serde_json::from_str(r#"{"n": 3}"#).unwrap();
        assert_eq!(payload.n, 3);
        assert!(payload.hostnames.is_empty());
    }

    #[test]
    fn test_replica_set_uses_capital_n() {
        let set = ReplicaSet::from(Snapshot {
            count: 1,
            replicas: vec!["h1".into()],
        });
        assert_eq!(
            serde_json::to_value(&set).unwrap(),
            serde_json::json!({"N": 1, "replicas": ["h1"]})
        );
    }
}
