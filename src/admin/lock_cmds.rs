use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::utils::DateTime;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum LockType {
    #[serde(rename = "READ")]
    #[strum(serialize = "READ")]
    Read,
    #[serde(rename = "WRITE")]
    #[strum(serialize = "WRITE")]
    Write,
}

/// One held lock as seen across the cluster.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LockEntry {
    // When the lock was first granted.
    #[serde(rename = "time")]
    pub timestamp: DateTime,
    // Bucket and object the lock protects.
    pub resource: String,
    #[serde(rename = "type")]
    pub type_: LockType,
    // Code location that took the lock.
    pub source: String,
    // Nodes that reported holding the lock.
    #[serde(rename = "serverlist")]
    pub server_list: Vec<String>,
    // Node that originally requested the lock.
    pub owner: String,
    // Uid of the lock request.
    pub id: String,
    // Nodes required to hold the lock for it to be valid.
    pub quorum: usize,
}

impl LockEntry {
    /// A lock reported by fewer nodes than its quorum is presumed orphaned.
    pub fn is_stale(&self) -> bool {
        self.server_list.len() < self.quorum
    }

    /// Presentation order: resource, then grant time, then uid.
    pub fn presentation_cmp(&self, other: &Self) -> Ordering {
        self.resource
            .cmp(&other.resource)
            .then_with(|| self.timestamp.cmp(&other.timestamp))
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils;

    #[test]
    fn test_lock_entry_encode() {
        let entry = LockEntry {
            timestamp: utils::zero_time(),
            resource: "photos/a.png".to_owned(),
            type_: LockType::Write,
            source: "heal.rs:42".to_owned(),
            server_list: vec!["node1:9000".to_owned()],
            owner: "node1".to_owned(),
            id: "uid-1".to_owned(),
            quorum: 2,
        };
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["type"], "WRITE");
        assert_eq!(v["serverlist"][0], "node1:9000");
        assert_eq!(v["quorum"], 2);
        assert!(entry.is_stale());
    }
}
