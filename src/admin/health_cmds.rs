use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::utils::DateTime;

pub const HEALTH_INFO_VERSION: &str = "3";

pub const SERVER_STATE_ONLINE: &str = "online";
pub const SERVER_STATE_OFFLINE: &str = "offline";

/// One frame of a health info stream.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct HealthInfo {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub servers: Vec<ServerHealth>,
}

impl HealthInfo {
    pub fn version_only() -> HealthInfo {
        HealthInfo {
            version: HEALTH_INFO_VERSION.to_owned(),
            ..Default::default()
        }
    }

    pub fn with_error(err: String) -> HealthInfo {
        HealthInfo {
            version: HEALTH_INFO_VERSION.to_owned(),
            error: Some(err),
            ..Default::default()
        }
    }

    pub fn with_servers(timestamp: DateTime, servers: Vec<ServerHealth>) -> HealthInfo {
        HealthInfo {
            version: HEALTH_INFO_VERSION.to_owned(),
            timestamp: Some(timestamp),
            servers,
            ..Default::default()
        }
    }
}

/// Health probe of one node.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerHealth {
    pub addr: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub version: String,
    #[serde(default)]
    pub uptime_secs: u64,
    #[serde(default)]
    pub active_heals: usize,
    #[serde(default)]
    pub held_locks: usize,
    #[serde(default)]
    pub http: ServerHttpStats,
}

impl ServerHealth {
    pub fn offline(addr: &str, err: String) -> ServerHealth {
        ServerHealth {
            addr: addr.to_owned(),
            state: SERVER_STATE_OFFLINE.to_owned(),
            error: Some(err),
            version: "".to_owned(),
            uptime_secs: 0,
            active_heals: 0,
            held_locks: 0,
            http: ServerHttpStats::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerHttpStats {
    pub current_requests: HashMap<String, u64>,
    pub total_requests: HashMap<String, u64>,
    pub total_errors: HashMap<String, u64>,
    pub total_canceled: HashMap<String, u64>,
    pub total_bytes_received: u64,
    pub total_bytes_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_info_frames() {
        let v = serde_json::to_value(&HealthInfo::version_only()).unwrap();
        assert_eq!(v, serde_json::json!({ "version": HEALTH_INFO_VERSION }));

        let v = serde_json::to_value(&HealthInfo::with_error("busy".to_owned())).unwrap();
        assert_eq!(v["error"], "busy");

        let offline = ServerHealth::offline("node2:9000", "timeout".to_owned());
        let v = serde_json::to_value(&offline).unwrap();
        assert_eq!(v["state"], "offline");
        assert_eq!(v["uptimeSecs"], 0);
    }
}
