use serde::{Deserialize, Serialize};

use crate::logger::ErrKind;
use crate::utils::DateTime;

/// One console log record as streamed to an admin client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LogInfo {
    #[serde(rename = "node")]
    pub node_name: String,
    pub time: DateTime,
    pub level: String,
    #[serde(rename = "errKind")]
    pub kind: ErrKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<String>,
}

impl LogInfo {
    /// Reports whether the record matches a `node`/`logType` request. An
    /// empty node selects every node.
    pub fn send_log(&self, node: &str, kind: ErrKind) -> bool {
        let node_flag = node.is_empty() || self.node_name.eq_ignore_ascii_case(node);
        let kind_flag = kind == ErrKind::All || kind == self.kind;
        node_flag && kind_flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils;

    #[test]
    fn test_send_log() {
        let info = LogInfo {
            node_name: "Node1:9000".to_owned(),
            time: utils::now(),
            level: "ERROR".to_owned(),
            kind: ErrKind::Application,
            message: "disk offline".to_owned(),
            api: None,
            source: None,
        };
        assert!(info.send_log("", ErrKind::All));
        assert!(info.send_log("node1:9000", ErrKind::Application));
        assert!(!info.send_log("node2:9000", ErrKind::All));
        assert!(!info.send_log("", ErrKind::Hulk));
    }
}
