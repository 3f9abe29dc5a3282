use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::admin::LogInfo;
use crate::logger::ErrKind;
use crate::pubsub::{PubSub, Subscription};

pub const DEFAULT_CONSOLE_LOG_SIZE: usize = 10_000;

/// Keeps the most recent log records of this node and fans new ones out to
/// console log sessions.
pub struct ConsoleLogSys {
    node_name: String,
    capacity: usize,
    ring: Mutex<VecDeque<LogInfo>>,
    pubsub: PubSub<LogInfo>,
}

impl ConsoleLogSys {
    pub fn new(node_name: &str, capacity: usize) -> ConsoleLogSys {
        let capacity = capacity.max(1);
        ConsoleLogSys {
            node_name: node_name.to_owned(),
            capacity,
            ring: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            pubsub: PubSub::new(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn send(&self, info: LogInfo) {
        {
            let mut ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
            if ring.len() == self.capacity {
                ring.pop_front();
            }
            ring.push_back(info.clone());
        }
        self.pubsub.publish(info);
    }

    /// The last `limit` buffered records that match, oldest first.
    pub fn replay(&self, node: &str, limit: usize, kind: ErrKind) -> Vec<LogInfo> {
        let ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        let mut last: Vec<LogInfo> = ring
            .iter()
            .rev()
            .filter(|l| l.send_log(node, kind))
            .take(limit)
            .cloned()
            .collect();
        last.reverse();
        last
    }

    /// Feeds every new record matching `node` and `kind` into `tx` until
    /// the subscription drops.
    pub fn subscribe(
        &self,
        tx: mpsc::Sender<LogInfo>,
        node: &str,
        kind: ErrKind,
    ) -> Subscription<LogInfo> {
        let node = node.to_owned();
        self.pubsub
            .subscribe(tx, Box::new(move |l| l.send_log(&node, kind)))
    }

    pub fn subscribers_num(&self) -> usize {
        self.pubsub.subscribers_num()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils;

    fn record(node: &str, message: &str, kind: ErrKind) -> LogInfo {
        LogInfo {
            node_name: node.to_owned(),
            time: utils::now(),
            level: "INFO".to_owned(),
            kind,
            message: message.to_owned(),
            api: None,
            source: None,
        }
    }

    #[test]
    fn test_ring_keeps_latest() {
        let sys = ConsoleLogSys::new("node1", 3);
        for i in 0..5 {
            sys.send(record("node1", &i.to_string(), ErrKind::Hulk));
        }
        let messages: Vec<String> = sys
            .replay("", 10, ErrKind::All)
            .into_iter()
            .map(|l| l.message)
            .collect();
        assert_eq!(messages, vec!["2", "3", "4"]);

        let messages: Vec<String> = sys
            .replay("", 2, ErrKind::All)
            .into_iter()
            .map(|l| l.message)
            .collect();
        assert_eq!(messages, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn test_subscribe_filters_kind() {
        let sys = ConsoleLogSys::new("node1", 16);
        let (tx, mut rx) = mpsc::channel(4);
        let _sub = sys.subscribe(tx, "", ErrKind::Application);
        sys.send(record("node1", "internal", ErrKind::Hulk));
        sys.send(record("node1", "app", ErrKind::Application));
        assert_eq!(rx.recv().await.unwrap().message, "app");
        assert_eq!(sys.replay("", 10, ErrKind::Application).len(), 1);
    }
}
