use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use log::debug;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::admin::{
    BgHealState, LogInfo, NodeProfiles, ProfilerType, ServerHealth, StartProfilingResult,
    TraceInfo, TraceOpts,
};
use crate::lock::PeerLocks;
use crate::logger::{self, ErrKind, ReqInfo};
use crate::signals::ServiceSignal;

/// Outcome of a call on one peer.
#[derive(Debug)]
pub struct NotificationPeerErr {
    pub host: String,
    pub err: Option<anyhow::Error>,
}

/// Scatter/gather over every peer of the cluster. A failing peer never
/// fails the others.
#[derive(Clone, Default)]
pub struct NotificationSys {
    peers: Vec<Arc<dyn PeerClient>>,
}

fn log_peer_err(api: &str, host: &str, err: &anyhow::Error) {
    let req = ReqInfo::new("", api, "", "").with_tag("peerAddress", host);
    logger::log_if(&req, err, None);
}

impl NotificationSys {
    pub fn new(peers: Vec<Arc<dyn PeerClient>>) -> NotificationSys {
        NotificationSys { peers }
    }

    pub fn peers(&self) -> &[Arc<dyn PeerClient>] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    async fn fan_out<'a, T, F, Fut>(&'a self, f: F) -> Vec<(&'a str, anyhow::Result<T>)>
    where
        F: Fn(&'a dyn PeerClient) -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + 'a,
    {
        let calls = self.peers.iter().map(|peer| {
            let peer = peer.as_ref();
            let fut = f(peer);
            async move { (peer.host(), fut.await) }
        });
        join_all(calls).await
    }

    fn peer_errs(
        api: &str,
        results: Vec<(&str, anyhow::Result<()>)>,
    ) -> Vec<NotificationPeerErr> {
        results
            .into_iter()
            .map(|(host, res)| {
                if let Err(err) = &res {
                    log_peer_err(api, host, err);
                }
                NotificationPeerErr {
                    host: host.to_owned(),
                    err: res.err(),
                }
            })
            .collect()
    }

    /// Lock tables of every reachable peer.
    pub async fn get_locks(&self) -> Vec<PeerLocks> {
        self.fan_out(|peer| peer.get_locks())
            .await
            .into_iter()
            .filter_map(|(host, res)| match res {
                Ok(locks) => Some(PeerLocks {
                    addr: host.to_owned(),
                    locks,
                }),
                Err(err) => {
                    log_peer_err("GetLocks", host, &err);
                    None
                }
            })
            .collect()
    }

    pub async fn force_unlock(&self, paths: &[String]) -> Vec<NotificationPeerErr> {
        let results = self.fan_out(|peer| peer.force_unlock(paths)).await;
        Self::peer_errs("ForceUnlock", results)
    }

    /// Heal state of every peer in peer order, failures included.
    pub async fn background_heal_status(&self) -> Vec<(String, anyhow::Result<BgHealState>)> {
        self.fan_out(|peer| peer.background_heal_status())
            .await
            .into_iter()
            .map(|(host, res)| (host.to_owned(), res))
            .collect()
    }

    pub async fn signal_service(&self, sig: ServiceSignal) -> Vec<NotificationPeerErr> {
        let results = self.fan_out(|peer| peer.signal_service(sig)).await;
        Self::peer_errs("SignalService", results)
    }

    pub async fn start_profiling(&self, profilers: &[ProfilerType]) -> Vec<StartProfilingResult> {
        self.fan_out(|peer| peer.start_profiling(profilers))
            .await
            .into_iter()
            .map(|(host, res)| {
                if let Err(err) = &res {
                    log_peer_err("StartProfiling", host, err);
                }
                StartProfilingResult {
                    node_name: host.to_owned(),
                    success: res.is_ok(),
                    error: res.err().map(|e| e.to_string()).unwrap_or_default(),
                }
            })
            .collect()
    }

    /// Profiles of every peer, stopping their profilers. A failing peer is
    /// reported with its error and no profiles.
    pub async fn download_profiling(&self) -> Vec<NodeProfiles> {
        self.fan_out(|peer| peer.download_profiling())
            .await
            .into_iter()
            .map(|(host, res)| match res {
                Ok(profiles) => NodeProfiles {
                    node_name: host.to_owned(),
                    profiles,
                    error: String::new(),
                },
                Err(err) => {
                    log_peer_err("DownloadProfiling", host, &err);
                    NodeProfiles {
                        node_name: host.to_owned(),
                        profiles: Vec::new(),
                        error: err.to_string(),
                    }
                }
            })
            .collect()
    }

    /// Health probe of every peer. An unreachable peer is reported offline.
    pub async fn server_health(&self) -> Vec<ServerHealth> {
        self.fan_out(|peer| peer.server_health())
            .await
            .into_iter()
            .map(|(host, res)| match res {
                Ok(health) => health,
                Err(err) => {
                    log_peer_err("ServerHealth", host, &err);
                    ServerHealth::offline(host, err.to_string())
                }
            })
            .collect()
    }

    /// Streams the traces of every peer into `tx` until `cancel` fires.
    pub fn spawn_trace(
        &self,
        opts: &TraceOpts,
        tx: mpsc::Sender<TraceInfo>,
        cancel: &CancellationToken,
    ) {
        for peer in self.peers.iter().cloned() {
            let opts = opts.clone();
            let tx = tx.clone();
            let cancel = cancel.child_token();
            tokio::spawn(async move {
                if let Err(err) = peer.trace(&opts, tx, cancel).await {
                    log_peer_err("Trace", peer.host(), &err);
                }
                debug!("Trace stream of peer {} closed", peer.host());
            });
        }
    }

    /// Streams the console log of the peers matching `node` (every peer
    /// when empty) into `tx` until `cancel` fires.
    pub fn spawn_console_log(
        &self,
        node: &str,
        kind: ErrKind,
        tx: mpsc::Sender<LogInfo>,
        cancel: &CancellationToken,
    ) {
        let peers = self
            .peers
            .iter()
            .filter(|peer| node.is_empty() || peer_matches_node(peer.host(), node));
        for peer in peers.cloned() {
            let tx = tx.clone();
            let cancel = cancel.child_token();
            tokio::spawn(async move {
                if let Err(err) = peer.console_log(kind, tx, cancel).await {
                    log_peer_err("ConsoleLog", peer.host(), &err);
                }
                debug!("Console log stream of peer {} closed", peer.host());
            });
        }
    }
}

// Accepts `node` given either as the full peer address or as its host name.
fn peer_matches_node(host: &str, node: &str) -> bool {
    let host = host
        .split("://")
        .last()
        .unwrap_or(host)
        .trim_end_matches('/');
    host.eq_ignore_ascii_case(node)
        || host
            .rsplit_once(':')
            .map_or(false, |(name, _)| name.eq_ignore_ascii_case(node))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::admin::{ProfileData, SERVER_STATE_ONLINE};
    use crate::errors::TypedError;
    use crate::lock::LockMap;

    struct FakePeer {
        host: String,
        healthy: bool,
    }

    #[async_trait]
    impl PeerClient for FakePeer {
        fn host(&self) -> &str {
            &self.host
        }

        async fn get_locks(&self) -> anyhow::Result<LockMap> {
            if !self.healthy {
                return Err(TypedError::BackendDown.into());
            }
            Ok(HashMap::new())
        }

        async fn force_unlock(&self, _paths: &[String]) -> anyhow::Result<()> {
            Ok(())
        }

        async fn background_heal_status(&self) -> anyhow::Result<BgHealState> {
            Ok(BgHealState::default())
        }

        async fn signal_service(&self, _sig: ServiceSignal) -> anyhow::Result<()> {
            if !self.healthy {
                return Err(TypedError::BackendDown.into());
            }
            Ok(())
        }

        async fn start_profiling(&self, _profilers: &[ProfilerType]) -> anyhow::Result<()> {
            if !self.healthy {
                return Err(TypedError::ProfilerNotEnabled.into());
            }
            Ok(())
        }

        async fn download_profiling(&self) -> anyhow::Result<Vec<ProfileData>> {
            if !self.healthy {
                return Err(TypedError::ProfilerNotEnabled.into());
            }
            Ok(vec![ProfileData {
                profiler_type: ProfilerType::Cpu,
                data: base64::encode(b"cpu"),
            }])
        }

        async fn server_health(&self) -> anyhow::Result<ServerHealth> {
            if !self.healthy {
                return Err(TypedError::BackendDown.into());
            }
            Ok(ServerHealth {
                state: SERVER_STATE_ONLINE.to_owned(),
                error: None,
                ..ServerHealth::offline(&self.host, String::new())
            })
        }

        async fn trace(
            &self,
            _opts: &TraceOpts,
            _tx: mpsc::Sender<TraceInfo>,
            cancel: CancellationToken,
        ) -> anyhow::Result<()> {
            cancel.cancelled().await;
            Ok(())
        }

        async fn console_log(
            &self,
            kind: ErrKind,
            tx: mpsc::Sender<LogInfo>,
            _cancel: CancellationToken,
        ) -> anyhow::Result<()> {
            let _ = tx
                .send(LogInfo {
                    node_name: self.host.clone(),
                    time: crate::utils::now(),
                    level: "INFO".to_owned(),
                    kind,
                    message: "hello".to_owned(),
                    api: None,
                    source: None,
                })
                .await;
            Ok(())
        }
    }

    fn sys() -> NotificationSys {
        NotificationSys::new(vec![
            Arc::new(FakePeer {
                host: "node2:9000".to_owned(),
                healthy: true,
            }),
            Arc::new(FakePeer {
                host: "node3:9000".to_owned(),
                healthy: false,
            }),
        ])
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let sys = sys();
        let locks = sys.get_locks().await;
        assert_eq!(locks.len(), 1);
        assert_eq!(locks[0].addr, "node2:9000");

        let errs = sys.signal_service(ServiceSignal::Restart).await;
        assert!(errs[0].err.is_none());
        assert!(errs[1].err.is_some());

        let results = sys.start_profiling(&[ProfilerType::Cpu]).await;
        assert!(results[0].success);
        assert!(!results[1].success);
        assert_eq!(results[1].node_name, "node3:9000");
        assert_eq!(results[1].error, "Profiler not enabled");

        let profiles = sys.download_profiling().await;
        assert_eq!(profiles[0].profiles.len(), 1);
        assert!(profiles[0].error.is_empty());
        assert!(profiles[1].profiles.is_empty());
        assert_eq!(profiles[1].error, "Profiler not enabled");

        let health = sys.server_health().await;
        assert_eq!(health[0].state, "online");
        assert_eq!(health[1].state, "offline");
    }

    #[tokio::test]
    async fn test_console_log_node_filter() {
        let sys = sys();
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        sys.spawn_console_log("node3", ErrKind::All, tx, &cancel);

        let info = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.node_name, "node3:9000");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_peer_matches_node() {
        assert!(peer_matches_node("node2:9000", "node2"));
        assert!(peer_matches_node("http://node2:9000", "node2:9000"));
        assert!(!peer_matches_node("node2:9000", "node3"));
    }
}
