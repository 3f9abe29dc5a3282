use log::debug;

use crate::admin::{BgHealState, StorageInfo};
use crate::errors::TypedError;
use crate::logger::{self, ReqInfo};
use crate::object::ObjectLayer;
use crate::peer::NotificationSys;

/// Background heal state of the whole cluster. Fails only when the local
/// state is missing or when every peer failed to answer.
pub async fn get_aggregated_background_heal_state(
    backend: Option<&dyn ObjectLayer>,
    notification: &NotificationSys,
) -> anyhow::Result<BgHealState> {
    let backend = backend.ok_or(TypedError::ServerNotInitialized)?;
    let mut state = backend
        .background_heal_status()
        .await
        .ok_or(TypedError::ServerNotInitialized)?;

    if notification.is_empty() {
        return Ok(state);
    }

    let results = notification.background_heal_status().await;
    let mut peer_states = Vec::with_capacity(results.len());
    let mut failed = 0;
    for (host, res) in results {
        match res {
            Ok(peer_state) => peer_states.push(peer_state),
            Err(err) => {
                failed += 1;
                let req = ReqInfo::new("", "BackgroundHealStatus", "", "")
                    .with_tag("peerAddress", &host);
                logger::log_if(&req, &err, None);
            }
        }
    }
    if failed == notification.len() {
        return Err(TypedError::ClusterUnhealthy.into());
    }

    debug!(
        "Merging background heal state of {} peers",
        peer_states.len()
    );
    state.merge(&peer_states);
    Ok(state)
}

/// Storage info of the backend with every drive currently healing flagged.
pub async fn storage_info_with_healing(
    backend: &dyn ObjectLayer,
    notification: &NotificationSys,
) -> StorageInfo {
    let mut info = backend.storage_info().await;
    if let Ok(state) = get_aggregated_background_heal_state(Some(backend), notification).await {
        info.mark_healing(&state.heal_disks);
    }
    info
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::admin::{LogInfo, ProfileData, ProfilerType, ServerHealth, TraceInfo, TraceOpts};
    use crate::errors::AsError;
    use crate::lock::LockMap;
    use crate::logger::ErrKind;
    use crate::object::MemoryObjectLayer;
    use crate::peer::PeerClient;
    use crate::signals::ServiceSignal;

    struct HealPeer {
        host: String,
        state: Option<BgHealState>,
    }

    #[async_trait]
    impl PeerClient for HealPeer {
        fn host(&self) -> &str {
            &self.host
        }

        async fn get_locks(&self) -> anyhow::Result<LockMap> {
            Ok(LockMap::new())
        }

        async fn force_unlock(&self, _paths: &[String]) -> anyhow::Result<()> {
            Ok(())
        }

        async fn background_heal_status(&self) -> anyhow::Result<BgHealState> {
            self.state
                .clone()
                .ok_or_else(|| TypedError::BackendDown.into())
        }

        async fn signal_service(&self, _sig: ServiceSignal) -> anyhow::Result<()> {
            Ok(())
        }

        async fn start_profiling(&self, _profilers: &[ProfilerType]) -> anyhow::Result<()> {
            Ok(())
        }

        async fn download_profiling(&self) -> anyhow::Result<Vec<ProfileData>> {
            Ok(Vec::new())
        }

        async fn server_health(&self) -> anyhow::Result<ServerHealth> {
            Err(TypedError::BackendDown.into())
        }

        async fn trace(
            &self,
            _opts: &TraceOpts,
            _tx: mpsc::Sender<TraceInfo>,
            _cancel: CancellationToken,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn console_log(
            &self,
            _kind: ErrKind,
            _tx: mpsc::Sender<LogInfo>,
            _cancel: CancellationToken,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn peer(host: &str, state: Option<BgHealState>) -> Arc<dyn PeerClient> {
        Arc::new(HealPeer {
            host: host.to_owned(),
            state,
        })
    }

    fn backend() -> MemoryObjectLayer {
        let layer = MemoryObjectLayer::erasure(
            vec!["http://node1:9000/d1".to_owned(), "http://node1:9000/d2".to_owned()],
            1,
        );
        layer.set_background_heal_state(Some(BgHealState {
            scanned_items_count: 10,
            ..Default::default()
        }));
        layer
    }

    fn healing(disk: &str, scanned: u64) -> Option<BgHealState> {
        Some(BgHealState {
            scanned_items_count: scanned,
            heal_disks: vec![disk.to_owned()],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_not_initialized() {
        let sys = NotificationSys::default();
        let err = get_aggregated_background_heal_state(None, &sys)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_error::<TypedError>(),
            Some(TypedError::ServerNotInitialized)
        ));

        let fs = MemoryObjectLayer::fs("/data");
        let err = get_aggregated_background_heal_state(Some(&fs), &sys)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_error::<TypedError>(),
            Some(TypedError::ServerNotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_zero_peers_is_local_only() {
        let layer = backend();
        let state = get_aggregated_background_heal_state(Some(&layer), &NotificationSys::default())
            .await
            .unwrap();
        assert_eq!(state.scanned_items_count, 10);
    }

    #[tokio::test]
    async fn test_partial_failure_merges_successes() {
        let layer = backend();
        let sys = NotificationSys::new(vec![
            peer("node2:9000", healing("http://node2:9000/d1", 5)),
            peer("node3:9000", None),
        ]);
        let state = get_aggregated_background_heal_state(Some(&layer), &sys)
            .await
            .unwrap();
        assert_eq!(state.scanned_items_count, 15);
        assert_eq!(state.heal_disks, vec!["http://node2:9000/d1".to_owned()]);
    }

    #[tokio::test]
    async fn test_all_peers_failed() {
        let layer = backend();
        let sys = NotificationSys::new(vec![peer("node2:9000", None), peer("node3:9000", None)]);
        let err = get_aggregated_background_heal_state(Some(&layer), &sys)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "all remote servers failed to report heal status, cluster is unhealthy"
        );
    }

    #[tokio::test]
    async fn test_storage_info_marks_healing() {
        let layer = backend();
        let sys = NotificationSys::new(vec![peer("node2:9000", healing("http://node1:9000/d2", 0))]);
        let info = storage_info_with_healing(&layer, &sys).await;
        assert!(!info.disks[0].healing);
        assert!(info.disks[1].healing);

        let sys = NotificationSys::new(vec![peer("node2:9000", None)]);
        let info = storage_info_with_healing(&layer, &sys).await;
        assert!(info.disks.iter().all(|d| !d.healing));
    }
}
