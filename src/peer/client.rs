use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::admin::{
    BgHealState, LogInfo, ProfileData, ProfilerType, ServerHealth, TraceInfo, TraceOpts,
};
use crate::lock::LockMap;
use crate::logger::ErrKind;
use crate::signals::ServiceSignal;

/// Control plane calls this node makes on another node of the cluster.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Address of the peer, as used in logs and lock server lists.
    fn host(&self) -> &str;

    async fn get_locks(&self) -> anyhow::Result<LockMap>;

    async fn force_unlock(&self, paths: &[String]) -> anyhow::Result<()>;

    async fn background_heal_status(&self) -> anyhow::Result<BgHealState>;

    async fn signal_service(&self, sig: ServiceSignal) -> anyhow::Result<()>;

    async fn start_profiling(&self, profilers: &[ProfilerType]) -> anyhow::Result<()>;

    /// Stops the profilers running on the peer and returns their profiles.
    async fn download_profiling(&self) -> anyhow::Result<Vec<ProfileData>>;

    async fn server_health(&self) -> anyhow::Result<ServerHealth>;

    // Streaming calls forward events into `tx` until `cancel` fires or the
    // peer closes the stream. Events that do not fit in `tx` are dropped.

    async fn trace(
        &self,
        opts: &TraceOpts,
        tx: mpsc::Sender<TraceInfo>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()>;

    async fn console_log(
        &self,
        kind: ErrKind,
        tx: mpsc::Sender<LogInfo>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()>;
}
