use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TypedError {
    #[error("Server not initialized, please try again")]
    ServerNotInitialized,

    // Rejected by a peer.
    #[error("Do not have enough permissions to access this resource")]
    AccessDenied,

    // Every peer failed to answer a cluster wide heal status query.
    #[error("all remote servers failed to report heal status, cluster is unhealthy")]
    ClusterUnhealthy,

    #[error("Profiler not enabled")]
    ProfilerNotEnabled,

    #[error("Unsupported profiler type: {0}")]
    UnsupportedProfiler(String),

    // A heal sequence was cancelled while it was still running.
    #[error("heal stopped by request")]
    HealStopped,

    #[error("Object storage backend is unreachable")]
    BackendDown,

    // Remote peer answered with an admin error.
    #[error("{code}: {message}")]
    RemoteApi { code: String, message: String },
}
