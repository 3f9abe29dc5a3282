use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::admin::{
    ProfilerFactory, ProfilerRegistry, ServerHealth, TraceInfo, SERVER_STATE_ONLINE,
};
use crate::auth::{self, AdminAuth};
use crate::config::Config;
use crate::heal::HealSequenceManager;
use crate::http::HttpStats;
use crate::lock::LocalLocker;
use crate::logger::ConsoleLogSys;
use crate::object::ObjectLayer;
use crate::peer::NotificationSys;
use crate::pubsub::PubSub;
use crate::signals::ServiceSignal;
use crate::utils::{self, DateTime};

/// Process state shared by every admin and peer handler. Built once at
/// startup and handed to the routes as `web::Data<Globals>`.
pub struct Globals {
    pub config: Config,
    pub node_name: String,
    pub start_time: DateTime,
    pub object_layer: Option<Arc<dyn ObjectLayer>>,
    pub heal_manager: Arc<HealSequenceManager>,
    pub notification: NotificationSys,
    pub local_locker: Arc<LocalLocker>,
    pub trace: PubSub<TraceInfo>,
    pub console: Arc<ConsoleLogSys>,
    pub profilers: ProfilerRegistry,
    pub http_stats: Arc<HttpStats>,
    pub auth: Arc<dyn AdminAuth>,
    // Restart and stop requests for the server loop.
    pub service_tx: mpsc::UnboundedSender<ServiceSignal>,
    // Cancelled on shutdown, parent of every stream session.
    pub shutdown: CancellationToken,
}

impl Globals {
    pub fn new(config: Config, service_tx: mpsc::UnboundedSender<ServiceSignal>) -> Globals {
        let trace = PubSub::new();
        let heal_manager = HealSequenceManager::new(&config.node_name, trace.clone())
            .with_keep_duration(config.heal_keep_duration);
        Globals {
            node_name: config.node_name.clone(),
            start_time: utils::now(),
            object_layer: None,
            heal_manager: Arc::new(heal_manager),
            notification: NotificationSys::default(),
            local_locker: Arc::new(LocalLocker::new(&config.node_name)),
            trace,
            console: Arc::new(ConsoleLogSys::new(
                &config.node_name,
                config.console_log_size,
            )),
            profilers: ProfilerRegistry::new(None),
            http_stats: Arc::new(HttpStats::default()),
            auth: auth::admin_auth(config.admin_token.as_deref()),
            service_tx,
            shutdown: CancellationToken::new(),
            config,
        }
    }

    pub fn with_object_layer(mut self, layer: Arc<dyn ObjectLayer>) -> Globals {
        self.object_layer = Some(layer);
        self
    }

    pub fn with_notification(mut self, notification: NotificationSys) -> Globals {
        self.notification = notification;
        self
    }

    /// Shares the console log system the process logger already feeds.
    pub fn with_console(mut self, console: Arc<ConsoleLogSys>) -> Globals {
        self.console = console;
        self
    }

    pub fn with_profiler_factory(mut self, factory: Arc<dyn ProfilerFactory>) -> Globals {
        self.profilers = ProfilerRegistry::new(Some(factory));
        self
    }

    pub fn with_auth(mut self, auth: Arc<dyn AdminAuth>) -> Globals {
        self.auth = auth;
        self
    }

    pub fn object_layer(&self) -> Option<Arc<dyn ObjectLayer>> {
        self.object_layer.clone()
    }

    pub fn uptime(&self) -> Duration {
        utils::now()
            .signed_duration_since(self.start_time)
            .to_std()
            .unwrap_or_default()
    }

    /// Health probe of this node, answered locally and to peers.
    pub async fn local_server_health(&self) -> ServerHealth {
        let held_locks = self
            .local_locker
            .dup_lock_map()
            .values()
            .map(Vec::len)
            .sum();
        ServerHealth {
            addr: self.node_name.clone(),
            state: SERVER_STATE_ONLINE.to_owned(),
            error: None,
            version: crate::version::VERSION.to_owned(),
            uptime_secs: self.uptime().as_secs(),
            active_heals: self.heal_manager.live_sequences().await,
            held_locks,
            http: self.http_stats.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockArgs;

    #[tokio::test]
    async fn test_local_server_health() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let globals = Globals::new(Config::default(), tx);
        let args = LockArgs::new("uid-1", vec!["b1/o1".to_owned()], "test", "owner", 1);
        assert!(globals.local_locker.try_lock(&args));

        let health = globals.local_server_health().await;
        assert_eq!(health.addr, "localhost:9000");
        assert_eq!(health.state, SERVER_STATE_ONLINE);
        assert_eq!(health.held_locks, 1);
        assert_eq!(health.active_heals, 0);
        assert!(globals.object_layer().is_none());
    }
}
