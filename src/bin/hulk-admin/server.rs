use std::sync::Arc;

use actix_web::web::Data;
use actix_web::HttpServer;
use hulk_admin::admin::ProfilerFactory;
use hulk_admin::config::Config;
use hulk_admin::globals::Globals;
use hulk_admin::lock::{LOCK_MAINTENANCE_INTERVAL, LOCK_VALIDITY_DURATION};
use hulk_admin::logger::ConsoleLogSys;
use hulk_admin::object::{MemoryObjectLayer, ObjectLayer};
use hulk_admin::peer::{NotificationSys, PeerClient, RestPeerClient};
use hulk_admin::router;
use hulk_admin::signals::{spawn_signal_listener, ServiceSignal};
use log::{info, warn};
use tokio::sync::mpsc;

const ERASURE_DRIVES: usize = 4;
const ERASURE_PARITY: usize = 2;

pub struct Server {
    config: Config,
    console: Arc<ConsoleLogSys>,
}

impl Server {
    pub fn new(config: Config, console: Arc<ConsoleLogSys>) -> Self {
        Server { config, console }
    }

    /// Serves the admin and peer APIs until a stop is requested. A restart
    /// rebuilds the process state and listens again, keeping the backend.
    pub async fn run(self) -> anyhow::Result<()> {
        let object_layer = self.object_layer();
        let (service_tx, mut service_rx) = mpsc::unbounded_channel();
        let _signals = spawn_signal_listener(service_tx.clone());

        loop {
            let globals = Data::new(self.globals(object_layer.clone(), service_tx.clone())?);
            let cleanup = globals.heal_manager.clone().spawn_cleanup(
                self.config.heal_cleanup_interval,
                globals.shutdown.clone(),
            );
            let lock_maintenance = globals.local_locker.clone().spawn_maintenance(
                LOCK_MAINTENANCE_INTERVAL,
                LOCK_VALIDITY_DURATION,
                globals.shutdown.clone(),
            );

            let server = HttpServer::new({
                let globals = globals.clone();
                move || router::configure_server_handler(globals.clone())
            })
            .disable_signals()
            .bind(&self.config.address)?
            .run();
            let handle = server.handle();
            let mut server = actix_web::rt::spawn(server);
            info!(
                "Hulk admin API listening on {} as {}, {} peer(s)",
                self.config.address,
                self.config.node_name,
                self.config.peers.len()
            );

            let sig = tokio::select! {
                sig = service_rx.recv() => sig.unwrap_or(ServiceSignal::Stop),
                res = &mut server => {
                    globals.shutdown.cancel();
                    globals.heal_manager.stop_all().await;
                    return match res {
                        Ok(res) => res.map_err(anyhow::Error::from),
                        Err(err) => Err(err.into()),
                    };
                }
            };

            info!("Received service signal: {}", sig);
            globals.shutdown.cancel();
            globals.heal_manager.stop_all().await;
            handle.stop(true).await;
            if let Err(err) = cleanup.await {
                warn!("Heal cleanup task failed: {}", err);
            }
            if let Err(err) = lock_maintenance.await {
                warn!("Lock maintenance task failed: {}", err);
            }

            match sig {
                ServiceSignal::Restart => continue,
                ServiceSignal::Stop => return Ok(()),
            }
        }
    }

    fn object_layer(&self) -> Arc<dyn ObjectLayer> {
        if self.config.erasure {
            let endpoints = (1..=ERASURE_DRIVES)
                .map(|i| format!("http://{}/data{}", self.config.node_name, i))
                .collect();
            Arc::new(MemoryObjectLayer::erasure(endpoints, ERASURE_PARITY))
        } else {
            Arc::new(MemoryObjectLayer::fs(&format!(
                "http://{}/data",
                self.config.node_name
            )))
        }
    }

    fn globals(
        &self,
        object_layer: Arc<dyn ObjectLayer>,
        service_tx: mpsc::UnboundedSender<ServiceSignal>,
    ) -> anyhow::Result<Globals> {
        let peers = self
            .config
            .peers
            .iter()
            .map(|host| {
                let client = RestPeerClient::new(host, self.config.admin_token.clone())?
                    .with_timeout(self.config.peer_timeout);
                Ok(Arc::new(client) as Arc<dyn PeerClient>)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut globals = Globals::new(self.config.clone(), service_tx)
            .with_object_layer(object_layer)
            .with_notification(NotificationSys::new(peers))
            .with_console(self.console.clone());
        if self.config.profiling {
            match profiler_factory() {
                Some(factory) => globals = globals.with_profiler_factory(factory),
                None => warn!("Profiling is not supported on this platform"),
            }
        }
        Ok(globals)
    }
}

#[cfg(unix)]
fn profiler_factory() -> Option<Arc<dyn ProfilerFactory>> {
    Some(Arc::new(hulk_admin::admin::PprofFactory))
}

#[cfg(not(unix))]
fn profiler_factory() -> Option<Arc<dyn ProfilerFactory>> {
    None
}
