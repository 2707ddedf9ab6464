//! Assembles a [`Controller`] from [`Settings`].
//!
//! Defaults are the production components: the stores selected by
//! `controller.store.kind` (sled under `controller.db_path`, or redis) and
//! the broker selected by `controller.broker.kind`.
//! Any of them can be replaced before `build()`, which is how tests run a
//! controller on in-memory stores, or several controllers on one shared
//! [`LocalBroker`].
//!
//! ```ignore
//! let shutdown = CancellationToken::new();
//! let controller = ControllerBuilder::new(settings, shutdown.clone())
//!     .broker(Arc::new(LocalBroker::default()))
//!     .build()
//!     .await?;
//! controller.serve().await?;
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use super::controller_routes;
use super::AgentService;
use super::BrokerBridge;
use super::ConfigService;
use super::ConfigWatcher;
use super::ControllerState;
use super::LocalBroker;
use super::LongPollNotifier;
use super::RedisBroker;
use super::UpdateBroker;
use crate::metrics;
use crate::network::bind_server;
use crate::network::Authenticator;
use crate::storage::init_redis_stores;
use crate::storage::init_sled_db;
use crate::storage::AgentStore;
use crate::storage::ConfigStore;
use crate::storage::SledAgentStore;
use crate::storage::SledConfigStore;
use crate::BrokerKind;
use crate::ControllerConfig;
use crate::Result;
use crate::Settings;
use crate::StoreKind;

pub struct ControllerBuilder {
    settings: Settings,
    config_store: Option<Arc<dyn ConfigStore>>,
    agent_store: Option<Arc<dyn AgentStore>>,
    broker: Option<Arc<dyn UpdateBroker>>,
    shutdown: CancellationToken,
}

impl ControllerBuilder {
    pub fn new(
        settings: Settings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            settings,
            config_store: None,
            agent_store: None,
            broker: None,
            shutdown,
        }
    }

    pub fn config_store(
        mut self,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        self.config_store = Some(store);
        self
    }

    pub fn agent_store(
        mut self,
        store: Arc<dyn AgentStore>,
    ) -> Self {
        self.agent_store = Some(store);
        self
    }

    pub fn broker(
        mut self,
        broker: Arc<dyn UpdateBroker>,
    ) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Opens whatever was not supplied, wires the services and starts the
    /// broker bridge.
    pub async fn build(self) -> Result<Controller> {
        let ControllerBuilder {
            settings,
            config_store,
            agent_store,
            broker,
            shutdown,
        } = self;

        let (config_store, agent_store) = match (config_store, agent_store) {
            (Some(configs), Some(agents)) => (configs, agents),
            (configs, agents) => {
                let (default_configs, default_agents) = open_stores(&settings.controller).await?;
                (
                    configs.unwrap_or(default_configs),
                    agents.unwrap_or(default_agents),
                )
            }
        };

        let broker: Arc<dyn UpdateBroker> = match broker {
            Some(broker) => broker,
            None => match settings.controller.broker.kind {
                BrokerKind::Local => {
                    warn!("local broker selected: updates only reach watchers on this instance");
                    Arc::new(LocalBroker::default())
                }
                BrokerKind::Redis => Arc::new(RedisBroker::new(&settings.controller.broker)?),
            },
        };

        let notifier = Arc::new(LongPollNotifier::new());
        let config_service = Arc::new(ConfigService::new(
            config_store,
            settings.controller.save_conflict_retries,
        ));
        let agent_service = Arc::new(AgentService::new(
            agent_store,
            settings.controller.poll_url.clone(),
            settings.controller.poll_interval_seconds,
        ));
        let watcher = Arc::new(ConfigWatcher::new(
            config_service.clone(),
            notifier.clone(),
            settings.controller.watch_timeout(),
        ));

        let bridge = BrokerBridge::new(
            broker.clone(),
            notifier.clone(),
            Duration::from_millis(settings.controller.broker.resubscribe_delay_ms),
            shutdown.clone(),
        )
        .start()
        .await;

        let state = ControllerState {
            config_service,
            agent_service,
            watcher,
            broker,
            auth: Arc::new(Authenticator::for_controller(&settings.auth)),
            shutdown: shutdown.clone(),
        };

        Ok(Controller {
            settings: Arc::new(settings),
            state,
            notifier,
            bridge,
            shutdown,
        })
    }
}

/// Opens the stores selected by `controller.store.kind`.
async fn open_stores(config: &ControllerConfig) -> Result<(Arc<dyn ConfigStore>, Arc<dyn AgentStore>)> {
    match config.store.kind {
        StoreKind::Sled => {
            info!("opening controller db at {:?}", config.db_path);
            let db = init_sled_db(&config.db_path)?;
            Ok((Arc::new(SledConfigStore::new(&db)?), Arc::new(SledAgentStore::new(&db)?)))
        }
        StoreKind::Redis => {
            let (configs, agents) = init_redis_stores(&config.store).await?;
            Ok((Arc::new(configs), Arc::new(agents)))
        }
    }
}

/// A wired controller instance, ready to serve HTTP.
pub struct Controller {
    pub settings: Arc<Settings>,
    state: ControllerState,
    notifier: Arc<LongPollNotifier>,
    bridge: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl Controller {
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn notifier(&self) -> Arc<LongPollNotifier> {
        self.notifier.clone()
    }

    /// Binds the HTTP routes on `addr`. The returned future serves until
    /// shutdown.
    pub fn bind(
        &self,
        addr: SocketAddr,
    ) -> Result<(SocketAddr, impl Future<Output = ()>)> {
        let routes = controller_routes(self.state.clone(), &self.settings.controller.poll_url);
        bind_server(routes, addr, self.shutdown.clone())
    }

    /// Serves on `controller.listen_address` (plus the metrics exporter when
    /// enabled) until shutdown, then waits for the broker bridge to stop.
    pub async fn serve(self) -> Result<()> {
        if self.settings.monitoring.prometheus_enabled {
            tokio::spawn(metrics::start_server(
                self.settings.monitoring.prometheus_port,
                self.shutdown.clone(),
            ));
        }

        let (addr, server) = self.bind(self.settings.controller.listen_address)?;
        info!("controller listening on {}", addr);
        server.await;

        info!("controller http server stopped");
        self.bridge.await.map_err(crate::SystemError::TaskFailed)?;
        Ok(())
    }
}
