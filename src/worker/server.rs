use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::worker_routes;
use super::WorkerCache;
use crate::network::bind_server;
use crate::network::Authenticator;
use crate::Result;
use crate::Settings;

/// A worker process: one cache behind the worker routes.
pub struct Worker {
    listen_address: SocketAddr,
    cache: Arc<WorkerCache>,
    auth: Arc<Authenticator>,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(
        settings: &Settings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            listen_address: settings.worker.listen_address,
            cache: Arc::new(WorkerCache::new()),
            auth: Arc::new(Authenticator::for_worker(&settings.auth)),
            shutdown,
        }
    }

    pub fn cache(&self) -> Arc<WorkerCache> {
        self.cache.clone()
    }

    /// Binds the worker routes on `addr`. The returned future serves until
    /// shutdown.
    pub fn bind(
        &self,
        addr: SocketAddr,
    ) -> Result<(SocketAddr, impl Future<Output = ()>)> {
        let routes = worker_routes(self.cache.clone(), self.auth.clone());
        bind_server(routes, addr, self.shutdown.clone())
    }

    pub async fn serve(self) -> Result<()> {
        let (addr, server) = self.bind(self.listen_address)?;
        info!("worker listening on {}", addr);
        server.await;
        info!("worker http server stopped");
        Ok(())
    }
}
