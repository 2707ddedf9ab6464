//! Agent state machine: `Unregistered → Registering → Active → Terminated`.
//!
//! Everything runs on one logical thread of control. Registration retries and
//! poll retries are sequential backoff loops; the poll ticker keeps its
//! wall-clock period while a backoff sleep is in progress, so ticks may be
//! skipped after failures.

use std::env;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::AgentLocalState;
use super::ControllerClient;
use super::FetchOutcome;
use super::FileStateStore;
use super::HttpControllerClient;
use super::HttpWorkerClient;
use super::StateStore;
use super::WorkerClient;
use crate::constants::DEFAULT_HOSTNAME;
use crate::utils::backoff::sleep_or_cancelled;
use crate::utils::backoff::ExponentialBackoff;
use crate::Error;
use crate::Result;
use crate::RetryPolicies;
use crate::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    Unregistered,
    Registering,
    Active,
    Terminated,
}

/// Why the poll loop returned
enum PollExit {
    Cancelled,
    IdentityRejected,
}

/// Hostname reported at registration: `HOSTNAME`, else `unknown`.
pub fn local_hostname() -> String {
    env::var("HOSTNAME")
        .ok()
        .filter(|host| !host.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string())
}

pub struct AgentRuntime {
    name: String,
    host: String,
    controller: Arc<dyn ControllerClient>,
    worker: Arc<dyn WorkerClient>,
    store: Arc<dyn StateStore>,
    retry: RetryPolicies,
    relay_retry: bool,

    /// Single writer lock over identity, tag and cached document
    state: Mutex<AgentLocalState>,
    /// Set when the cached document has not reached the worker yet
    relay_pending: AtomicBool,
    phase: watch::Sender<AgentPhase>,
}

impl AgentRuntime {
    pub fn new(
        settings: &Settings,
        controller: Arc<dyn ControllerClient>,
        worker: Arc<dyn WorkerClient>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let (phase, _) = watch::channel(AgentPhase::Unregistered);
        Self {
            name: settings.agent.name.clone(),
            host: local_hostname(),
            controller,
            worker,
            store,
            retry: settings.retry.clone(),
            relay_retry: settings.agent.relay_retry,
            state: Mutex::new(AgentLocalState::default()),
            relay_pending: AtomicBool::new(false),
            phase,
        }
    }

    /// Production wiring: HTTP clients and the JSON state file.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = settings.agent.request_timeout();
        let controller = HttpControllerClient::new(
            &settings.agent.controller_url,
            &settings.auth.controller_secret,
            timeout,
        )?;
        let worker = HttpWorkerClient::new(&settings.agent.worker_url, &settings.auth.worker_secret, timeout)?;
        let store = FileStateStore::new(&settings.agent.state_path);

        Ok(Self::new(settings, Arc::new(controller), Arc::new(worker), Arc::new(store)))
    }

    pub fn state(&self) -> AgentLocalState {
        self.state.lock().clone()
    }

    pub fn phase(&self) -> AgentPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<AgentPhase> {
        self.phase.subscribe()
    }

    /// Runs until `cancel` fires.
    ///
    /// # Errors
    /// Only `Error::Fatal`, when registration exhausted a bounded retry
    /// policy. Poll and relay failures are retried forever.
    pub async fn run(
        &self,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.restore().await;

        // spans identity-loss cycles; reset once a poll is accepted
        let mut rejections = ExponentialBackoff::new(self.retry.registration);

        let result = loop {
            if !self.state.lock().has_identity() {
                match self.register(&cancel).await {
                    Ok(true) => {}
                    Ok(false) => break Ok(()),
                    Err(e) => break Err(e),
                }
            }

            match self.poll_loop(&cancel, &mut rejections).await {
                PollExit::Cancelled => break Ok(()),
                PollExit::IdentityRejected => {
                    self.forget_identity().await;
                    let delay = rejections.next_delay();
                    warn!(?delay, "registering again after identity rejection");
                    if !sleep_or_cancelled(delay, &cancel).await {
                        break Ok(());
                    }
                }
            }
        };

        self.phase.send_replace(AgentPhase::Terminated);
        info!("agent stopped");
        result
    }

    async fn restore(&self) {
        let Some(restored) = self.store.load().await else {
            info!("no prior agent state");
            return;
        };

        info!(agent_id = %restored.agent_id, etag = %restored.etag, "restore state value");
        let cached = restored.config.clone();
        *self.state.lock() = restored;

        // the worker may have restarted and lost its cache
        if let Some(config) = cached {
            self.relay(&config).await;
        }
    }

    /// Returns `Ok(false)` when cancelled.
    async fn register(
        &self,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.phase.send_replace(AgentPhase::Registering);
        let mut backoff = ExponentialBackoff::new(self.retry.registration);

        loop {
            info!("attempting to register");
            let result = tokio::select! {
                _ = cancel.cancelled() => return Ok(false),
                result = self.controller.register(&self.name, &self.host) => result,
            };

            match result {
                Ok(registration) => {
                    let snapshot = {
                        let mut state = self.state.lock();
                        state.apply_registration(&registration);
                        state.clone()
                    };
                    self.persist(&snapshot).await;
                    info!(
                        agent_id = %registration.agent_id,
                        poll_url = %registration.poll_url,
                        poll_interval = registration.poll_interval_seconds,
                        "registered agent"
                    );
                    return Ok(true);
                }
                Err(e) => {
                    if backoff.is_exhausted() {
                        error!("giving up registration after {} retries: {:?}", backoff.attempts(), e);
                        return Err(Error::Fatal(format!("registration failed: {e}")));
                    }
                    let delay = backoff.next_delay();
                    warn!(?delay, "failed register agent: {:?}", e);
                    if !sleep_or_cancelled(delay, cancel).await {
                        return Ok(false);
                    }
                }
            }
        }
    }

    async fn poll_loop(
        &self,
        cancel: &CancellationToken,
        rejections: &mut ExponentialBackoff,
    ) -> PollExit {
        self.phase.send_replace(AgentPhase::Active);

        let period = self.state.lock().poll_interval();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut backoff = ExponentialBackoff::new(self.retry.polling);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return PollExit::Cancelled,
                _ = ticker.tick() => {}
            }

            if self.relay_retry && self.relay_pending.load(Ordering::Acquire) {
                self.retry_relay().await;
            }

            let (agent_id, etag, poll_url) = {
                let state = self.state.lock();
                (state.agent_id.clone(), state.etag.clone(), state.poll_url.clone())
            };

            let result = tokio::select! {
                _ = cancel.cancelled() => return PollExit::Cancelled,
                result = self.controller.fetch_config(&agent_id, &etag, &poll_url) => result,
            };

            match result {
                Ok(FetchOutcome::NotModified) => {
                    backoff.reset();
                    rejections.reset();
                    debug!("data not modified");
                }
                Ok(FetchOutcome::Updated { etag, config }) => {
                    backoff.reset();
                    rejections.reset();
                    self.apply_update(etag, config).await;
                }
                Err(e) if e.is_identity_rejected() => {
                    warn!(agent_id, "controller rejected agent identity: {}", e);
                    return PollExit::IdentityRejected;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    error!(?delay, "poll failed: {:?}", e);
                    if !sleep_or_cancelled(delay, cancel).await {
                        return PollExit::Cancelled;
                    }
                }
            }
        }
    }

    async fn apply_update(
        &self,
        etag: String,
        config: Value,
    ) {
        info!(etag, "configuration updated");
        let snapshot = {
            let mut state = self.state.lock();
            state.apply_update(etag, config.clone());
            state.clone()
        };
        self.persist(&snapshot).await;
        self.relay(&config).await;
    }

    /// Clears the identity, keeping the cached document and its tag, so the
    /// next loop iteration registers again.
    async fn forget_identity(&self) {
        let snapshot = {
            let mut state = self.state.lock();
            state.clear_identity();
            state.clone()
        };
        self.persist(&snapshot).await;
        self.phase.send_replace(AgentPhase::Unregistered);
    }

    async fn retry_relay(&self) {
        let cached = self.state.lock().config.clone();
        match cached {
            Some(config) => {
                debug!("retrying relay of cached configuration");
                self.relay(&config).await;
            }
            None => self.relay_pending.store(false, Ordering::Release),
        }
    }

    async fn relay(
        &self,
        config: &Value,
    ) {
        match self.worker.push_config(config).await {
            Ok(()) => {
                self.relay_pending.store(false, Ordering::Release);
                debug!("configuration relayed to worker");
            }
            Err(e) => {
                self.relay_pending.store(true, Ordering::Release);
                error!("failed push update to worker: {:?}", e);
            }
        }
    }

    async fn persist(
        &self,
        snapshot: &AgentLocalState,
    ) {
        if let Err(e) = self.store.save(snapshot).await {
            error!("failed to persist agent state: {:?}", e);
        }
    }
}
