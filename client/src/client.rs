//! Connect lifecycle of the Lit client.
//!
//! At most one connect round runs per client. Concurrent `connect()` calls
//! share the in-flight round and its outcome. A round stops the background
//! tasks, resolves the peer set and handshakes. Publishing the snapshot and
//! re-arming the epoch monitor and the blockhash sync happen together under
//! the connect lock, so `disconnect()` either precedes them or undoes them.

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use lit_network::{
    race, AttestationVerifier, BlockhashCache, BlockhashProvider, ChallengeBindingVerifier,
    ConfigResolver, HandshakeCoordinator, HandshakeRound, HttpTransport, IndexerBlockhashProvider,
    NetworkMetrics, NodeTransport, RequestDispatcher, RpcValidatorRegistry, SharedEpochState,
    ValidatorRegistry,
};
use lit_protocol::{compose_url, Endpoint, RequestId};
use lit_types::{ConsensusConfig, EpochState, LitError, NetworkProfile, Timestamp};
use lit_utils::format_duration_ms;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::RwLock as AsyncRwLock;

use crate::{throw_node_error, ClientConfig, EpochMonitor, NetworkSnapshot, NetworkSyncScheduler};

type ConnectFuture = Shared<BoxFuture<'static, Result<Arc<ConsensusConfig>, LitError>>>;

/// What background tasks need from the client.
#[async_trait]
pub trait Reconnector: Send + Sync {
    /// Bootstrap URLs of the current connection.
    fn current_bootstrap_urls(&self) -> Vec<String>;

    /// Run (or join) a connect round.
    async fn reconnect(&self) -> Result<(), LitError>;
}

/// Handle to a Lit network client. Cheap to clone.
#[derive(Clone)]
pub struct LitClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    profile: NetworkProfile,
    resolver: ConfigResolver,
    dispatcher: Arc<RequestDispatcher>,
    coordinator: HandshakeCoordinator,
    blockhash: Arc<BlockhashCache>,
    epoch: SharedEpochState,
    epoch_monitor: Option<EpochMonitor>,
    sync_scheduler: NetworkSyncScheduler,
    metrics: Arc<NetworkMetrics>,
    snapshot: RwLock<Option<Arc<NetworkSnapshot>>>,
    ready: AtomicBool,
    connecting: Mutex<Option<(u64, ConnectFuture)>>,
    generation: AtomicU64,
}

/// Builds a [`LitClient`], with real HTTP collaborators unless overridden.
///
/// Chain-resolved networks read the validator registry over JSON-RPC from
/// the profile's `rpc_url` unless a registry is injected.
pub struct LitClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn NodeTransport>>,
    registry: Option<Arc<dyn ValidatorRegistry>>,
    blockhash_provider: Option<Arc<dyn BlockhashProvider>>,
    verifier: Option<Arc<dyn AttestationVerifier>>,
    metrics: Option<Arc<NetworkMetrics>>,
}

impl LitClientBuilder {
    pub fn transport(mut self, transport: Arc<dyn NodeTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn ValidatorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn blockhash_provider(mut self, provider: Arc<dyn BlockhashProvider>) -> Self {
        self.blockhash_provider = Some(provider);
        self
    }

    pub fn attestation_verifier(mut self, verifier: Arc<dyn AttestationVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn metrics(mut self, metrics: Arc<NetworkMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<LitClient, LitError> {
        let config = self.config;
        config.validate()?;
        if let Some(ctx) = &config.contract_context {
            ctx.validate()?;
        }

        let metrics = match self.metrics {
            Some(m) => m,
            None => Arc::new(
                NetworkMetrics::new()
                    .map_err(|e| LitError::UnknownError(format!("registering metrics: {e}")))?,
            ),
        };
        let transport: Arc<dyn NodeTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new()),
        };
        let provider: Arc<dyn BlockhashProvider> = match self.blockhash_provider {
            Some(p) => p,
            None => Arc::new(IndexerBlockhashProvider::new(
                config.blockhash_indexer_url.clone(),
                config.fallback_rpc_urls.clone(),
            )),
        };
        let verifier: Arc<dyn AttestationVerifier> = match self.verifier {
            Some(v) => v,
            None => Arc::new(ChallengeBindingVerifier),
        };

        let profile = config.network_profile();
        let epoch: SharedEpochState = Arc::new(AsyncRwLock::new(EpochState::default()));
        let dispatcher = Arc::new(RequestDispatcher::new(
            transport,
            epoch.clone(),
            config.retry_policy,
            metrics.clone(),
        ));
        let coordinator = HandshakeCoordinator::new(dispatcher.clone(), verifier, metrics.clone());
        let registry: Option<Arc<dyn ValidatorRegistry>> = match (&profile, self.registry) {
            (_, Some(registry)) => Some(registry),
            (NetworkProfile::ChainResolved(p), None) => {
                let registry: Arc<dyn ValidatorRegistry> = Arc::new(RpcValidatorRegistry::new(
                    p.clone(),
                    config.contract_context.clone(),
                ));
                Some(registry)
            }
            (NetworkProfile::Static(_), None) => None,
        };
        let epoch_monitor = match (&profile, &registry) {
            (NetworkProfile::ChainResolved(p), Some(registry)) => Some(EpochMonitor::new(
                registry.clone(),
                p.clone(),
                config.contract_context.clone(),
                epoch.clone(),
                config.epoch_propagation_delay(),
            )),
            _ => None,
        };

        Ok(LitClient {
            inner: Arc::new(ClientInner {
                resolver: ConfigResolver::new(registry),
                blockhash: Arc::new(BlockhashCache::new(provider, config.blockhash_sync_interval_ms)),
                sync_scheduler: NetworkSyncScheduler::new(),
                snapshot: RwLock::new(None),
                ready: AtomicBool::new(false),
                connecting: Mutex::new(None),
                generation: AtomicU64::new(0),
                config,
                profile,
                dispatcher,
                coordinator,
                epoch,
                epoch_monitor,
                metrics,
            }),
        })
    }
}

impl LitClient {
    pub fn builder(config: ClientConfig) -> LitClientBuilder {
        LitClientBuilder {
            config,
            transport: None,
            registry: None,
            blockhash_provider: None,
            verifier: None,
            metrics: None,
        }
    }

    /// Connect to the network, or join the connect round already running.
    pub async fn connect(&self) -> Result<Arc<ConsensusConfig>, LitError> {
        let round = {
            let mut slot = lock(&self.inner.connecting);
            match slot.as_ref() {
                Some((_, round)) => round.clone(),
                None => {
                    let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let inner = self.inner.clone();
                    let handle =
                        tokio::spawn(async move { inner.run_connect_round(generation).await });
                    let round: ConnectFuture = async move {
                        handle.await.unwrap_or_else(|e| {
                            Err(LitError::UnknownError(format!("connect round aborted: {e}")))
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some((generation, round.clone()));
                    round
                }
            }
        };

        round.await
    }

    /// Stop background tasks and mark the client not ready.
    ///
    /// A round still in flight is abandoned: its callers get an error and
    /// its result is never published. The last snapshot stays readable.
    pub fn disconnect(&self) {
        let mut slot = lock(&self.inner.connecting);
        let abandoned = slot.take().map(|(generation, _)| generation);
        self.inner.stop_background();
        self.inner.ready.store(false, Ordering::SeqCst);
        drop(slot);
        if let Some(generation) = abandoned {
            tracing::debug!(generation, "abandoned the in-flight connect round");
        }
        tracing::info!(network = %self.inner.config.lit_network, "disconnected");
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &Arc<NetworkMetrics> {
        &self.inner.metrics
    }

    /// The most recently published connection state.
    pub fn snapshot(&self) -> Option<Arc<NetworkSnapshot>> {
        self.inner.snapshot()
    }

    pub fn consensus(&self) -> Option<Arc<ConsensusConfig>> {
        self.snapshot().map(|s| s.consensus.clone())
    }

    pub fn connected_peers(&self) -> Vec<String> {
        self.snapshot()
            .map(|s| s.connected_peers.clone())
            .unwrap_or_default()
    }

    /// Connected peers as `host:port`.
    pub fn node_set(&self) -> Vec<String> {
        self.snapshot().map(|s| s.node_set()).unwrap_or_default()
    }

    /// Last known epoch state, without touching the network.
    pub async fn epoch_state(&self) -> EpochState {
        *self.inner.epoch.read().await
    }

    /// The latest blockhash; cached while fresh, refreshed otherwise.
    pub async fn get_latest_blockhash(&self) -> Result<String, LitError> {
        self.inner.blockhash.get_or_refresh(Timestamp::now()).await
    }

    /// Live read of the registry's epoch.
    pub async fn get_current_epoch_number(&self) -> Result<u64, LitError> {
        match &self.inner.epoch_monitor {
            Some(monitor) => monitor.current_epoch_number().await,
            None => Err(LitError::UnknownError(format!(
                "network {} has no validator registry to read the epoch from",
                self.inner.config.lit_network
            ))),
        }
    }

    /// Send a request to every connected peer and wait for `min_node_count`
    /// successes (the round's quorum when `None`).
    pub async fn send_to_quorum<F>(
        &self,
        endpoint: &Endpoint,
        body_for_url: F,
        min_node_count: Option<usize>,
    ) -> Result<Vec<(String, Value)>, LitError>
    where
        F: Fn(&str) -> Value,
    {
        let snapshot = match self.snapshot() {
            Some(s) if self.is_ready() => s,
            _ => {
                return Err(LitError::InitError(
                    "client is not connected; call connect() first".into(),
                ))
            }
        };
        let required = min_node_count.unwrap_or(snapshot.min_node_count);
        let request_id = RequestId::generate()?;

        let dispatcher = &self.inner.dispatcher;
        let operations = snapshot.connected_peers.iter().map(|peer| {
            let url = compose_url(peer, endpoint);
            let body = body_for_url(peer);
            let request_id = &request_id;
            async move {
                dispatcher
                    .send(&url, request_id, &body)
                    .await
                    .map(|response| (peer.clone(), response))
            }
        });

        race(operations, required).await.map_err(|failure| {
            throw_node_error(failure, self.inner.config.alert_when_unauthorized, &request_id)
        })
    }
}

impl ClientInner {
    fn snapshot(&self) -> Option<Arc<NetworkSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn stop_background(&self) {
        if let Some(monitor) = &self.epoch_monitor {
            monitor.stop();
        }
        self.sync_scheduler.stop();
    }

    fn arm_background(self: &Arc<Self>) {
        let reconnector: Arc<dyn Reconnector> = Arc::new(ClientReconnector(Arc::downgrade(self)));
        if let Some(monitor) = &self.epoch_monitor {
            if let Err(e) = monitor.start(reconnector.clone()) {
                tracing::warn!(error = %e, "epoch monitoring unavailable");
            }
        }
        self.sync_scheduler.start(
            self.config.blockhash_sync_interval(),
            self.blockhash.clone(),
            reconnector,
        );
    }

    /// Runs in its own task; cancelling a caller never cancels the round.
    ///
    /// The outcome is applied under the `connecting` lock, and only while
    /// this round still owns the slot. A round that lost its slot to
    /// `disconnect()` publishes nothing.
    async fn run_connect_round(
        self: Arc<Self>,
        generation: u64,
    ) -> Result<Arc<ConsensusConfig>, LitError> {
        self.stop_background();
        let result = self.connect_round().await;

        let mut slot = lock(&self.connecting);
        if !slot.as_ref().is_some_and(|(g, _)| *g == generation) {
            drop(slot);
            tracing::info!(network = %self.config.lit_network, generation, "connect round finished after disconnect; discarding it");
            return Err(LitError::InitError(
                "client was disconnected while connecting".into(),
            ));
        }
        *slot = None;

        match result {
            Ok(snapshot) => {
                self.publish(&snapshot);
                self.arm_background();
                self.ready.store(true, Ordering::SeqCst);
                drop(slot);
                Ok(snapshot.consensus.clone())
            }
            Err(e) => {
                if self.ready.load(Ordering::SeqCst) {
                    // Keep syncing on top of the previous snapshot.
                    self.arm_background();
                }
                drop(slot);
                tracing::error!(network = %self.config.lit_network, error = %e, "connect failed");
                Err(e)
            }
        }
    }

    /// Resolve and handshake; the caller decides whether to publish.
    async fn connect_round(&self) -> Result<Arc<NetworkSnapshot>, LitError> {
        let started = Timestamp::now();
        let resolved = self
            .resolver
            .resolve(
                &self.profile,
                self.config.contract_context.as_ref(),
                self.config.min_node_count,
            )
            .await?;
        if let Some(epoch) = resolved.epoch {
            *self.epoch.write().await = epoch;
        }

        let outcome = self
            .coordinator
            .handshake_all(&HandshakeRound {
                bootstrap_urls: resolved.bootstrap_urls.clone(),
                min_node_count: resolved.min_node_count,
                connect_timeout: self.config.connect_timeout(),
                attestation_required: self.config.attestation_required(),
            })
            .await?;

        let snapshot = Arc::new(NetworkSnapshot {
            network: self.config.lit_network,
            min_node_count: resolved.min_node_count,
            bootstrap_urls: resolved.bootstrap_urls,
            connected_peers: outcome.connected_peers,
            peer_results: outcome.peer_results,
            consensus: Arc::new(outcome.consensus),
            request_id: outcome.request_id,
            connected_at: Timestamp::now(),
        });

        let epoch = self.epoch.read().await.number;
        tracing::info!(
            network = %self.config.lit_network,
            connected = snapshot.connected_peers.len(),
            required = snapshot.min_node_count,
            epoch = ?epoch,
            elapsed = %format_duration_ms(started.elapsed_since(Timestamp::now())),
            "connected to the Lit network"
        );
        Ok(snapshot)
    }

    fn publish(&self, snapshot: &Arc<NetworkSnapshot>) {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Some(snapshot.clone());
        self.blockhash.seed(
            snapshot.consensus.latest_blockhash.clone(),
            snapshot.consensus.last_blockhash_retrieved_at,
        );
    }
}

struct ClientReconnector(Weak<ClientInner>);

#[async_trait]
impl Reconnector for ClientReconnector {
    fn current_bootstrap_urls(&self) -> Vec<String> {
        self.0
            .upgrade()
            .and_then(|inner| inner.snapshot())
            .map(|s| s.bootstrap_urls.clone())
            .unwrap_or_default()
    }

    async fn reconnect(&self) -> Result<(), LitError> {
        let inner = self
            .0
            .upgrade()
            .ok_or_else(|| LitError::UnknownError("client was dropped".into()))?;
        LitClient { inner }.connect().await.map(|_| ())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
