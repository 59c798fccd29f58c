//! Lazy, memoized broker connections keyed by signing identity.
//!
//! Each identity moves through `Uninitialized -> Initializing -> Ready | Failed`.
//! Concurrent callers that arrive while an initialization is in flight await
//! the same shared future and observe the same outcome. `Failed` is not
//! terminal: the next acquisition starts a fresh attempt.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::Address;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use infer_broker::wallet::parse_signer;
use infer_broker::{units, with_retry, Broker, BrokerFactory, ComputeError, Wallet};

use crate::activation::ActivationStore;
use crate::config::ComputeConfig;

/// What makes two configurations share a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub address: Address,
    pub rpc_url: String,
}

impl IdentityKey {
    pub fn from_config(config: &ComputeConfig) -> Result<Self, ComputeError> {
        let signer = parse_signer(&config.private_key)?;
        url::Url::parse(&config.rpc_url).map_err(|e| {
            ComputeError::Configuration(format!("invalid RPC URL {}: {e}", config.rpc_url))
        })?;
        Ok(Self {
            address: signer.address(),
            rpc_url: config.rpc_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Observable lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

type InitFuture<B> = Shared<BoxFuture<'static, Result<Arc<B>, ComputeError>>>;

enum Lifecycle<B> {
    Uninitialized,
    Initializing {
        generation: u64,
        pending: InitFuture<B>,
    },
    Ready(Arc<B>),
    Failed(ComputeError),
}

/// Broker connection for one signing identity.
pub struct Connection<F: BrokerFactory> {
    address: Address,
    config: ComputeConfig,
    factory: Arc<F>,
    store: Arc<ActivationStore>,
    activated: AtomicBool,
    generation: AtomicU64,
    lifecycle: Mutex<Lifecycle<F::Broker>>,
}

impl<F: BrokerFactory> std::fmt::Debug for Connection<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("rpc_url", &self.config.rpc_url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<F: BrokerFactory> Connection<F> {
    fn new(
        key: &IdentityKey,
        config: ComputeConfig,
        factory: Arc<F>,
        store: Arc<ActivationStore>,
    ) -> Self {
        let activated = store.is_activated(key.address);
        Self {
            address: key.address,
            config,
            factory,
            store,
            activated: AtomicBool::new(activated),
            generation: AtomicU64::new(0),
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &ComputeConfig {
        &self.config
    }

    pub fn activation_store(&self) -> &ActivationStore {
        &self.store
    }

    /// Whether the one-time activation deposit is known to have completed.
    pub fn activation_completed(&self) -> bool {
        self.activated.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConnectionState {
        match &*self.lock() {
            Lifecycle::Uninitialized => ConnectionState::Uninitialized,
            Lifecycle::Initializing { .. } => ConnectionState::Initializing,
            Lifecycle::Ready(_) => ConnectionState::Ready,
            Lifecycle::Failed(_) => ConnectionState::Failed,
        }
    }

    /// Error from the most recent failed initialization, if that is the current state.
    pub fn last_error(&self) -> Option<ComputeError> {
        match &*self.lock() {
            Lifecycle::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// Ready broker handle; counts as one request against the identity.
    pub async fn acquire_broker(self: &Arc<Self>) -> Result<Arc<F::Broker>, ComputeError> {
        let broker = self.init().await?;

        let store = self.store.clone();
        let address = self.address;
        let rpc_url = self.config.rpc_url.clone();
        if let Err(e) =
            tokio::task::spawn_blocking(move || store.record_request(address, &rpc_url)).await
        {
            tracing::warn!(error = %e, "failed to record request");
        }
        Ok(broker)
    }

    /// Initialize once. A no-op when ready; joins the in-flight attempt when
    /// one is running; starts a new attempt otherwise.
    pub async fn init(self: &Arc<Self>) -> Result<Arc<F::Broker>, ComputeError> {
        let (generation, pending) = {
            let mut lifecycle = self.lock();
            let in_flight = match &*lifecycle {
                Lifecycle::Ready(broker) => return Ok(broker.clone()),
                Lifecycle::Initializing {
                    generation,
                    pending,
                } => Some((*generation, pending.clone())),
                Lifecycle::Uninitialized | Lifecycle::Failed(_) => None,
            };
            match in_flight {
                Some(joined) => joined,
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::info!(address = %self.address, generation, "initializing broker connection");
                    let pending = self.clone().run_init().boxed().shared();
                    *lifecycle = Lifecycle::Initializing {
                        generation,
                        pending: pending.clone(),
                    };
                    (generation, pending)
                }
            }
        };

        let outcome = pending.await;

        let mut lifecycle = self.lock();
        // A later attempt may already own the state; only settle our own.
        if matches!(&*lifecycle, Lifecycle::Initializing { generation: g, .. } if *g == generation)
        {
            *lifecycle = match &outcome {
                Ok(broker) => Lifecycle::Ready(broker.clone()),
                Err(e) => Lifecycle::Failed(e.clone()),
            };
        }
        outcome
    }

    async fn run_init(self: Arc<Self>) -> Result<Arc<F::Broker>, ComputeError> {
        let policy = self.config.retry_policy();
        let rpc_url = self.config.rpc_url.as_str();

        with_retry(&policy, "checkConnectivity", || {
            self.factory.check_connectivity(rpc_url)
        })
        .await
        .map_err(|e| init_failure("network connectivity check", e))?;

        let wallet = Wallet::connect(&self.config.private_key, rpc_url)
            .map_err(|e| init_failure("wallet setup", e))?;

        let broker = with_retry(&policy, "createBroker", || {
            self.factory.create_broker(&wallet)
        })
        .await
        .map_err(|e| init_failure("broker creation", e))?;
        let broker = Arc::new(broker);

        self.activate_once(&broker).await;

        tracing::info!(address = %self.address, "broker connection ready");
        Ok(broker)
    }

    /// One-time activation deposit. Failures are logged, never propagated:
    /// the account can be funded manually later.
    async fn activate_once(&self, broker: &F::Broker) {
        if !self.config.auto_deposit {
            return;
        }
        // The persisted record is authoritative across restarts.
        if self.activation_completed() || self.store.is_activated(self.address) {
            self.activated.store(true, Ordering::SeqCst);
            tracing::debug!(address = %self.address, "account already activated");
            return;
        }

        let amount = match units::from_display(self.config.activation_deposit) {
            Ok(amount) => amount,
            Err(e) => {
                tracing::warn!(error = %e, "invalid activation deposit amount, skipping activation");
                return;
            }
        };

        match broker.deposit_fund(amount).await {
            Ok(()) => {
                self.store.mark_activated(self.address, &self.config.rpc_url);
                self.activated.store(true, Ordering::SeqCst);
                tracing::info!(
                    address = %self.address,
                    amount = self.config.activation_deposit,
                    "account activated"
                );
            }
            Err(e) => {
                tracing::warn!(
                    address = %self.address,
                    error = %e,
                    "activation deposit failed; fund the ledger manually"
                );
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle<F::Broker>> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn init_failure(step: &str, err: impl std::fmt::Display) -> ComputeError {
    ComputeError::network(format!("failed to initialize connection: {step} failed: {err}"))
}

/// Identity -> connection map.
pub struct ConnectionRegistry<F: BrokerFactory> {
    connections: DashMap<IdentityKey, Arc<Connection<F>>>,
}

impl<F: BrokerFactory> Default for ConnectionRegistry<F> {
    fn default() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }
}

impl<F: BrokerFactory> ConnectionRegistry<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connection for the config's identity, registering a new one if needed.
    ///
    /// Registration happens before any initialization, so concurrent callers
    /// for one identity always share a single entry.
    pub fn get_or_create(
        &self,
        config: &ComputeConfig,
        factory: &Arc<F>,
        store: Option<&Arc<ActivationStore>>,
    ) -> Result<Arc<Connection<F>>, ComputeError> {
        let key = IdentityKey::from_config(config)?;
        let connection = match self.connections.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let existing = entry.get();
                if existing.config() != config {
                    // The first config for an identity wins for the registry's lifetime.
                    tracing::warn!(
                        address = %key.address,
                        rpc_url = %key.rpc_url,
                        "identity already connected with different settings; keeping the original config"
                    );
                }
                existing.clone()
            }
            Entry::Vacant(entry) => {
                let store = store
                    .cloned()
                    .unwrap_or_else(|| Arc::new(ActivationStore::open(config.state_path.clone())));
                tracing::debug!(address = %key.address, rpc_url = %key.rpc_url, "registered connection");
                entry
                    .insert(Arc::new(Connection::new(&key, config.clone(), factory.clone(), store)))
                    .value()
                    .clone()
            }
        };
        Ok(connection)
    }

    pub fn get(&self, key: &IdentityKey) -> Option<Arc<Connection<F>>> {
        self.connections.get(key).map(|c| c.clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Forget every connection.
    pub fn clear(&self) {
        self.connections.clear();
    }
}
