use std::sync::{Arc, RwLock};

use infer_broker::{BrokerFactory, ComputeError};

use crate::activation::ActivationStore;
use crate::config::ComputeConfig;
use crate::connection::{Connection, ConnectionRegistry};

/// Entry point for inference and ledger operations.
///
/// Owns the identity -> connection registry. Keep one instance per process
/// (or per test) and share it; connections are memoized inside it for as long
/// as it lives.
pub struct ComputeClient<F: BrokerFactory> {
    factory: Arc<F>,
    registry: ConnectionRegistry<F>,
    store: Option<Arc<ActivationStore>>,
    current: RwLock<Option<Arc<Connection<F>>>>,
    pub(crate) http: reqwest::Client,
}

impl<F: BrokerFactory> ComputeClient<F> {
    pub fn new(factory: F) -> Self {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self {
            factory: Arc::new(factory),
            registry: ConnectionRegistry::new(),
            store: None,
            current: RwLock::new(None),
            http,
        }
    }

    /// Share one activation store across every connection instead of opening
    /// one per configured state path.
    pub fn with_activation_store(mut self, store: Arc<ActivationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Create a client with a custom reqwest::Client.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn registry(&self) -> &ConnectionRegistry<F> {
        &self.registry
    }

    /// Memoized connection for the config's identity. Does not initialize it.
    ///
    /// The first connection obtained becomes the client's current connection
    /// unless one was already set.
    pub fn connect(&self, config: &ComputeConfig) -> Result<Arc<Connection<F>>, ComputeError> {
        let connection = self
            .registry
            .get_or_create(config, &self.factory, self.store.as_ref())?;

        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if current.is_none() {
            *current = Some(connection.clone());
        }
        Ok(connection)
    }

    /// Connect, initialize, and make this identity the current connection.
    pub async fn initialize(
        &self,
        config: &ComputeConfig,
    ) -> Result<Arc<Connection<F>>, ComputeError> {
        let connection = self
            .registry
            .get_or_create(config, &self.factory, self.store.as_ref())?;
        connection.init().await?;

        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(connection.clone());
        Ok(connection)
    }

    /// Current connection, created from the environment if none was set up.
    pub fn connection(&self) -> Result<Arc<Connection<F>>, ComputeError> {
        if let Some(connection) = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
        {
            return Ok(connection.clone());
        }

        tracing::debug!("no connection configured, loading from environment");
        let config = ComputeConfig::from_env()?;
        self.connect(&config)
    }

    /// Drop every memoized connection.
    pub fn reset(&self) {
        self.registry.clear();
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}
