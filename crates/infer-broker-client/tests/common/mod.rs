//! In-process broker double shared by the integration tests.
//!
//! The fake counts every call so tests can assert which pipeline steps ran,
//! and serves whatever services, metadata and ledger a test configures.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, U256};
use infer_broker::{
    Broker, BrokerError, BrokerFactory, LedgerSnapshot, ServiceDescriptor, ServiceMetadata, Wallet,
};
use infer_client::{ActivationStore, ComputeClient, ComputeConfig};

/// Hardhat account #0.
pub const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
/// Hardhat account #1.
pub const SECOND_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const TEST_RPC: &str = "http://127.0.0.1:8545";

pub const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

#[derive(Default)]
pub struct Counters {
    pub create_broker: AtomicU32,
    pub list_services: AtomicU32,
    pub acknowledge: AtomicU32,
    pub metadata: AtomicU32,
    pub headers: AtomicU32,
    pub deposits: AtomicU32,
    pub refunds: AtomicU32,
}

impl Counters {
    pub fn get(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeState {
    pub calls: Counters,
    pub services: Mutex<Vec<ServiceDescriptor>>,
    pub metadata: Mutex<HashMap<Address, ServiceMetadata>>,
    pub ledger: Mutex<LedgerSnapshot>,
    pub acknowledged: Mutex<HashSet<Address>>,
    pub last_header_content: Mutex<Option<String>>,
    /// Upcoming `create_broker` calls that fail.
    pub create_failures: AtomicU32,
    /// Upcoming `list_services` calls that fail.
    pub list_failures: AtomicU32,
    pub create_delay: Mutex<Option<Duration>>,
    pub deposit_fails: AtomicBool,
}

impl FakeState {
    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[derive(Clone, Default)]
pub struct FakeFactory {
    pub state: Arc<FakeState>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(self, service: ServiceDescriptor, metadata: ServiceMetadata) -> Self {
        self.state
            .metadata
            .lock()
            .unwrap()
            .insert(service.provider, metadata);
        self.state.services.lock().unwrap().push(service);
        self
    }

    pub fn with_ledger(self, total: u128, locked: u128) -> Self {
        *self.state.ledger.lock().unwrap() = LedgerSnapshot {
            total_balance: U256::from(total),
            locked: U256::from(locked),
        };
        self
    }

    pub fn calls(&self) -> &Counters {
        &self.state.calls
    }
}

impl BrokerFactory for FakeFactory {
    type Broker = FakeBroker;

    fn check_connectivity(
        &self,
        _rpc_url: &str,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send {
        async { Ok(()) }
    }

    fn create_broker(
        &self,
        _wallet: &Wallet,
    ) -> impl Future<Output = Result<FakeBroker, BrokerError>> + Send {
        let state = self.state.clone();
        async move {
            state.calls.create_broker.fetch_add(1, Ordering::SeqCst);
            let delay = *state.create_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if FakeState::take_failure(&state.create_failures) {
                return Err(BrokerError::new("broker contract unavailable"));
            }
            Ok(FakeBroker { state })
        }
    }
}

pub struct FakeBroker {
    state: Arc<FakeState>,
}

impl std::fmt::Debug for FakeBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeBroker").finish_non_exhaustive()
    }
}

impl Broker for FakeBroker {
    fn list_services(
        &self,
    ) -> impl Future<Output = Result<Vec<ServiceDescriptor>, BrokerError>> + Send {
        async move {
            self.state.calls.list_services.fetch_add(1, Ordering::SeqCst);
            if FakeState::take_failure(&self.state.list_failures) {
                return Err(BrokerError::new("rpc timeout"));
            }
            Ok(self.state.services.lock().unwrap().clone())
        }
    }

    fn acknowledge_provider_signer(
        &self,
        provider: Address,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send {
        async move {
            self.state.calls.acknowledge.fetch_add(1, Ordering::SeqCst);
            self.state.acknowledged.lock().unwrap().insert(provider);
            Ok(())
        }
    }

    fn get_service_metadata(
        &self,
        provider: Address,
    ) -> impl Future<Output = Result<ServiceMetadata, BrokerError>> + Send {
        async move {
            self.state.calls.metadata.fetch_add(1, Ordering::SeqCst);
            self.state
                .metadata
                .lock()
                .unwrap()
                .get(&provider)
                .cloned()
                .ok_or_else(|| BrokerError::new(format!("unknown provider {provider:#x}")))
        }
    }

    fn get_request_headers(
        &self,
        provider: Address,
        content: &str,
    ) -> impl Future<Output = Result<HashMap<String, String>, BrokerError>> + Send {
        let content = content.to_string();
        async move {
            self.state.calls.headers.fetch_add(1, Ordering::SeqCst);
            let headers = HashMap::from([
                ("X-Provider".to_string(), format!("{provider:#x}")),
                ("X-Request-Signature".to_string(), format!("sig-{}", content.len())),
            ]);
            *self.state.last_header_content.lock().unwrap() = Some(content);
            Ok(headers)
        }
    }

    fn get_ledger(&self) -> impl Future<Output = Result<LedgerSnapshot, BrokerError>> + Send {
        async move { Ok(*self.state.ledger.lock().unwrap()) }
    }

    fn deposit_fund(&self, amount: U256) -> impl Future<Output = Result<(), BrokerError>> + Send {
        async move {
            self.state.calls.deposits.fetch_add(1, Ordering::SeqCst);
            if self.state.deposit_fails.load(Ordering::SeqCst) {
                return Err(BrokerError::new("deposit transaction reverted"));
            }
            let mut ledger = self.state.ledger.lock().unwrap();
            ledger.total_balance += amount;
            Ok(())
        }
    }

    fn refund(&self, amount: U256) -> impl Future<Output = Result<(), BrokerError>> + Send {
        async move {
            self.state.calls.refunds.fetch_add(1, Ordering::SeqCst);
            let mut ledger = self.state.ledger.lock().unwrap();
            if amount > ledger.available() {
                return Err(BrokerError::new("Insufficient balance for refund"));
            }
            ledger.total_balance -= amount;
            Ok(())
        }
    }
}

pub fn test_config(private_key: &str) -> ComputeConfig {
    let mut config = ComputeConfig::new(private_key, TEST_RPC);
    config.retry_delay = Duration::from_millis(1);
    config.timeout = Duration::from_secs(5);
    config
}

pub fn client(factory: FakeFactory) -> ComputeClient<FakeFactory> {
    ComputeClient::new(factory).with_activation_store(Arc::new(ActivationStore::in_memory()))
}

pub fn service(byte: u8, model: &str) -> ServiceDescriptor {
    ServiceDescriptor {
        provider: Address::repeat_byte(byte),
        service_type: "chatbot".to_string(),
        url: format!("https://provider-{byte}.invalid"),
        model: model.to_string(),
        input_price: U256::from(1_000_000u64),
        output_price: U256::from(2_000_000u64),
        updated_at: 1_700_000_000,
        verifiability: "TeeML".to_string(),
    }
}

pub fn metadata(endpoint: &str, model: &str) -> ServiceMetadata {
    ServiceMetadata {
        endpoint: endpoint.to_string(),
        model: model.to_string(),
    }
}

pub fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 5, "completion_tokens": 37, "total_tokens": 42}
    })
}
