//! Client for paid inference on a decentralized compute network.
//!
//! Handles the full request flow: discover a provider, acknowledge it,
//! fetch its metadata and single-use auth headers, then call its
//! OpenAI-compatible endpoint under a deadline. Also manages the prepaid
//! ledger backing the signing identity.
//!
//! # Quick Example
//!
//! ```no_run
//! use infer_client::{ChatOptions, ComputeClient, ComputeConfig};
//! # use infer_broker::BrokerFactory;
//!
//! # async fn run<F: BrokerFactory>(factory: F) -> Result<(), infer_broker::ComputeError> {
//! let client = ComputeClient::new(factory);
//! client
//!     .initialize(&ComputeConfig::new("0xYOUR_KEY", infer_broker::DEFAULT_RPC_URL))
//!     .await?;
//!
//! let reply = client.chat("Hello", ChatOptions::default()).await?;
//! println!("{reply}");
//!
//! println!("balance: {}", client.get_balance().await?);
//! # Ok(())
//! # }
//! ```
//!
//! The broker SDK is plugged in through [`infer_broker::BrokerFactory`].

pub mod activation;
mod client;
pub mod completion;
pub mod config;
pub mod connection;
pub mod deadline;
mod ledger;
pub mod orchestrator;
pub mod selector;

pub use activation::{ActivationRecord, ActivationStore};
pub use client::ComputeClient;
pub use config::{ComputeConfig, ConfigError};
pub use connection::{Connection, ConnectionRegistry, ConnectionState, IdentityKey};
pub use orchestrator::{ChatOptions, ChatResponse};
pub use selector::ProviderSelection;

// Re-export commonly needed types from core
pub use infer_broker::{
    Broker, BrokerError, BrokerFactory, ComputeError, ErrorKind, LedgerSnapshot, RetryPolicy,
    ServiceDescriptor, ServiceMetadata, Wallet,
};
