//! Core building blocks for a decentralized inference network client.
//!
//! # Pieces
//!
//! - [`Broker`] / [`BrokerFactory`]: the capability surface of the network SDK
//! - [`with_retry`]: bounded exponential-backoff retry, shared by every caller
//! - [`ComputeError`]: the four failure kinds that reach callers
//! - [`Wallet`]: signing identity bound to an RPC endpoint
//! - [`units`]: raw ledger integers to display amounts and back
//!
//! The orchestration (connection memoization, provider selection, the chat
//! pipeline) lives in the `infer-broker-client` crate.

pub mod broker;
pub mod constants;
pub mod error;
pub mod retry;
pub mod service;
pub mod units;
pub mod wallet;

pub use broker::{Broker, BrokerFactory};
pub use constants::*;
pub use error::{BrokerError, ComputeError, ErrorKind};
pub use retry::{with_retry, RetryPolicy};
pub use service::{LedgerSnapshot, ServiceDescriptor, ServiceMetadata};
pub use wallet::Wallet;
