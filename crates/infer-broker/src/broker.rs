//! Capability traits for the external broker SDK.
//!
//! - [`Broker`]: ledger and inference-provider operations for one identity
//! - [`BrokerFactory`]: connectivity check and broker construction
//!
//! The wire protocol and the request-signing scheme live behind these traits;
//! this workspace only orchestrates calls to them.

use std::collections::HashMap;
use std::future::Future;

use alloy::primitives::{Address, U256};

use crate::error::BrokerError;
use crate::service::{LedgerSnapshot, ServiceDescriptor, ServiceMetadata};
use crate::wallet::{probe_rpc, Wallet};

/// Handle to the broker network for one signing identity.
///
/// None of these operations are assumed idempotent; callers decide what to
/// retry.
pub trait Broker: Send + Sync + 'static {
    /// All inference services currently registered, in network order.
    fn list_services(
        &self,
    ) -> impl Future<Output = Result<Vec<ServiceDescriptor>, BrokerError>> + Send;

    /// Acknowledge a provider's signer on-chain. Required before the provider
    /// will serve requests from this identity.
    fn acknowledge_provider_signer(
        &self,
        provider: Address,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Current endpoint and canonical model name for a provider.
    fn get_service_metadata(
        &self,
        provider: Address,
    ) -> impl Future<Output = Result<ServiceMetadata, BrokerError>> + Send;

    /// Single-use authentication headers bound to `content`.
    fn get_request_headers(
        &self,
        provider: Address,
        content: &str,
    ) -> impl Future<Output = Result<HashMap<String, String>, BrokerError>> + Send;

    fn get_ledger(&self) -> impl Future<Output = Result<LedgerSnapshot, BrokerError>> + Send;

    /// Move `amount` raw units into the prepaid ledger.
    fn deposit_fund(&self, amount: U256) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Return `amount` raw units from the ledger to the wallet.
    fn refund(&self, amount: U256) -> impl Future<Output = Result<(), BrokerError>> + Send;
}

/// Builds [`Broker`] handles.
pub trait BrokerFactory: Send + Sync + 'static {
    type Broker: Broker;

    /// Verify the RPC endpoint is reachable. Defaults to an `eth_chainId` call.
    fn check_connectivity(
        &self,
        rpc_url: &str,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send {
        let rpc_url = rpc_url.to_string();
        async move {
            let chain_id = probe_rpc(&rpc_url).await?;
            tracing::debug!(rpc_url = %rpc_url, chain_id, "RPC reachable");
            Ok(())
        }
    }

    fn create_broker(
        &self,
        wallet: &Wallet,
    ) -> impl Future<Output = Result<Self::Broker, BrokerError>> + Send;
}
