use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;

use crate::error::{BrokerError, ComputeError};

/// Signing identity bound to one RPC endpoint.
///
/// Building a wallet performs no I/O; the HTTP transport connects lazily on
/// the first call.
#[derive(Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
    provider: DynProvider,
    rpc_url: String,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.signer.address())
            .field("rpc_url", &self.rpc_url)
            .finish_non_exhaustive()
    }
}

impl Wallet {
    pub fn connect(private_key: &str, rpc_url: &str) -> Result<Self, ComputeError> {
        let signer = parse_signer(private_key)?;
        let url = parse_rpc_url(rpc_url)?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer.clone()))
            .connect_http(url)
            .erased();

        Ok(Self {
            signer,
            provider,
            rpc_url: rpc_url.to_string(),
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// Signing provider for broker SDKs that submit transactions themselves.
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

/// Parse a hex private key. The key itself never appears in the error.
pub fn parse_signer(private_key: &str) -> Result<PrivateKeySigner, ComputeError> {
    private_key
        .trim()
        .parse::<PrivateKeySigner>()
        .map_err(|_| ComputeError::Configuration("invalid private key".to_string()))
}

fn parse_rpc_url(rpc_url: &str) -> Result<Url, ComputeError> {
    rpc_url
        .parse::<Url>()
        .map_err(|e| ComputeError::Configuration(format!("invalid RPC URL {rpc_url}: {e}")))
}

/// Reachability check against an RPC endpoint. Returns the chain id.
pub async fn probe_rpc(rpc_url: &str) -> Result<u64, BrokerError> {
    let url = rpc_url
        .parse::<Url>()
        .map_err(|e| BrokerError::new(format!("invalid RPC URL {rpc_url}: {e}")))?;
    let provider = ProviderBuilder::new().connect_http(url);
    provider
        .get_chain_id()
        .await
        .map_err(|e| BrokerError::new(format!("eth_chainId failed: {e}")))
}
