use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// One inference offering as advertised by the network.
///
/// Fetched fresh on every discovery pass; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub provider: Address,
    pub service_type: String,
    /// Endpoint URL as declared on-chain. Callers should prefer the URL from
    /// [`ServiceMetadata`], which the provider keeps current.
    pub url: String,
    pub model: String,
    pub input_price: U256,
    pub output_price: U256,
    /// Unix seconds.
    pub updated_at: u64,
    pub verifiability: String,
}

/// Endpoint and canonical model name for a provider, as served by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    pub endpoint: String,
    pub model: String,
}

/// Raw ledger figures in the token's smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub total_balance: U256,
    pub locked: U256,
}

impl LedgerSnapshot {
    /// Balance not reserved for in-flight provider settlements.
    pub fn available(&self) -> U256 {
        self.total_balance.saturating_sub(self.locked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_never_underflows() {
        let snapshot = LedgerSnapshot {
            total_balance: U256::from(5),
            locked: U256::from(7),
        };
        assert_eq!(snapshot.available(), U256::ZERO);

        let snapshot = LedgerSnapshot {
            total_balance: U256::from(10),
            locked: U256::from(3),
        };
        assert_eq!(snapshot.available(), U256::from(7));
    }

    #[test]
    fn test_descriptor_wire_format_is_camel_case() {
        let descriptor = ServiceDescriptor {
            provider: Address::ZERO,
            service_type: "chatbot".to_string(),
            url: "https://provider.example".to_string(),
            model: "llama-3.3-70b-instruct".to_string(),
            input_price: U256::from(1),
            output_price: U256::from(2),
            updated_at: 1_700_000_000,
            verifiability: "TeeML".to_string(),
        };
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["serviceType"], "chatbot");
        assert_eq!(json["updatedAt"], 1_700_000_000u64);
        assert!(json.get("service_type").is_none());
    }
}
