//! Provider discovery and selection.
//!
//! Whatever shape the network hands back, callers past this module only ever
//! see a [`ServiceDescriptor`] and a provider [`Address`].

use alloy::primitives::Address;
use infer_broker::{with_retry, Broker, ComputeError, RetryPolicy, ServiceDescriptor};

/// How the orchestrator should pick a provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProviderSelection {
    /// First service in network order.
    #[default]
    Default,
    /// A specific provider address chosen by the caller.
    Address(Address),
    /// First service whose declared model contains this text (case-insensitive).
    Model(String),
}

/// Fetch the current service list. An empty list is an error: with no
/// providers there is nothing for the caller to do.
pub async fn list_providers<B: Broker>(
    broker: &B,
    policy: &RetryPolicy,
) -> Result<Vec<ServiceDescriptor>, ComputeError> {
    let services = with_retry(policy, "listServices", || broker.list_services())
        .await
        .map_err(|e| ComputeError::broker("listServices", e))?;

    if services.is_empty() {
        return Err(ComputeError::network("No services available"));
    }
    tracing::debug!(count = services.len(), "discovered services");
    Ok(services)
}

/// Resolve the provider address for one orchestration pass.
pub fn select_provider(
    services: &[ServiceDescriptor],
    selection: &ProviderSelection,
) -> Result<Address, ComputeError> {
    match selection {
        // Explicit choices are honored even if the provider is missing from
        // this listing; the acknowledgment step will reject unknown providers.
        ProviderSelection::Address(address) => Ok(*address),
        ProviderSelection::Model(model) => services
            .iter()
            .find(|s| model_matches(&s.model, model))
            .map(|s| s.provider)
            .ok_or_else(|| no_provider_for(model)),
        ProviderSelection::Default => services
            .first()
            .map(|s| s.provider)
            .ok_or_else(|| ComputeError::network("No services available")),
    }
}

/// Scan `services` in order for the first provider serving a model whose
/// name contains `model` (case-insensitive).
///
/// The metadata model name is checked first, then the declared one. A
/// candidate whose metadata cannot be fetched is skipped, not fatal.
pub async fn find_provider_for_model<B: Broker>(
    broker: &B,
    services: &[ServiceDescriptor],
    model: &str,
    policy: &RetryPolicy,
) -> Result<Address, ComputeError> {
    for service in services {
        let metadata = with_retry(policy, "getServiceMetadata", || {
            broker.get_service_metadata(service.provider)
        })
        .await;

        match metadata {
            Ok(metadata) => {
                if model_matches(&metadata.model, model) || model_matches(&service.model, model) {
                    tracing::debug!(
                        provider = %service.provider,
                        model = %metadata.model,
                        "found provider for model"
                    );
                    return Ok(service.provider);
                }
            }
            Err(e) => {
                tracing::warn!(
                    provider = %service.provider,
                    error = %e,
                    "skipping provider, metadata unavailable"
                );
            }
        }
    }
    Err(no_provider_for(model))
}

fn model_matches(candidate: &str, wanted: &str) -> bool {
    candidate.to_lowercase().contains(&wanted.to_lowercase())
}

fn no_provider_for(model: &str) -> ComputeError {
    ComputeError::network(format!("No provider found for model {model}"))
}
