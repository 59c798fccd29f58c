//! The per-call chat pipeline.
//!
//! Steps run strictly in order: validate, connect, discover, acknowledge,
//! fetch metadata, fetch request headers, POST with a deadline, check the
//! status, extract content.

use std::time::{Duration, Instant};

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use infer_broker::{
    with_retry, Broker, BrokerFactory, ComputeError, RetryPolicy, ServiceDescriptor,
    DEEPSEEK_MODEL, LLAMA_MODEL,
};
use serde::Serialize;

use crate::client::ComputeClient;
use crate::completion::{CompletionRequest, CompletionResponse, ContentPolicy, WireMessage};
use crate::deadline::Deadline;
use crate::selector::{self, ProviderSelection};

/// Per-call overrides. Unset fields fall back to the connection config.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Model name fragment used to pick a provider.
    pub model: Option<String>,
    /// Explicit provider; wins over `model`.
    pub provider: Option<Address>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<Duration>,
    /// Total attempts for the retryable steps of this call.
    pub max_retries: Option<u32>,
}

impl ChatOptions {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Address) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    fn validate(&self) -> Result<(), ComputeError> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ComputeError::Validation(format!(
                    "temperature must be between 0 and 2, got {t}"
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(ComputeError::Validation(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ComputeError::Validation(
                "timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Detailed result of a chat call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub provider: String,
    pub request_id: String,
    pub completed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// How a call picks its provider and treats contentless responses.
enum Route<'a> {
    /// Caller-driven selection; missing content is an error.
    Generic,
    /// Substring search by model name; contentless responses degrade softly.
    Model(&'a str),
}

impl<F: BrokerFactory> ComputeClient<F> {
    /// Send one user message and return the reply text.
    pub async fn chat(&self, message: &str, options: ChatOptions) -> Result<String, ComputeError> {
        self.run_chat(message, &options, Route::Generic)
            .await
            .map(|r| r.content)
    }

    /// Like [`chat`](Self::chat), with model, provider, timing and usage details.
    pub async fn chat_detailed(
        &self,
        message: &str,
        options: ChatOptions,
    ) -> Result<ChatResponse, ComputeError> {
        self.run_chat(message, &options, Route::Generic).await
    }

    /// Chat with the first provider whose model name contains `model`.
    ///
    /// A well-formed response without text yields a tool-call description,
    /// the reasoning text, or a fixed apology instead of an error.
    pub async fn chat_with_model(
        &self,
        model: &str,
        message: &str,
        options: ChatOptions,
    ) -> Result<String, ComputeError> {
        self.chat_with_model_detailed(model, message, options)
            .await
            .map(|r| r.content)
    }

    pub async fn chat_with_model_detailed(
        &self,
        model: &str,
        message: &str,
        options: ChatOptions,
    ) -> Result<ChatResponse, ComputeError> {
        if model.trim().is_empty() {
            return Err(ComputeError::Validation("model must not be empty".to_string()));
        }
        self.run_chat(message, &options, Route::Model(model)).await
    }

    pub async fn use_deepseek(
        &self,
        message: &str,
        options: ChatOptions,
    ) -> Result<String, ComputeError> {
        self.chat_with_model(DEEPSEEK_MODEL, message, options).await
    }

    pub async fn use_llama(&self, message: &str, options: ChatOptions) -> Result<String, ComputeError> {
        self.chat_with_model(LLAMA_MODEL, message, options).await
    }

    /// Services currently offered on the network. Never empty on success.
    pub async fn list_services(&self) -> Result<Vec<ServiceDescriptor>, ComputeError> {
        let connection = self.connection()?;
        let policy = connection.config().retry_policy();
        let broker = connection.acquire_broker().await?;
        selector::list_providers(broker.as_ref(), &policy).await
    }

    /// Address of the first provider serving a model whose name contains `model`.
    pub async fn find_provider_for_model(&self, model: &str) -> Result<Address, ComputeError> {
        let connection = self.connection()?;
        let policy = connection.config().retry_policy();
        let broker = connection.acquire_broker().await?;
        let services = selector::list_providers(broker.as_ref(), &policy).await?;
        selector::find_provider_for_model(broker.as_ref(), &services, model, &policy).await
    }

    async fn run_chat(
        &self,
        message: &str,
        options: &ChatOptions,
        route: Route<'_>,
    ) -> Result<ChatResponse, ComputeError> {
        let started = Instant::now();

        // 1. Validate input before anything touches the network.
        if message.trim().is_empty() {
            return Err(ComputeError::Validation("message must not be empty".to_string()));
        }
        options.validate()?;

        // 2. Connection, lazily created from the environment if needed.
        let connection = self.connection()?;
        let config = connection.config();
        let message_chars = message.chars().count();
        if message_chars > config.max_message_chars {
            return Err(ComputeError::Validation(format!(
                "message is {message_chars} characters, limit is {}",
                config.max_message_chars
            )));
        }

        // 3. Per-call option > connection config (whose defaults are 30s / 3).
        let timeout = options.timeout.unwrap_or(config.timeout);
        let policy = RetryPolicy::from_retries(options.max_retries.unwrap_or(config.max_retries))
            .with_initial_delay(config.retry_delay);

        let broker = connection.acquire_broker().await?;
        let broker = broker.as_ref();

        // 4. Discovery and selection.
        let services = selector::list_providers(broker, &policy).await?;
        let (provider, content_policy) = match route {
            Route::Generic => {
                let selection = match (&options.provider, &options.model) {
                    (Some(address), _) => ProviderSelection::Address(*address),
                    (None, Some(model)) => ProviderSelection::Model(model.clone()),
                    (None, None) => ProviderSelection::Default,
                };
                (
                    selector::select_provider(&services, &selection)?,
                    ContentPolicy::Strict,
                )
            }
            Route::Model(model) => {
                let provider = match options.provider {
                    Some(address) => address,
                    None => {
                        selector::find_provider_for_model(broker, &services, model, &policy)
                            .await?
                    }
                };
                (provider, ContentPolicy::Lenient)
            }
        };
        drop(services);

        // 5. The network serves only providers this identity has acknowledged.
        with_retry(&policy, "acknowledgeProviderSigner", || {
            broker.acknowledge_provider_signer(provider)
        })
        .await
        .map_err(|e| ComputeError::broker("acknowledgeProviderSigner", e))?;

        // 6. Endpoint and canonical model name.
        let metadata = with_retry(&policy, "getServiceMetadata", || {
            broker.get_service_metadata(provider)
        })
        .await
        .map_err(|e| ComputeError::broker("getServiceMetadata", e))?;

        // 7. Single-use headers, bound to this exact message.
        let headers = with_retry(&policy, "getRequestHeaders", || {
            broker.get_request_headers(provider, message)
        })
        .await
        .map_err(|e| ComputeError::broker("getRequestHeaders", e))?;

        // 8. The HTTP call itself, under a hard deadline.
        let url = completions_url(&metadata.endpoint)?;
        let body = CompletionRequest {
            messages: vec![WireMessage {
                role: "user",
                content: message,
            }],
            model: &metadata.model,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let mut request = self.http.post(url).json(&body);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        tracing::debug!(
            provider = %provider,
            model = %metadata.model,
            timeout_ms = timeout.as_millis() as u64,
            "sending chat completion request"
        );

        let deadline = Deadline::arm(timeout);
        let sent = deadline
            .run(async {
                let response = request.send().await?;
                let status = response.status();
                let text = response.text().await?;
                Ok::<_, reqwest::Error>((status, text))
            })
            .await;
        drop(deadline);

        let (status, text) = match sent {
            Err(elapsed) => {
                tracing::warn!(provider = %provider, timeout_ms = elapsed.0.as_millis() as u64, "chat request timed out");
                return Err(ComputeError::timeout(elapsed.0.as_millis() as u64));
            }
            Ok(Err(e)) if e.is_timeout() => {
                return Err(ComputeError::timeout(timeout.as_millis() as u64));
            }
            Ok(Err(e)) => {
                return Err(ComputeError::network(format!("chat request failed: {e}")));
            }
            Ok(Ok(sent)) => sent,
        };

        // 9. Payment rejections are a funding problem, not a transport one.
        if status.as_u16() == 402 || status.as_u16() == 403 {
            return Err(ComputeError::InsufficientFunds(format!(
                "provider {provider:#x} rejected the request with HTTP {}: {}",
                status.as_u16(),
                text.chars().take(200).collect::<String>()
            )));
        }
        if !status.is_success() {
            return Err(ComputeError::http_status(status.as_u16(), &text));
        }

        // 10. Parse and extract.
        let parsed: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| ComputeError::network(format!("invalid response body: {e}")))?;
        let content = parsed.extract_content(content_policy)?;

        // 11. Record and return.
        let request_id = uuid::Uuid::new_v4().to_string();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            request_id = %request_id,
            provider = %provider,
            model = %metadata.model,
            elapsed_ms,
            total_tokens = ?parsed.total_tokens(),
            "chat completed"
        );

        Ok(ChatResponse {
            content,
            model: metadata.model,
            provider: format!("{provider:#x}"),
            request_id,
            completed_at: Utc::now(),
            total_tokens: parsed.total_tokens(),
        })
    }
}

fn completions_url(endpoint: &str) -> Result<url::Url, ComputeError> {
    let raw = format!("{}/chat/completions", endpoint.trim_end_matches('/'));
    url::Url::parse(&raw)
        .map_err(|e| ComputeError::network(format!("invalid service endpoint {endpoint}: {e}")))
}
