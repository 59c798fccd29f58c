use std::path::PathBuf;
use std::time::Duration;

use infer_broker::{
    ComputeError, RetryPolicy, DEFAULT_ACTIVATION_DEPOSIT, DEFAULT_MAX_MESSAGE_CHARS,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_RPC_URL, DEFAULT_TIMEOUT,
};
use url::Url;

/// Connection-level settings for one signing identity.
#[derive(Clone, PartialEq)]
pub struct ComputeConfig {
    /// Hex private key of the signing identity. Never logged.
    pub private_key: String,
    /// EVM RPC endpoint the wallet and broker talk to.
    pub rpc_url: String,
    /// Default wall-clock budget for an inference call.
    pub timeout: Duration,
    /// Default total attempts for retryable network operations.
    pub max_retries: u32,
    /// First backoff delay of the retry executor.
    pub retry_delay: Duration,
    /// Make a one-time activation deposit on first use of an identity.
    pub auto_deposit: bool,
    /// Activation deposit in display units.
    pub activation_deposit: f64,
    /// Override for the persisted activation state file.
    pub state_path: Option<PathBuf>,
    /// Upper bound on a chat message, in characters.
    pub max_message_chars: usize,
}

impl std::fmt::Debug for ComputeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeConfig")
            .field("private_key", &"[REDACTED]")
            .field("rpc_url", &self.rpc_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("auto_deposit", &self.auto_deposit)
            .field("activation_deposit", &self.activation_deposit)
            .field("state_path", &self.state_path)
            .field("max_message_chars", &self.max_message_chars)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

impl From<ConfigError> for ComputeError {
    fn from(e: ConfigError) -> Self {
        ComputeError::Configuration(e.to_string())
    }
}

impl ComputeConfig {
    /// Config with defaults for everything but the identity.
    pub fn new(private_key: impl Into<String>, rpc_url: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
            rpc_url: rpc_url.into(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            auto_deposit: false,
            activation_deposit: DEFAULT_ACTIVATION_DEPOSIT,
            state_path: None,
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
        }
    }

    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|s| !s.trim().is_empty());

        // Required: signing key
        let private_key =
            var("INFER_PRIVATE_KEY").ok_or(ConfigError::MissingRequired("INFER_PRIVATE_KEY"))?;

        let rpc_url = var("INFER_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        Url::parse(&rpc_url).map_err(|_| ConfigError::InvalidUrl(rpc_url.clone()))?;

        let mut config = Self::new(private_key, rpc_url);

        if let Some(ms) = var("INFER_TIMEOUT_MS") {
            let ms: u64 = parse_value("INFER_TIMEOUT_MS", &ms)?;
            if ms == 0 {
                return Err(ConfigError::InvalidValue {
                    name: "INFER_TIMEOUT_MS",
                    value: "0".to_string(),
                });
            }
            config.timeout = Duration::from_millis(ms);
        }

        if let Some(n) = var("INFER_MAX_RETRIES") {
            config.max_retries = parse_value("INFER_MAX_RETRIES", &n)?;
        }

        if let Some(ms) = var("INFER_RETRY_DELAY_MS") {
            config.retry_delay = Duration::from_millis(parse_value("INFER_RETRY_DELAY_MS", &ms)?);
        }

        config.auto_deposit = var("INFER_AUTO_DEPOSIT")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        if let Some(amount) = var("INFER_ACTIVATION_DEPOSIT") {
            let amount: f64 = parse_value("INFER_ACTIVATION_DEPOSIT", &amount)?;
            if !amount.is_finite() || amount <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    name: "INFER_ACTIVATION_DEPOSIT",
                    value: amount.to_string(),
                });
            }
            config.activation_deposit = amount;
        }

        config.state_path = var("INFER_STATE_PATH").map(PathBuf::from);

        if let Some(n) = var("INFER_MAX_MESSAGE_CHARS") {
            config.max_message_chars = parse_value("INFER_MAX_MESSAGE_CHARS", &n)?;
        }

        Ok(config)
    }

    /// Retry policy for network operations made on behalf of this identity.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_retries(self.max_retries).with_initial_delay(self.retry_delay)
    }
}

fn parse_value<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ComputeConfig::from_lookup(lookup(&[("INFER_PRIVATE_KEY", "0xabc")])).unwrap();
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert!(!config.auto_deposit);
        assert!(config.state_path.is_none());
    }

    #[test]
    fn test_missing_key() {
        let err = ComputeConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired("INFER_PRIVATE_KEY")));

        let err = ComputeConfig::from_lookup(lookup(&[("INFER_PRIVATE_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(_)));
    }

    #[test]
    fn test_overrides() {
        let config = ComputeConfig::from_lookup(lookup(&[
            ("INFER_PRIVATE_KEY", "0xabc"),
            ("INFER_RPC_URL", "http://localhost:8545"),
            ("INFER_TIMEOUT_MS", "1500"),
            ("INFER_MAX_RETRIES", "5"),
            ("INFER_AUTO_DEPOSIT", "true"),
            ("INFER_ACTIVATION_DEPOSIT", "0.5"),
            ("INFER_STATE_PATH", "/tmp/state.json"),
        ]))
        .unwrap();
        assert_eq!(config.rpc_url, "http://localhost:8545");
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_retries, 5);
        assert!(config.auto_deposit);
        assert_eq!(config.activation_deposit, 0.5);
        assert_eq!(config.state_path, Some(PathBuf::from("/tmp/state.json")));
        assert_eq!(config.retry_policy().max_attempts, 5);
    }

    #[test]
    fn test_invalid_values() {
        let err = ComputeConfig::from_lookup(lookup(&[
            ("INFER_PRIVATE_KEY", "0xabc"),
            ("INFER_RPC_URL", "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));

        let err = ComputeConfig::from_lookup(lookup(&[
            ("INFER_PRIVATE_KEY", "0xabc"),
            ("INFER_MAX_RETRIES", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "INFER_MAX_RETRIES",
                ..
            }
        ));

        let err = ComputeConfig::from_lookup(lookup(&[
            ("INFER_PRIVATE_KEY", "0xabc"),
            ("INFER_TIMEOUT_MS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ComputeConfig::new("0xsecretkey", DEFAULT_RPC_URL);
        let debug = format!("{config:?}");
        assert!(!debug.contains("secretkey"));
        assert!(debug.contains("[REDACTED]"));
    }
}
