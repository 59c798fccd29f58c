use std::time::Duration;

/// Default EVM RPC endpoint for the compute network testnet.
pub const DEFAULT_RPC_URL: &str = "https://evmrpc-testnet.0g.ai";

/// The ledger's native token has 18 decimal places.
pub const LEDGER_DECIMALS: u8 = 18;

/// Wall-clock budget for a single inference HTTP call when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Total attempts for retryable network operations when nothing else is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// First backoff delay of the retry executor.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Growth factor between consecutive backoff delays.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// One-time activation deposit, in display units.
pub const DEFAULT_ACTIVATION_DEPOSIT: f64 = 0.1;

/// Upper bound on a single chat message, in characters.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 32_000;

/// Returned by the model-specific helpers when a response carries no usable text.
pub const FALLBACK_RESPONSE: &str =
    "I apologize, but I couldn't generate a response. Please try again.";

/// Model-name fragments used by the convenience helpers.
pub const DEEPSEEK_MODEL: &str = "deepseek";
pub const LLAMA_MODEL: &str = "llama";
