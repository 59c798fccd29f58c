//! Conversion between raw ledger integers and decimal display amounts.

use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::U256;

use crate::constants::LEDGER_DECIMALS;
use crate::error::ComputeError;

/// Convert a raw ledger amount into display units (e.g. `10^18` -> `1.0`).
pub fn to_display(raw: U256) -> Result<f64, ComputeError> {
    let formatted = format_units(raw, LEDGER_DECIMALS)
        .map_err(|e| ComputeError::network(format!("failed to format balance: {e}")))?;
    formatted
        .parse::<f64>()
        .map_err(|e| ComputeError::network(format!("failed to parse balance {formatted}: {e}")))
}

/// Convert a caller-supplied display amount into raw ledger units.
///
/// Rejects non-finite and non-positive amounts, and amounts that round to zero.
pub fn from_display(amount: f64) -> Result<U256, ComputeError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ComputeError::Validation(format!(
            "amount must be a positive number, got {amount}"
        )));
    }
    let raw = parse_units(&amount.to_string(), LEDGER_DECIMALS)
        .map_err(|e| ComputeError::Validation(format!("invalid amount {amount}: {e}")))?
        .get_absolute();
    if raw.is_zero() {
        return Err(ComputeError::Validation(format!(
            "amount {amount} is below the smallest ledger unit"
        )));
    }
    Ok(raw)
}
