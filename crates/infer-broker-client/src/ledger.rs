//! Prepaid ledger operations.
//!
//! Balances are returned in display units (the 18-decimal native token as an
//! `f64`). Deposits and withdrawals take display units and are validated
//! before any network call.

use std::sync::Arc;

use infer_broker::{units, with_retry, Broker, BrokerFactory, ComputeError, LedgerSnapshot};

use crate::client::ComputeClient;
use crate::connection::Connection;

impl<F: BrokerFactory> Connection<F> {
    /// Raw ledger figures for this identity.
    pub async fn ledger(self: &Arc<Self>) -> Result<LedgerSnapshot, ComputeError> {
        let broker = self.acquire_broker().await?;
        let policy = self.config().retry_policy();
        with_retry(&policy, "getLedger", || broker.get_ledger())
            .await
            .map_err(|e| ComputeError::broker("getLedger", e))
    }

    /// Total ledger balance.
    pub async fn get_balance(self: &Arc<Self>) -> Result<f64, ComputeError> {
        units::to_display(self.ledger().await?.total_balance)
    }

    /// Portion of the balance reserved for provider settlement.
    pub async fn get_locked_balance(self: &Arc<Self>) -> Result<f64, ComputeError> {
        units::to_display(self.ledger().await?.locked)
    }

    /// Balance minus the locked portion.
    pub async fn get_available_balance(self: &Arc<Self>) -> Result<f64, ComputeError> {
        units::to_display(self.ledger().await?.available())
    }

    pub async fn deposit(self: &Arc<Self>, amount: f64) -> Result<(), ComputeError> {
        let raw = units::from_display(amount)?;
        let broker = self.acquire_broker().await?;
        let policy = self.config().retry_policy();

        with_retry(&policy, "depositFund", || broker.deposit_fund(raw))
            .await
            .map_err(|e| ComputeError::broker("depositFund", e))?;

        tracing::info!(address = %self.address(), amount, "deposited to ledger");
        Ok(())
    }

    pub async fn withdraw(self: &Arc<Self>, amount: f64) -> Result<(), ComputeError> {
        let raw = units::from_display(amount)?;
        let broker = self.acquire_broker().await?;
        let policy = self.config().retry_policy();

        with_retry(&policy, "refund", || broker.refund(raw))
            .await
            .map_err(|e| {
                if e.is_insufficient_funds() {
                    ComputeError::InsufficientFunds(format!(
                        "cannot withdraw {amount}: {}",
                        e.message
                    ))
                } else {
                    ComputeError::broker("refund", e)
                }
            })?;

        tracing::info!(address = %self.address(), amount, "withdrew from ledger");
        Ok(())
    }
}

impl<F: BrokerFactory> ComputeClient<F> {
    pub async fn get_balance(&self) -> Result<f64, ComputeError> {
        self.connection()?.get_balance().await
    }

    pub async fn get_locked_balance(&self) -> Result<f64, ComputeError> {
        self.connection()?.get_locked_balance().await
    }

    pub async fn get_available_balance(&self) -> Result<f64, ComputeError> {
        self.connection()?.get_available_balance().await
    }

    pub async fn deposit(&self, amount: f64) -> Result<(), ComputeError> {
        self.connection()?.deposit(amount).await
    }

    pub async fn withdraw(&self, amount: f64) -> Result<(), ComputeError> {
        self.connection()?.withdraw(amount).await
    }
}
