//! error types for transfer-ledger

use alloy_primitives::B256;
use thiserror::Error;

use crate::provider::ProviderError;
use crate::units::AmountError;

#[derive(Error, Debug)]
pub enum DappError {
    #[error("no wallet extension detected, install one to continue")]
    ExtensionMissing,

    #[error("wallet not connected")]
    NotConnected,

    #[error("connection failed: {0}")]
    ConnectionFailed(ProviderError),

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(ProviderError),

    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("transfer failed: {0}")]
    TransferFailed(ProviderError),

    #[error("ledger write rejected: {0}")]
    LedgerRejected(ProviderError),

    #[error("ledger write {0} reverted")]
    Reverted(B256),

    #[error("transaction failed: {0}")]
    TransactionFailed(Box<DappError>),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, DappError>;

impl DappError {
    /// wrap a mid-submission failure, keeping the underlying cause
    pub fn transaction(cause: DappError) -> Self {
        DappError::TransactionFailed(Box::new(cause))
    }

    /// the innermost cause, unwrapping `TransactionFailed`
    pub fn root_cause(&self) -> &DappError {
        match self {
            DappError::TransactionFailed(inner) => inner.root_cause(),
            other => other,
        }
    }
}

impl From<sled::Error> for DappError {
    fn from(e: sled::Error) -> Self {
        DappError::Storage(e.to_string())
    }
}
