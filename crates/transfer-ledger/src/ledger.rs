//! ledger contract binding
//!
//! reads go through `eth_call`, writes through `eth_sendTransaction`, both
//! via the injected wallet provider.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolCall};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DappError, Result};
use crate::provider::{ProviderError, TransactionReceipt, TransactionRequest, Wallet};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct TransferStruct {
        address sender;
        address receiver;
        uint256 amount;
        string message;
        uint256 timestamp;
        string keyword;
    }

    function addToBlockChain(
        address receiver,
        uint256 amount,
        string memory message,
        string memory keyword
    );
    function getAllTransactions() returns (TransferStruct[] memory);
    function getTransactionCount() returns (uint256);
}

/// a transfer record as the contract returns it
pub type RawTransferRecord = TransferStruct;

#[derive(Clone)]
pub struct LedgerClient {
    wallet: Wallet,
    contract: Address,
    poll_interval: Duration,
}

impl LedgerClient {
    pub fn new(wallet: Wallet, contract: Address, poll_interval: Duration) -> Self {
        Self {
            wallet,
            contract,
            poll_interval,
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub async fn all_transactions(
        &self,
    ) -> std::result::Result<Vec<RawTransferRecord>, ProviderError> {
        let data = getAllTransactionsCall {}.abi_encode();
        let output = self.wallet.call(self.contract, data).await?;
        let decoded = getAllTransactionsCall::abi_decode_returns(&output, true)
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        debug!("ledger returned {} records", decoded._0.len());
        Ok(decoded._0)
    }

    pub async fn transaction_count(&self) -> std::result::Result<u64, ProviderError> {
        let data = getTransactionCountCall {}.abi_encode();
        let output = self.wallet.call(self.contract, data).await?;
        let decoded = getTransactionCountCall::abi_decode_returns(&output, true)
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        u64::try_from(decoded._0)
            .map_err(|_| ProviderError::Decode(format!("count {} overflows u64", decoded._0)))
    }

    /// append a record; the contract stamps sender and timestamp itself
    pub async fn add_to_blockchain(
        &self,
        from: Address,
        receiver: Address,
        amount: U256,
        message: &str,
        keyword: &str,
    ) -> std::result::Result<PendingTransaction, ProviderError> {
        let call = addToBlockChainCall {
            receiver,
            amount,
            message: message.to_string(),
            keyword: keyword.to_string(),
        };
        let tx = TransactionRequest::call(from, self.contract, call.abi_encode());
        let hash = self.wallet.send_transaction(&tx).await?;
        info!("ledger write submitted: {}", hash);

        Ok(PendingTransaction {
            hash,
            wallet: self.wallet.clone(),
            poll_interval: self.poll_interval,
        })
    }
}

/// a submitted ledger write, awaitable until mined
pub struct PendingTransaction {
    hash: B256,
    wallet: Wallet,
    poll_interval: Duration,
}

impl PendingTransaction {
    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// poll for the receipt until mined; no timeout
    pub async fn wait(self) -> Result<TransactionReceipt> {
        loop {
            let receipt = self
                .wallet
                .transaction_receipt(self.hash)
                .await
                .map_err(DappError::LedgerUnavailable)?;

            match receipt {
                Some(r) if r.succeeded() => return Ok(r),
                Some(_) => return Err(DappError::Reverted(self.hash)),
                None => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }
}
