//! in-process devnet wallet
//!
//! answers the eip-1193 methods the dapp uses against a simulated chain
//! with the ledger contract deployed at a fixed address. ledger writes stay
//! pending for a configurable number of receipt polls before they are mined.

use alloy_primitives::{address, keccak256, Address, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::ledger::{
    addToBlockChainCall, getAllTransactionsCall, getTransactionCountCall, TransferStruct,
};
use crate::provider::{ProviderError, TransactionRequest, WalletProvider, USER_REJECTED_CODE};

/// where the devnet deploys the ledger contract
pub const DEVNET_CONTRACT: Address = address!("5fbdb2315678afecb367f032d93f642f64180aa3");

const GENESIS_TIMESTAMP: u64 = 1_700_000_000;
const BLOCK_TIME: u64 = 12;

struct PendingWrite {
    record: TransferStruct,
    polls_remaining: u32,
    revert: bool,
}

#[derive(Clone)]
struct MinedReceipt {
    block: u64,
    success: bool,
}

#[derive(Default)]
struct DevnetState {
    accounts: Vec<Address>,
    authorized: bool,
    deny_prompt: bool,
    reject_next_send: bool,
    revert_next_append: bool,
    fail_reads: bool,
    confirm_after: u32,
    block: u64,
    nonce: u64,
    records: Vec<TransferStruct>,
    pending: HashMap<B256, PendingWrite>,
    receipts: HashMap<B256, MinedReceipt>,
    value_transfers: Vec<(Address, Address, U256)>,
    requests: Vec<String>,
}

impl DevnetState {
    fn next_hash(&mut self) -> B256 {
        self.nonce += 1;
        keccak256(self.nonce.to_be_bytes())
    }

    fn mine(&mut self) -> u64 {
        self.block += 1;
        self.block
    }

    fn now(&self) -> u64 {
        GENESIS_TIMESTAMP + self.block * BLOCK_TIME
    }
}

pub struct DevnetWallet {
    state: Mutex<DevnetState>,
}

impl Default for DevnetWallet {
    fn default() -> Self {
        Self::new()
    }
}

impl DevnetWallet {
    /// empty devnet: no accounts, nothing authorized
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DevnetState {
                confirm_after: 1,
                ..Default::default()
            }),
        }
    }

    /// give the wallet `n` deterministic accounts
    pub fn with_accounts(self, n: u8) -> Self {
        {
            let mut state = self.lock();
            state.accounts = (1..=n).map(Address::repeat_byte).collect();
        }
        self
    }

    /// grant the dapp access up front, as if connected in an earlier visit
    pub fn authorized(self) -> Self {
        self.lock().authorized = true;
        self
    }

    /// receipt polls a ledger write stays pending before it is mined
    pub fn confirm_after(self, polls: u32) -> Self {
        self.lock().confirm_after = polls;
        self
    }

    pub fn deny_prompt(&self, deny: bool) {
        self.lock().deny_prompt = deny;
    }

    pub fn reject_next_send(&self) {
        self.lock().reject_next_send = true;
    }

    pub fn revert_next_append(&self) {
        self.lock().revert_next_append = true;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// append a record directly, as if written by another user
    pub fn seed_record(
        &self,
        sender: Address,
        receiver: Address,
        amount: U256,
        message: &str,
        keyword: &str,
    ) {
        let mut state = self.lock();
        state.mine();
        let timestamp = U256::from(state.now());
        state.records.push(TransferStruct {
            sender,
            receiver,
            amount,
            message: message.to_string(),
            timestamp,
            keyword: keyword.to_string(),
        });
    }

    pub fn accounts(&self) -> Vec<Address> {
        self.lock().accounts.clone()
    }

    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    pub fn value_transfers(&self) -> Vec<(Address, Address, U256)> {
        self.lock().value_transfers.clone()
    }

    /// methods requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DevnetState> {
        // a poisoned lock only means a test panicked mid-request
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn send_transaction(state: &mut DevnetState, params: &Value) -> Result<Value, ProviderError> {
        if std::mem::take(&mut state.reject_next_send) {
            return Err(ProviderError::UserRejected);
        }

        let tx: TransactionRequest = serde_json::from_value(params[0].clone())
            .map_err(|e| ProviderError::Rpc { code: -32602, message: e.to_string() })?;

        if !state.authorized || !state.accounts.contains(&tx.from) {
            return Err(ProviderError::Rpc {
                code: 4100,
                message: format!("account {} not authorized", tx.from),
            });
        }

        let hash = state.next_hash();

        match tx.data {
            Some(data) if tx.to == DEVNET_CONTRACT => {
                let call = addToBlockChainCall::abi_decode(&data, true).map_err(|e| {
                    ProviderError::Rpc {
                        code: -32000,
                        message: format!("execution reverted: {}", e),
                    }
                })?;
                let record = TransferStruct {
                    sender: tx.from,
                    receiver: call.receiver,
                    amount: call.amount,
                    message: call.message,
                    timestamp: U256::ZERO,
                    keyword: call.keyword,
                };
                let revert = std::mem::take(&mut state.revert_next_append);
                let polls_remaining = state.confirm_after;
                state.pending.insert(hash, PendingWrite { record, polls_remaining, revert });
            }
            _ => {
                let value = match tx.value.as_deref() {
                    Some(v) => U256::from_str_radix(v.trim_start_matches("0x"), 16)
                        .map_err(|e| ProviderError::Rpc { code: -32602, message: e.to_string() })?,
                    None => U256::ZERO,
                };
                state.value_transfers.push((tx.from, tx.to, value));
                let block = state.mine();
                state.receipts.insert(hash, MinedReceipt { block, success: true });
            }
        }

        Ok(json!(hash))
    }

    fn call(state: &DevnetState, params: &Value) -> Result<Value, ProviderError> {
        if state.fail_reads {
            return Err(ProviderError::Rpc {
                code: -32603,
                message: "header not found".into(),
            });
        }

        let to: Address = serde_json::from_value(params[0]["to"].clone())
            .map_err(|e| ProviderError::Rpc { code: -32602, message: e.to_string() })?;
        let data = params[0]["data"].as_str().unwrap_or("0x");
        let data = hex::decode(data.trim_start_matches("0x"))
            .map_err(|e| ProviderError::Rpc { code: -32602, message: e.to_string() })?;

        if to != DEVNET_CONTRACT || data.len() < 4 {
            return Ok(json!("0x"));
        }

        let output = match <[u8; 4]>::try_from(&data[..4]) {
            Ok(s) if s == getAllTransactionsCall::SELECTOR => {
                getAllTransactionsCall::abi_encode_returns(&(state.records.clone(),))
            }
            Ok(s) if s == getTransactionCountCall::SELECTOR => {
                getTransactionCountCall::abi_encode_returns(&(U256::from(state.records.len()),))
            }
            _ => {
                return Err(ProviderError::Rpc {
                    code: -32000,
                    message: "execution reverted".into(),
                })
            }
        };

        Ok(json!(format!("0x{}", hex::encode(output))))
    }

    fn receipt(state: &mut DevnetState, params: &Value) -> Result<Value, ProviderError> {
        let hash: B256 = serde_json::from_value(params[0].clone())
            .map_err(|e| ProviderError::Rpc { code: -32602, message: e.to_string() })?;

        if let Some(pending) = state.pending.get_mut(&hash) {
            pending.polls_remaining = pending.polls_remaining.saturating_sub(1);
            if pending.polls_remaining > 0 {
                return Ok(Value::Null);
            }
            if let Some(write) = state.pending.remove(&hash) {
                let block = state.mine();
                if !write.revert {
                    let mut record = write.record;
                    record.timestamp = U256::from(state.now());
                    state.records.push(record);
                }
                state.receipts.insert(hash, MinedReceipt { block, success: !write.revert });
            }
        }

        Ok(match state.receipts.get(&hash) {
            Some(r) => json!({
                "transactionHash": hash,
                "blockNumber": format!("0x{:x}", r.block),
                "status": if r.success { "0x1" } else { "0x0" },
            }),
            None => Value::Null,
        })
    }
}

#[async_trait]
impl WalletProvider for DevnetWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let mut state = self.lock();
        state.requests.push(method.to_string());
        debug!("devnet {}", method);

        match method {
            "eth_accounts" => {
                let accounts = if state.authorized { state.accounts.clone() } else { Vec::new() };
                Ok(json!(accounts))
            }
            "eth_requestAccounts" => {
                if state.deny_prompt {
                    return Err(ProviderError::from_rpc(
                        USER_REJECTED_CODE,
                        "user rejected the request".into(),
                    ));
                }
                state.authorized = true;
                Ok(json!(state.accounts.clone()))
            }
            "eth_sendTransaction" => Self::send_transaction(&mut state, &params),
            "eth_call" => Self::call(&state, &params),
            "eth_getTransactionReceipt" => Self::receipt(&mut state, &params),
            other => Err(ProviderError::Rpc {
                code: -32601,
                message: format!("method {} not supported", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_accounts_hidden_until_authorized() {
        let devnet = DevnetWallet::new().with_accounts(2);
        let accounts = devnet.request("eth_accounts", json!([])).await.unwrap();
        assert_eq!(accounts, json!([]));

        let granted = devnet.request("eth_requestAccounts", json!([])).await.unwrap();
        assert_eq!(granted.as_array().unwrap().len(), 2);

        let accounts = devnet.request("eth_accounts", json!([])).await.unwrap();
        assert_eq!(accounts.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_denied_prompt() {
        let devnet = DevnetWallet::new().with_accounts(1);
        devnet.deny_prompt(true);
        let err = devnet.request("eth_requestAccounts", json!([])).await.unwrap_err();
        assert_eq!(err, ProviderError::UserRejected);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let devnet = DevnetWallet::new();
        let err = devnet.request("eth_chainId", json!([])).await.unwrap_err();
        assert!(matches!(err, ProviderError::Rpc { code: -32601, .. }));
        assert_eq!(devnet.requests(), vec!["eth_chainId".to_string()]);
    }
}
