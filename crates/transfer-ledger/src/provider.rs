//! wallet provider interface
//!
//! eip-1193 shaped: a single `request(method, params)` entry point. the
//! provider is injected at construction; `None` means no wallet is present.

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::units::quantity;

/// eip-1193 "user rejected the request"
pub const USER_REJECTED_CODE: i64 = 4001;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("user rejected the request")]
    UserRejected,

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn from_rpc(code: i64, message: String) -> Self {
        if code == USER_REJECTED_CODE {
            ProviderError::UserRejected
        } else {
            ProviderError::Rpc { code, message }
        }
    }
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

/// `eth_sendTransaction` parameters
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
}

impl TransactionRequest {
    /// plain value transfer with a fixed gas allowance
    pub fn transfer(from: Address, to: Address, value: U256, gas: u64) -> Self {
        Self {
            from,
            to,
            gas: Some(quantity(U256::from(gas))),
            value: Some(quantity(value)),
            data: None,
        }
    }

    /// contract call carrying abi-encoded calldata
    pub fn call(from: Address, to: Address, data: Vec<u8>) -> Self {
        Self {
            from,
            to,
            gas: None,
            value: None,
            data: Some(data.into()),
        }
    }
}

/// mined transaction receipt (only the fields we read)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub status: Option<U64>,
}

impl TransactionReceipt {
    /// pre-byzantium receipts have no status; treat those as success
    pub fn succeeded(&self) -> bool {
        self.status.map_or(true, |s| s == U64::from(1))
    }
}

/// typed helpers over a raw provider
#[derive(Clone)]
pub struct Wallet {
    inner: Arc<dyn WalletProvider>,
}

impl Wallet {
    pub fn new(inner: Arc<dyn WalletProvider>) -> Self {
        Self { inner }
    }

    async fn request_as<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ProviderError> {
        let result = self.inner.request(method, params).await?;
        serde_json::from_value(result).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    /// already-authorized accounts, no prompt
    pub async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.request_as("eth_accounts", json!([])).await
    }

    /// prompt the user for account access
    pub async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.request_as("eth_requestAccounts", json!([])).await
    }

    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ProviderError> {
        self.request_as("eth_sendTransaction", json!([tx])).await
    }

    /// read-only contract call against the latest block
    pub async fn call(&self, to: Address, data: Vec<u8>) -> Result<Bytes, ProviderError> {
        let data = Bytes::from(data);
        self.request_as("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }

    pub async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        self.request_as("eth_getTransactionReceipt", json!([hash]))
            .await
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// json-rpc over http, for node-backed wallets with unlocked accounts
pub struct HttpProvider {
    url: String,
    client: Client,
    next_id: AtomicU64,
}

impl HttpProvider {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: Client::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl WalletProvider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!("rpc {} -> {}", method, self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(ProviderError::from_rpc(error.code, error.message));
        }

        // `null` is a valid result (e.g. a receipt that is not mined yet)
        Ok(body.result.unwrap_or(Value::Null))
    }
}
