//! ledger sync engine - history reload and cached count refresh
//!
//! history is replaced wholesale on every load: the list is always a
//! complete point-in-time snapshot of the contract, never merged.

use alloy_primitives::{Address, U256};
use chrono::{Local, TimeZone};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{DappError, Result};
use crate::ledger::{LedgerClient, RawTransferRecord};
use crate::provider::ProviderError;
use crate::session::Session;
use crate::storage::CountCache;
use crate::units::{format_ether, to_display};

/// display-ready transfer, immutable once read from the ledger
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRecord {
    pub address_from: Address,
    pub address_to: Address,
    pub amount_base_units: U256,
    pub timestamp_unix_seconds: u64,
    pub message: String,
    pub keyword: String,
}

impl TransferRecord {
    pub fn from_raw(raw: &RawTransferRecord) -> std::result::Result<Self, ProviderError> {
        let timestamp_unix_seconds = u64::try_from(raw.timestamp).map_err(|_| {
            ProviderError::Decode(format!("timestamp {} out of range", raw.timestamp))
        })?;

        Ok(Self {
            address_from: raw.sender,
            address_to: raw.receiver,
            amount_base_units: raw.amount,
            timestamp_unix_seconds,
            message: raw.message.clone(),
            keyword: raw.keyword.clone(),
        })
    }

    /// amount in display units
    pub fn amount(&self) -> f64 {
        to_display(self.amount_base_units)
    }

    /// exact amount in display units
    pub fn amount_exact(&self) -> String {
        format_ether(self.amount_base_units)
    }

    /// local date-time, e.g. "11/14/2023, 10:13:20 PM"
    pub fn timestamp(&self) -> String {
        i64::try_from(self.timestamp_unix_seconds)
            .ok()
            .and_then(|secs| Local.timestamp_opt(secs, 0).single())
            .map(|dt| dt.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string())
            .unwrap_or_else(|| self.timestamp_unix_seconds.to_string())
    }
}

pub struct SyncEngine {
    ledger: Option<LedgerClient>,
    cache: Arc<CountCache>,
    history: RwLock<Arc<Vec<TransferRecord>>>,
}

impl SyncEngine {
    pub fn new(ledger: Option<LedgerClient>, cache: Arc<CountCache>) -> Self {
        Self {
            ledger,
            cache,
            history: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// last loaded history
    pub async fn history(&self) -> Arc<Vec<TransferRecord>> {
        self.history.read().await.clone()
    }

    /// read every record from the contract and replace the history
    pub async fn load_all_transfers(&self, session: &Session) -> Result<Arc<Vec<TransferRecord>>> {
        let ledger = self.ledger.as_ref().ok_or(DappError::ExtensionMissing)?;
        if !session.is_connected() {
            debug!("no active session, history unchanged");
            return Ok(self.history().await);
        }

        let raw = ledger.all_transactions().await.map_err(|e| {
            warn!("failed to load transfers: {}", e);
            DappError::LedgerUnavailable(e)
        })?;

        let records = raw
            .iter()
            .map(TransferRecord::from_raw)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                warn!("malformed transfer record: {}", e);
                DappError::LedgerUnavailable(e)
            })?;

        info!("loaded {} transfers", records.len());
        let records = Arc::new(records);
        *self.history.write().await = records.clone();
        Ok(records)
    }

    /// read the on-chain count and fold it into the cache
    pub async fn refresh_cached_count(&self) -> Result<u64> {
        let ledger = self.ledger.as_ref().ok_or(DappError::ExtensionMissing)?;

        let count = ledger.transaction_count().await.map_err(|e| {
            warn!("failed to read transaction count: {}", e);
            DappError::LedgerUnavailable(e)
        })?;

        let held = self.cache.store(count)?;
        debug!("transaction count {} (cached {})", count, held);
        Ok(held)
    }

    /// last known count, available before any network call
    pub fn cached_count(&self) -> Result<Option<u64>> {
        self.cache.get()
    }
}
