//! composition root
//!
//! wires session manager, sync engine and submitter over one injected
//! wallet. state is never patched in place: every reload re-reads session,
//! history and count and publishes a new immutable snapshot with the next
//! generation number. a later reload simply supersedes an earlier one.

use alloy_primitives::Address;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::DappConfig;
use crate::error::{DappError, Result};
use crate::form::PendingTransferForm;
use crate::ledger::LedgerClient;
use crate::provider::{Wallet, WalletProvider};
use crate::session::SessionManager;
use crate::storage::CountCache;
use crate::submit::{Submission, Submitter};
use crate::sync::{SyncEngine, TransferRecord};

/// point-in-time view of (session, history, count)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub generation: u64,
    pub account: Option<Address>,
    pub history: Arc<Vec<TransferRecord>>,
    /// last known transaction count, possibly lagging
    pub transaction_count: Option<u64>,
}

/// result of a reload: the published snapshot and what went wrong on the way
#[derive(Debug)]
pub struct Reload {
    pub snapshot: Arc<Snapshot>,
    pub failures: Vec<DappError>,
}

impl Reload {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Dapp {
    session: SessionManager,
    sync: SyncEngine,
    submitter: Submitter,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl Dapp {
    /// `provider` is `None` when no wallet is installed
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        config: &DappConfig,
        cache: CountCache,
    ) -> Self {
        let wallet = provider.map(Wallet::new);
        let ledger = wallet
            .clone()
            .map(|w| LedgerClient::new(w, config.contract_address, config.poll_interval()));
        // the last known count is visible before any network read
        let transaction_count = cache.get().unwrap_or_else(|e| {
            warn!("cached count unreadable: {}", e);
            None
        });
        let cache = Arc::new(cache);

        Self {
            session: SessionManager::new(wallet.clone()),
            sync: SyncEngine::new(ledger.clone(), cache.clone()),
            submitter: Submitter::new(wallet, ledger, cache, config.gas_limit),
            snapshot: RwLock::new(Arc::new(Snapshot {
                transaction_count,
                ..Default::default()
            })),
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn sync(&self) -> &SyncEngine {
        &self.sync
    }

    pub fn submitter(&self) -> &Submitter {
        &self.submitter
    }

    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    /// cold start: the cached count is usable before any network call
    pub async fn bootstrap(&self) -> Reload {
        match self.sync.cached_count() {
            Ok(Some(count)) => info!("cached transaction count: {}", count),
            Ok(None) => info!("no cached transaction count"),
            Err(e) => warn!("cached count unreadable: {}", e),
        }
        self.reload().await
    }

    /// re-derive everything from fresh reads and publish a new snapshot
    pub async fn reload(&self) -> Reload {
        let mut failures = Vec::new();

        // independent reads; history waits for the authorization check
        let (auth, count) = tokio::join!(
            self.session.check_existing_authorization(),
            self.sync.refresh_cached_count(),
        );

        let history = match auth {
            Ok(Some(_)) => {
                let session = self.session.session().await;
                match self.sync.load_all_transfers(&session).await {
                    Ok(history) => history,
                    Err(e) => {
                        failures.push(e);
                        Arc::new(Vec::new())
                    }
                }
            }
            Ok(None) => Arc::new(Vec::new()),
            Err(e) => {
                failures.push(e);
                Arc::new(Vec::new())
            }
        };

        if let Err(e) = count {
            // a missing wallet is reported once
            let duplicate = matches!(e, DappError::ExtensionMissing)
                && failures.iter().any(|f| matches!(f, DappError::ExtensionMissing));
            if !duplicate {
                failures.push(e);
            }
        }

        let transaction_count = match self.sync.cached_count() {
            Ok(count) => count,
            Err(e) => {
                failures.push(e);
                None
            }
        };

        let account = self.session.session().await.account;
        let snapshot = {
            let mut current = self.snapshot.write().await;
            let next = Arc::new(Snapshot {
                generation: current.generation + 1,
                account,
                history,
                transaction_count,
            });
            *current = next.clone();
            next
        };

        for failure in &failures {
            warn!("reload: {}", failure);
        }
        info!(
            "published snapshot {} ({} transfers, count {:?})",
            snapshot.generation,
            snapshot.history.len(),
            snapshot.transaction_count
        );

        Reload { snapshot, failures }
    }

    /// prompt the wallet, then reload everything
    pub async fn connect(&self) -> Result<Reload> {
        self.session.connect().await?;
        Ok(self.reload().await)
    }

    /// submit a transfer; a confirmed submission is followed by a full reload
    pub async fn send(&self, form: &PendingTransferForm) -> Result<(Submission, Reload)> {
        let session = self.session.session().await;
        let submission = self.submitter.submit(form, &session).await?;
        let reload = self.reload().await;
        Ok((submission, reload))
    }
}
