//! transaction submitter
//!
//! one submission walks `Idle -> AwaitingWalletApproval ->
//! AwaitingLedgerConfirmation -> Confirmed`, or ends in `Failed`. every
//! transition is broadcast; `is_loading` is true while any ledger write is
//! pending. each submission holds one count of it until it exits.

use alloy_primitives::{Address, B256, U256};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::error::{DappError, Result};
use crate::form::PendingTransferForm;
use crate::ledger::LedgerClient;
use crate::provider::{TransactionRequest, Wallet};
use crate::session::Session;
use crate::storage::CountCache;
use crate::units::parse_ether;

/// gas allowance for a plain value transfer
pub const TRANSFER_GAS: u64 = 21_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitState {
    Idle,
    AwaitingWalletApproval,
    AwaitingLedgerConfirmation { tx_hash: B256 },
    Confirmed { tx_hash: B256, transaction_count: u64 },
    Failed { reason: String },
}

impl SubmitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmitState::Confirmed { .. } | SubmitState::Failed { .. })
    }
}

/// outcome of a confirmed submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub transfer_hash: B256,
    pub ledger_hash: B256,
    pub amount_base_units: U256,
    pub transaction_count: u64,
}

/// one in-flight ledger write, released when dropped
struct LoadingGuard<'a> {
    pending: &'a watch::Sender<usize>,
}

impl<'a> LoadingGuard<'a> {
    fn raise(pending: &'a watch::Sender<usize>) -> Self {
        pending.send_modify(|n| *n += 1);
        Self { pending }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.pending.send_modify(|n| *n = n.saturating_sub(1));
    }
}

pub struct Submitter {
    wallet: Option<Wallet>,
    ledger: Option<LedgerClient>,
    cache: Arc<CountCache>,
    gas_limit: u64,
    state: watch::Sender<SubmitState>,
    events: broadcast::Sender<SubmitState>,
    loading: watch::Sender<usize>,
}

impl Submitter {
    pub fn new(
        wallet: Option<Wallet>,
        ledger: Option<LedgerClient>,
        cache: Arc<CountCache>,
        gas_limit: u64,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            wallet,
            ledger,
            cache,
            gas_limit,
            state: watch::channel(SubmitState::Idle).0,
            events,
            loading: watch::channel(0).0,
        }
    }

    pub fn state(&self) -> SubmitState {
        self.state.borrow().clone()
    }

    /// every transition, in order
    pub fn subscribe(&self) -> broadcast::Receiver<SubmitState> {
        self.events.subscribe()
    }

    /// true while at least one submission awaits ledger confirmation
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow() > 0
    }

    /// number of submissions awaiting ledger confirmation
    pub fn watch_loading(&self) -> watch::Receiver<usize> {
        self.loading.subscribe()
    }

    fn transition(&self, next: SubmitState) {
        self.state.send_replace(next.clone());
        // no subscribers is fine
        let _ = self.events.send(next);
    }

    /// send the value transfer, record it on the ledger and wait until mined
    pub async fn submit(
        &self,
        form: &PendingTransferForm,
        session: &Session,
    ) -> Result<Submission> {
        let (wallet, ledger) = match (&self.wallet, &self.ledger) {
            (Some(w), Some(l)) => (w, l),
            _ => return Err(DappError::ExtensionMissing),
        };
        let from = session.account.ok_or(DappError::NotConnected)?;
        let amount = parse_ether(&form.amount)?;
        let to = Address::from_str(form.address_to.trim())
            .map_err(|e| DappError::InvalidAddress(format!("{}: {}", form.address_to, e)))?;

        self.transition(SubmitState::Idle);
        match self.run(wallet, ledger, from, to, amount, form).await {
            Ok(submission) => Ok(submission),
            Err(e) => {
                warn!("submission failed: {}", e);
                self.transition(SubmitState::Failed {
                    reason: e.to_string(),
                });
                Err(DappError::transaction(e))
            }
        }
    }

    async fn run(
        &self,
        wallet: &Wallet,
        ledger: &LedgerClient,
        from: Address,
        to: Address,
        amount: U256,
        form: &PendingTransferForm,
    ) -> Result<Submission> {
        self.transition(SubmitState::AwaitingWalletApproval);

        let transfer = TransactionRequest::transfer(from, to, amount, self.gas_limit);
        let transfer_hash = wallet
            .send_transaction(&transfer)
            .await
            .map_err(DappError::TransferFailed)?;
        info!("value transfer sent: {}", transfer_hash);

        let pending = ledger
            .add_to_blockchain(from, to, amount, &form.message, &form.keyword)
            .await
            .map_err(DappError::LedgerRejected)?;
        let ledger_hash = pending.hash();

        {
            let _loading = LoadingGuard::raise(&self.loading);
            self.transition(SubmitState::AwaitingLedgerConfirmation {
                tx_hash: ledger_hash,
            });
            info!("loading - {}", ledger_hash);
            pending.wait().await?;
        }
        info!("success - {}", ledger_hash);

        let count = ledger
            .transaction_count()
            .await
            .map_err(DappError::LedgerUnavailable)?;
        let transaction_count = self.cache.store(count)?;

        self.transition(SubmitState::Confirmed {
            tx_hash: ledger_hash,
            transaction_count,
        });

        Ok(Submission {
            transfer_hash,
            ledger_hash,
            amount_base_units: amount,
            transaction_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devnet::{DevnetWallet, DEVNET_CONTRACT};
    use crate::provider::ProviderError;
    use std::time::Duration;

    fn submitter(devnet: &Arc<DevnetWallet>) -> Submitter {
        let wallet = Wallet::new(devnet.clone());
        let ledger = LedgerClient::new(wallet.clone(), DEVNET_CONTRACT, Duration::from_millis(1));
        Submitter::new(
            Some(wallet),
            Some(ledger),
            Arc::new(CountCache::temporary().unwrap()),
            TRANSFER_GAS,
        )
    }

    fn drain(rx: &mut broadcast::Receiver<SubmitState>) -> Vec<SubmitState> {
        let mut seen = Vec::new();
        while let Ok(state) = rx.try_recv() {
            seen.push(state);
        }
        seen
    }

    #[tokio::test]
    async fn test_submit_walks_state_machine() {
        let devnet = Arc::new(DevnetWallet::new().with_accounts(2).authorized().confirm_after(3));
        let accounts = devnet.accounts();
        let submitter = submitter(&devnet);
        let mut rx = submitter.subscribe();

        let form = PendingTransferForm::new(&accounts[1].to_string(), "1.5", "cake", "for lunch");
        let session = Session {
            account: Some(accounts[0]),
        };
        let submission = submitter.submit(&form, &session).await.unwrap();

        let states = drain(&mut rx);
        assert_eq!(states.len(), 4);
        assert_eq!(states[0], SubmitState::Idle);
        assert_eq!(states[1], SubmitState::AwaitingWalletApproval);
        assert_eq!(
            states[2],
            SubmitState::AwaitingLedgerConfirmation {
                tx_hash: submission.ledger_hash
            }
        );
        assert_eq!(
            states[3],
            SubmitState::Confirmed {
                tx_hash: submission.ledger_hash,
                transaction_count: 1,
            }
        );
        assert!(!submitter.is_loading());
        assert!(submitter.state().is_terminal());

        assert_eq!(submission.amount_base_units, U256::from(1_500_000_000_000_000_000u64));
        assert_eq!(
            devnet.value_transfers(),
            vec![(accounts[0], accounts[1], submission.amount_base_units)]
        );
        assert_eq!(devnet.record_count(), 1);
    }

    #[tokio::test]
    async fn test_loading_only_while_ledger_pending() {
        let devnet = Arc::new(DevnetWallet::new().with_accounts(2).authorized().confirm_after(2));
        let accounts = devnet.accounts();
        let submitter = submitter(&devnet);
        let mut loading = submitter.watch_loading();
        assert_eq!(*loading.borrow_and_update(), 0);

        let form = PendingTransferForm::new(&accounts[1].to_string(), "0.01", "k", "m");
        let session = Session {
            account: Some(accounts[0]),
        };
        submitter.submit(&form, &session).await.unwrap();

        // raised then lowered
        assert!(loading.has_changed().unwrap());
        assert_eq!(*loading.borrow_and_update(), 0);
    }

    #[test]
    fn test_loading_held_until_last_submission_exits() {
        let (pending, rx) = watch::channel(0usize);

        let first = LoadingGuard::raise(&pending);
        let second = LoadingGuard::raise(&pending);
        assert_eq!(*rx.borrow(), 2);

        drop(first);
        assert_eq!(*rx.borrow(), 1);

        drop(second);
        assert_eq!(*rx.borrow(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_clear_loading() {
        let devnet = Arc::new(
            DevnetWallet::new()
                .with_accounts(3)
                .authorized()
                .confirm_after(2),
        );
        let accounts = devnet.accounts();
        let submitter = submitter(&devnet);
        let session = Session {
            account: Some(accounts[0]),
        };

        let a = PendingTransferForm::new(&accounts[1].to_string(), "1", "a", "first");
        let b = PendingTransferForm::new(&accounts[2].to_string(), "2", "b", "second");
        let (ra, rb) = tokio::join!(submitter.submit(&a, &session), submitter.submit(&b, &session));

        ra.unwrap();
        rb.unwrap();
        assert!(!submitter.is_loading());
        assert_eq!(devnet.record_count(), 2);
    }

    #[tokio::test]
    async fn test_preconditions_do_not_touch_network() {
        let devnet = Arc::new(DevnetWallet::new().with_accounts(2).authorized());
        let accounts = devnet.accounts();
        let submitter = submitter(&devnet);
        let session = Session {
            account: Some(accounts[0]),
        };

        let bad_amount = PendingTransferForm::new(&accounts[1].to_string(), "1,5", "k", "m");
        assert!(matches!(
            submitter.submit(&bad_amount, &session).await,
            Err(DappError::InvalidAmount(_))
        ));

        let bad_address = PendingTransferForm::new("0xABC", "1", "k", "m");
        assert!(matches!(
            submitter.submit(&bad_address, &session).await,
            Err(DappError::InvalidAddress(_))
        ));

        let form = PendingTransferForm::new(&accounts[1].to_string(), "1", "k", "m");
        assert!(matches!(
            submitter.submit(&form, &Session::default()).await,
            Err(DappError::NotConnected)
        ));

        assert!(devnet.requests().is_empty());
        assert_eq!(submitter.state(), SubmitState::Idle);
    }

    #[tokio::test]
    async fn test_missing_extension() {
        let cache = Arc::new(CountCache::temporary().unwrap());
        let submitter = Submitter::new(None, None, cache, TRANSFER_GAS);
        let to = Address::repeat_byte(1).to_string();
        let form = PendingTransferForm::new(&to, "1", "k", "m");
        let session = Session {
            account: Some(Address::repeat_byte(1)),
        };
        assert!(matches!(
            submitter.submit(&form, &session).await,
            Err(DappError::ExtensionMissing)
        ));
    }

    #[tokio::test]
    async fn test_wallet_rejection() {
        let devnet = Arc::new(DevnetWallet::new().with_accounts(2).authorized());
        devnet.reject_next_send();
        let accounts = devnet.accounts();
        let submitter = submitter(&devnet);
        let mut rx = submitter.subscribe();

        let form = PendingTransferForm::new(&accounts[1].to_string(), "1", "k", "m");
        let session = Session {
            account: Some(accounts[0]),
        };
        let err = submitter.submit(&form, &session).await.unwrap_err();

        assert!(matches!(
            err.root_cause(),
            DappError::TransferFailed(ProviderError::UserRejected)
        ));
        assert!(matches!(err, DappError::TransactionFailed(_)));

        let states = drain(&mut rx);
        assert_eq!(states[1], SubmitState::AwaitingWalletApproval);
        assert!(matches!(states.last(), Some(SubmitState::Failed { .. })));
        assert!(!submitter.is_loading());
        assert_eq!(devnet.record_count(), 0);
    }

    #[tokio::test]
    async fn test_revert_clears_loading() {
        let devnet = Arc::new(DevnetWallet::new().with_accounts(2).authorized().confirm_after(2));
        devnet.revert_next_append();
        let accounts = devnet.accounts();
        let submitter = submitter(&devnet);
        let mut rx = submitter.subscribe();

        let form = PendingTransferForm::new(&accounts[1].to_string(), "2", "k", "m");
        let session = Session {
            account: Some(accounts[0]),
        };
        let err = submitter.submit(&form, &session).await.unwrap_err();

        assert!(matches!(err.root_cause(), DappError::Reverted(_)));
        assert!(!submitter.is_loading());

        let states = drain(&mut rx);
        assert!(matches!(states[2], SubmitState::AwaitingLedgerConfirmation { .. }));
        assert!(matches!(states[3], SubmitState::Failed { .. }));
        assert_eq!(devnet.record_count(), 0);
    }
}
