//! end-to-end flow against the devnet wallet
//!
//! bootstrap -> connect -> send -> reload, checking the published snapshots

use alloy_primitives::U256;
use std::sync::Arc;

use transfer_ledger::{
    CountCache, Dapp, DappConfig, DappError, DevnetWallet, PendingTransferForm, ProviderError,
    SubmitState, WalletProvider, DEVNET_CONTRACT,
};

fn config() -> DappConfig {
    DappConfig {
        contract_address: DEVNET_CONTRACT,
        poll_interval_ms: 1,
        ..Default::default()
    }
}

fn dapp(devnet: &Arc<DevnetWallet>) -> Dapp {
    Dapp::new(
        Some(devnet.clone() as Arc<dyn WalletProvider>),
        &config(),
        CountCache::temporary().unwrap(),
    )
}

#[tokio::test]
async fn test_connect_then_send() {
    let devnet = Arc::new(DevnetWallet::new().with_accounts(2).confirm_after(4));
    let accounts = devnet.accounts();
    devnet.seed_record(accounts[1], accounts[0], U256::from(10u64), "earlier", "old");

    let dapp = dapp(&devnet);

    // cold start: nobody authorized yet, but the count is already known
    let start = dapp.bootstrap().await;
    assert!(start.is_clean());
    assert_eq!(start.snapshot.account, None);
    assert!(start.snapshot.history.is_empty());
    assert_eq!(start.snapshot.transaction_count, Some(1));

    let connected = dapp.connect().await.unwrap();
    assert_eq!(connected.snapshot.account, Some(accounts[0]));
    assert_eq!(connected.snapshot.history.len(), 1);

    let mut rx = dapp.submitter().subscribe();
    let before = connected.snapshot.transaction_count.unwrap();

    let mut form = PendingTransferForm::default();
    form.set("addressTo".parse().unwrap(), accounts[1].to_string());
    form.set("amount".parse().unwrap(), "1.5");
    form.set("keyword".parse().unwrap(), "pizza");
    form.set("message".parse().unwrap(), "friday");

    let (submission, reload) = dapp.send(&form).await.unwrap();

    let mut states = Vec::new();
    while let Ok(state) = rx.try_recv() {
        states.push(state);
    }
    assert_eq!(
        states,
        vec![
            SubmitState::Idle,
            SubmitState::AwaitingWalletApproval,
            SubmitState::AwaitingLedgerConfirmation {
                tx_hash: submission.ledger_hash
            },
            SubmitState::Confirmed {
                tx_hash: submission.ledger_hash,
                transaction_count: before + 1,
            },
        ]
    );
    assert!(!dapp.submitter().is_loading());

    // the confirmed write is followed by a full reload
    assert!(reload.is_clean());
    assert_eq!(reload.snapshot.generation, connected.snapshot.generation + 1);
    assert_eq!(reload.snapshot.transaction_count, Some(before + 1));
    assert_eq!(reload.snapshot.history.len(), 2);

    let latest = &reload.snapshot.history[1];
    assert_eq!(latest.address_from, accounts[0]);
    assert_eq!(latest.address_to, accounts[1]);
    assert_eq!(latest.amount(), 1.5);
    assert_eq!(latest.keyword, "pizza");
    assert_eq!(latest.message, "friday");

    // the form is not cleared by a submit
    assert_eq!(form.amount, "1.5");
}

#[tokio::test]
async fn test_cached_count_never_decreases() {
    let devnet = Arc::new(DevnetWallet::new().with_accounts(2).authorized());
    let accounts = devnet.accounts();
    let dapp = dapp(&devnet);
    dapp.bootstrap().await;

    let mut last = 0;
    for round in 0..3 {
        let form = PendingTransferForm::new(&accounts[1].to_string(), "0.000021", "k", "m");
        let (submission, reload) = dapp.send(&form).await.unwrap();
        assert_eq!(submission.amount_base_units, U256::from(21_000_000_000_000u64));

        let count = reload.snapshot.transaction_count.unwrap();
        assert_eq!(count, round + 1);
        assert!(count >= last);
        last = count;

        let refreshed = dapp.sync().refresh_cached_count().await.unwrap();
        assert!(refreshed >= last);
    }
}

#[tokio::test]
async fn test_failed_send_keeps_snapshot() {
    let devnet = Arc::new(DevnetWallet::new().with_accounts(2).authorized());
    let accounts = devnet.accounts();
    let dapp = dapp(&devnet);
    let start = dapp.bootstrap().await.snapshot;

    devnet.reject_next_send();
    let form = PendingTransferForm::new(&accounts[1].to_string(), "1", "k", "m");
    let err = dapp.send(&form).await.unwrap_err();

    assert!(matches!(err, DappError::TransactionFailed(_)));
    assert!(matches!(
        err.root_cause(),
        DappError::TransferFailed(ProviderError::UserRejected)
    ));
    assert!(!dapp.submitter().is_loading());
    assert!(matches!(dapp.submitter().state(), SubmitState::Failed { .. }));

    // no reload after a failure: the published snapshot is untouched
    assert_eq!(dapp.snapshot().await, start);
}

#[tokio::test]
async fn test_every_operation_without_wallet() {
    let dapp = Dapp::new(None, &config(), CountCache::temporary().unwrap());

    let reload = dapp.bootstrap().await;
    assert!(matches!(reload.failures.as_slice(), [DappError::ExtensionMissing]));

    assert!(matches!(
        dapp.session().check_existing_authorization().await,
        Err(DappError::ExtensionMissing)
    ));
    assert!(matches!(dapp.connect().await, Err(DappError::ExtensionMissing)));
    assert!(matches!(
        dapp.sync().refresh_cached_count().await,
        Err(DappError::ExtensionMissing)
    ));
    assert!(matches!(
        dapp.sync().load_all_transfers(&dapp.session().session().await).await,
        Err(DappError::ExtensionMissing)
    ));

    let to = "0x0000000000000000000000000000000000000002";
    let form = PendingTransferForm::new(to, "1", "k", "m");
    assert!(matches!(dapp.send(&form).await, Err(DappError::ExtensionMissing)));
}
