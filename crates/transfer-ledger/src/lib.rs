//! transfer-ledger: wallet session, transfer history and transfer submission
//! against an evm ledger contract
//!
//! the wallet is an injected eip-1193 style provider. without one, every
//! operation reports `ExtensionMissing` and makes no network call.
//!
//! ## usage
//!
//! ```rust,ignore
//! let provider: Arc<dyn WalletProvider> = Arc::new(HttpProvider::new("http://127.0.0.1:8545"));
//! let dapp = Dapp::new(Some(provider), &config, CountCache::open("./cache")?);
//!
//! let reload = dapp.bootstrap().await;
//! for transfer in reload.snapshot.history.iter() {
//!     println!("{} -> {}: {}", transfer.address_from, transfer.address_to, transfer.amount());
//! }
//!
//! let form = PendingTransferForm::new("0x...", "0.01", "coffee", "thanks");
//! let (submission, reload) = dapp.send(&form).await?;
//! ```

pub mod config;
pub mod dapp;
pub mod devnet;
pub mod error;
pub mod form;
pub mod gif;
pub mod ledger;
pub mod provider;
pub mod session;
pub mod storage;
pub mod submit;
pub mod sync;
pub mod units;

pub use config::{DappConfig, GifConfig};
pub use dapp::{Dapp, Reload, Snapshot};
pub use devnet::{DevnetWallet, DEVNET_CONTRACT};
pub use error::{DappError, Result};
pub use form::{FormField, PendingTransferForm};
pub use gif::GifClient;
pub use ledger::{LedgerClient, PendingTransaction, RawTransferRecord};
pub use provider::{HttpProvider, ProviderError, TransactionRequest, Wallet, WalletProvider};
pub use session::{Session, SessionManager};
pub use storage::CountCache;
pub use submit::{SubmitState, Submission, Submitter, TRANSFER_GAS};
pub use sync::{SyncEngine, TransferRecord};
pub use units::{format_ether, parse_ether, AmountError};
