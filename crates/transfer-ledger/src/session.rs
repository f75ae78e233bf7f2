//! wallet session manager
//!
//! owns the connected account. only one account is tracked; account change
//! events from the wallet are not followed.

use alloy_primitives::Address;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{DappError, Result};
use crate::provider::{ProviderError, Wallet};

/// connection state shared with the sync engine and submitter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub account: Option<Address>,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }
}

pub struct SessionManager {
    wallet: Option<Wallet>,
    session: RwLock<Session>,
}

impl SessionManager {
    pub fn new(wallet: Option<Wallet>) -> Self {
        Self {
            wallet,
            session: RwLock::new(Session::default()),
        }
    }

    pub async fn session(&self) -> Session {
        *self.session.read().await
    }

    /// adopt an already-authorized account without prompting
    pub async fn check_existing_authorization(&self) -> Result<Option<Address>> {
        let wallet = self.wallet.as_ref().ok_or(DappError::ExtensionMissing)?;

        let accounts = wallet.accounts().await.map_err(|e| {
            warn!("eth_accounts failed: {}", e);
            DappError::ConnectionFailed(e)
        })?;
        info!("authorized accounts: {:?}", accounts);

        match accounts.first() {
            Some(&account) => {
                self.session.write().await.account = Some(account);
                Ok(Some(account))
            }
            None => {
                info!("no authorized account found");
                Ok(None)
            }
        }
    }

    /// prompt the wallet for access and adopt the granted account
    pub async fn connect(&self) -> Result<Address> {
        let wallet = self.wallet.as_ref().ok_or(DappError::ExtensionMissing)?;

        let accounts = wallet.request_accounts().await.map_err(|e| {
            warn!("eth_requestAccounts failed: {}", e);
            DappError::ConnectionFailed(e)
        })?;

        let account = accounts.first().copied().ok_or_else(|| {
            DappError::ConnectionFailed(ProviderError::Decode("wallet granted no accounts".into()))
        })?;

        self.session.write().await.account = Some(account);
        info!("connected {}", account);
        Ok(account)
    }
}
