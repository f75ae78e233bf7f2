use alloy_primitives::Address;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use transfer_ledger::{
    CountCache, Dapp, DappConfig, DappError, DevnetWallet, GifClient, HttpProvider,
    PendingTransferForm, Reload, WalletProvider, DEVNET_CONTRACT,
};

#[derive(Parser, Debug)]
#[command(name = "txl")]
#[command(
    about = "send and browse transfers recorded on an evm ledger contract",
    long_about = None
)]
struct Args {
    /// TOML config file
    #[arg(long, env = "TXL_CONFIG")]
    config: Option<PathBuf>,

    /// wallet JSON-RPC endpoint (a node with unlocked accounts)
    #[arg(long, env = "TXL_WALLET_RPC")]
    wallet_rpc: Option<String>,

    /// ledger contract address
    #[arg(long, env = "TXL_CONTRACT")]
    contract: Option<Address>,

    /// sled database for the cached transaction count
    #[arg(long)]
    cache_path: Option<String>,

    /// run against an in-process devnet wallet instead of a node
    #[arg(long)]
    devnet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// show the connected account and the cached transaction count
    Status,
    /// ask the wallet for account access
    Connect,
    /// list every transfer recorded on the ledger
    History,
    /// send a transfer and record it on the ledger
    Send {
        #[arg(long)]
        to: String,
        /// amount in ether, e.g. 0.01
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "")]
        keyword: String,
        #[arg(long, default_value = "")]
        message: String,
    },
    /// look up the gif for a keyword
    Gif { keyword: String },
}

fn load_config(args: &Args) -> Result<DappConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            DappConfig::from_toml(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => DappConfig::default(),
    };

    if let Some(rpc) = &args.wallet_rpc {
        config.wallet_rpc = Some(rpc.clone());
    }
    if let Some(contract) = args.contract {
        config.contract_address = contract;
    }
    if let Some(path) = &args.cache_path {
        config.cache_path = path.clone();
    }
    if args.devnet {
        config.contract_address = DEVNET_CONTRACT;
        config.poll_interval_ms = 10;
    }

    Ok(config)
}

fn wallet(args: &Args, config: &DappConfig) -> Option<Arc<dyn WalletProvider>> {
    if args.devnet {
        info!("using in-process devnet wallet");
        return Some(Arc::new(DevnetWallet::new().with_accounts(2).authorized()));
    }
    config
        .wallet_rpc
        .as_deref()
        .map(|url| Arc::new(HttpProvider::new(url)) as Arc<dyn WalletProvider>)
}

fn report(reload: &Reload) {
    for failure in &reload.failures {
        match failure {
            DappError::ExtensionMissing => {
                println!("no wallet detected: pass --wallet-rpc or set wallet_rpc in the config")
            }
            other => println!("warning: {}", other),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transfer_ledger=info,txl=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    if config.contract_address == Address::ZERO && !args.devnet {
        warn!("contract address not configured");
    }

    let cache = if args.devnet {
        CountCache::temporary()?
    } else {
        CountCache::open(&config.cache_path)?
    };
    let dapp = Dapp::new(wallet(&args, &config), &config, cache);

    match args.command {
        Command::Gif { keyword } => {
            let client = GifClient::new(config.gif.clone());
            match client.lookup(&keyword).await {
                Some(url) => println!("{}", url),
                None => println!("empty keyword"),
            }
        }
        Command::Status => {
            if let Some(count) = dapp.snapshot().await.transaction_count {
                println!("cached transactions: {}", count);
            }
            let reload = dapp.bootstrap().await;
            report(&reload);
            let snapshot = &reload.snapshot;
            match snapshot.account {
                Some(account) => println!("account: {}", account),
                None => println!("account: not connected"),
            }
            match snapshot.transaction_count {
                Some(count) => println!("transactions: {}", count),
                None => println!("transactions: unknown"),
            }
        }
        Command::Connect => {
            report(&dapp.bootstrap().await);
            let reload = dapp.connect().await?;
            report(&reload);
            if let Some(account) = reload.snapshot.account {
                println!("connected {}", account);
            }
        }
        Command::History => {
            let reload = dapp.bootstrap().await;
            report(&reload);
            for transfer in reload.snapshot.history.iter().rev() {
                println!(
                    "{}  {} -> {}  {} ETH  [{}] {}",
                    transfer.timestamp(),
                    transfer.address_from,
                    transfer.address_to,
                    transfer.amount_exact(),
                    transfer.keyword,
                    transfer.message,
                );
            }
        }
        Command::Send {
            to,
            amount,
            keyword,
            message,
        } => {
            report(&dapp.bootstrap().await);
            let form = PendingTransferForm {
                address_to: to,
                amount,
                keyword,
                message,
            };
            let (submission, reload) = dapp.send(&form).await?;
            report(&reload);
            println!("transfer {}", submission.transfer_hash);
            println!("recorded {}", submission.ledger_hash);
            println!("transactions: {}", submission.transaction_count);
        }
    }

    Ok(())
}
