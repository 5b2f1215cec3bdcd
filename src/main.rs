use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use walletpay::application::dispatcher::PaymentDispatcher;
use walletpay::application::provisioning::WalletProvisioner;
use walletpay::application::reconciler::StatusReconciler;
use walletpay::application::resolver::BankAccountResolver;
use walletpay::application::verifier::PinVerifier;
use walletpay::config::GatewayConfig;
use walletpay::domain::payment::{Destination, PaymentId, PendingPayment};
use walletpay::domain::ports::{
    BankDirectoryRef, PaymentStoreRef, PinStoreRef, RecordStoreRef, TransferGatewayRef,
    WalletStoreRef,
};
use walletpay::domain::wallet::{Amount, WalletId};
use walletpay::infrastructure::gateway::HttpTransferGateway;
use walletpay::infrastructure::in_memory::{
    InMemoryBankDirectory, InMemoryPaymentStore, InMemoryPinStore, InMemoryRecordStore,
    InMemoryWalletStore,
};

#[derive(Parser)]
#[command(author, version, about = "wallet provisioning, PIN authorization and payment dispatch", long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Provision a wallet for a holder through the gateway
    Provision {
        holder_name: String,
        /// 11-digit national identity reference
        identity_ref: String,
    },
    /// Set up the payment PIN for a wallet
    SetupPin { wallet: String, pin: String },
    /// Dispatch a transfer from a wallet
    Pay {
        wallet: String,
        amount: Decimal,
        /// Destination account number (10 digits)
        #[arg(long)]
        account: String,
        /// Destination bank name
        #[arg(long)]
        bank: String,
        /// Destination bank code; looked up in the directory when omitted
        #[arg(long)]
        bank_code: Option<String>,
        #[arg(long)]
        pin: String,
        #[arg(long)]
        narration: Option<String>,
    },
    /// Reconcile the status of a transaction reference
    Status { reference: String },
    /// Refresh the local bank directory from the gateway
    SyncBanks,
}

struct Stores {
    wallets: WalletStoreRef,
    pins: PinStoreRef,
    payments: PaymentStoreRef,
    records: RecordStoreRef,
    banks: BankDirectoryRef,
}

fn in_memory_stores() -> Stores {
    Stores {
        wallets: Arc::new(InMemoryWalletStore::new()),
        pins: Arc::new(InMemoryPinStore::new()),
        payments: Arc::new(InMemoryPaymentStore::new()),
        records: Arc::new(InMemoryRecordStore::new()),
        banks: Arc::new(InMemoryBankDirectory::new()),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn rocksdb_stores(path: &std::path::Path) -> walletpay::error::Result<Stores> {
    let store = walletpay::infrastructure::rocksdb::RocksDbStore::open(path)?;
    Ok(Stores {
        wallets: Arc::new(store.clone()),
        pins: Arc::new(store.clone()),
        payments: Arc::new(store.clone()),
        records: Arc::new(store.clone()),
        banks: Arc::new(store),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let stores = match &cli.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => rocksdb_stores(path).into_diagnostic()?,
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            return Err(miette::miette!(
                "this build has no persistent storage; rebuild with --features storage-rocksdb"
            ));
        }
        None => in_memory_stores(),
    };

    let config = GatewayConfig::from_env().into_diagnostic()?;
    let gateway: TransferGatewayRef =
        Arc::new(HttpTransferGateway::new(config).into_diagnostic()?);

    let verifier = PinVerifier::new(stores.pins.clone());
    let resolver = BankAccountResolver::new(gateway.clone(), stores.banks.clone());
    let dispatcher = PaymentDispatcher::new(
        stores.wallets.clone(),
        stores.payments.clone(),
        stores.records.clone(),
        gateway.clone(),
        verifier.clone(),
        resolver,
    );
    let reconciler = StatusReconciler::new(
        stores.wallets.clone(),
        stores.payments.clone(),
        stores.records.clone(),
        gateway.clone(),
    );
    let provisioner = WalletProvisioner::new(stores.wallets, stores.banks, gateway);

    match cli.command {
        Command::Provision {
            holder_name,
            identity_ref,
        } => {
            let wallet = provisioner
                .provision(&holder_name, &identity_ref)
                .await
                .into_diagnostic()?;
            println!(
                "provisioned wallet {} (account {}) for {}",
                wallet.id, wallet.account_number, wallet.holder_name
            );
        }
        Command::SetupPin { wallet, pin } => {
            verifier
                .setup(WalletId::new(wallet.clone()), &pin)
                .await
                .into_diagnostic()?;
            println!("PIN configured for wallet {wallet}");
        }
        Command::Pay {
            wallet,
            amount,
            account,
            bank,
            bank_code,
            pin,
            narration,
        } => {
            let mut payment = PendingPayment::new(
                PaymentId::generate(),
                WalletId::new(wallet),
                Destination {
                    account_number: account,
                    bank_code,
                    bank_name: bank,
                },
                Amount::try_from(amount).into_diagnostic()?,
            );
            if let Some(narration) = narration {
                payment = payment.with_narration(narration);
            }
            let paid = dispatcher.dispatch(payment, &pin).await.into_diagnostic()?;
            println!(
                "transfer of {} accepted, reference {}",
                paid.amount,
                paid.transaction_reference.as_deref().unwrap_or("-")
            );
        }
        Command::Status { reference } => {
            let status = reconciler.reconcile(&reference).await.into_diagnostic()?;
            println!("{reference}: {status}");
        }
        Command::SyncBanks => {
            let added = provisioner.sync_banks().await.into_diagnostic()?;
            println!("bank directory synced, {added} added");
        }
    }

    Ok(())
}
