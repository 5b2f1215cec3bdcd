use rand::Rng;
use tracing::{info, warn};

use super::unix_ms;
use crate::domain::ports::{
    BankDirectory, BankDirectoryRef, CreateWalletRequest, TransferGateway, TransferGatewayRef,
    WalletStore, WalletStoreRef,
};
use crate::domain::wallet::{IdentityRef, Wallet, WalletId};
use crate::error::{PaymentError, Result};

const HOLDER_NAME_MIN: usize = 2;
const HOLDER_NAME_MAX: usize = 50;

/// Creates wallets through the gateway's provisioning API and keeps the
/// local bank directory in sync with the gateway's bank list.
#[derive(Clone)]
pub struct WalletProvisioner {
    wallets: WalletStoreRef,
    banks: BankDirectoryRef,
    gateway: TransferGatewayRef,
}

impl WalletProvisioner {
    pub fn new(wallets: WalletStoreRef, banks: BankDirectoryRef, gateway: TransferGatewayRef) -> Self {
        Self {
            wallets,
            banks,
            gateway,
        }
    }

    /// Provisions a wallet for a holder. Inputs are validated before any
    /// external call; the wallet is persisted `Provisioned` with a zero
    /// balance once the gateway assigns it an account.
    pub async fn provision(&self, holder_name: &str, identity_ref: &str) -> Result<Wallet> {
        let holder = holder_name.trim();
        validate_holder_name(holder)?;
        let identity = IdentityRef::new(identity_ref)?;

        let request = CreateWalletRequest {
            ex_ref: exchange_reference(),
            name: holder.to_owned(),
            identity_number: identity.as_str().to_owned(),
            description: format!("Virtual wallet for {holder}"),
            account_type: "static".to_owned(),
        };
        let account = self.gateway.create_wallet(request).await?;

        let wallet = Wallet::provisioned(
            WalletId::new(account.id),
            holder,
            identity,
            account.account_number,
        );
        self.wallets.insert(wallet.clone()).await?;
        info!(
            wallet = %wallet.id,
            account = %wallet.account_number,
            "wallet provisioned"
        );
        Ok(wallet)
    }

    /// Pulls the gateway's bank list into the directory, skipping codes
    /// already on record. Returns the number of banks added.
    pub async fn sync_banks(&self) -> Result<usize> {
        let banks = self.gateway.list_banks().await?;
        let mut added = 0;
        for bank in banks {
            if bank.bank_name.is_empty() || bank.bank_code.is_empty() {
                warn!(name = %bank.bank_name, code = %bank.bank_code, "skipping incomplete bank entry");
                continue;
            }
            if self.banks.contains_code(&bank.bank_code).await? {
                continue;
            }
            self.banks.insert(bank.bank_name, bank.bank_code).await?;
            added += 1;
        }
        info!(added, "bank directory synced");
        Ok(added)
    }
}

fn validate_holder_name(holder: &str) -> Result<()> {
    if holder.len() < HOLDER_NAME_MIN {
        return Err(PaymentError::Validation(format!(
            "holder name must be at least {HOLDER_NAME_MIN} characters"
        )));
    }
    if holder.len() > HOLDER_NAME_MAX {
        return Err(PaymentError::Validation(format!(
            "holder name must be at most {HOLDER_NAME_MAX} characters"
        )));
    }
    let ok = holder
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_');
    if !ok {
        return Err(PaymentError::Validation(
            "holder name may contain only letters, numbers, spaces, hyphens, and underscores"
                .to_string(),
        ));
    }
    Ok(())
}

/// Unique provisioning reference, random component plus timestamp.
fn exchange_reference() -> String {
    let nonce: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    format!("REF-{nonce}-{}", unix_ms())
}
