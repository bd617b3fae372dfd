//! Piggy operations on the ledger.
//!
//! `PiggyLedger` is what the rest of the backend sees; `SolanaPiggyLedger`
//! renders the piggy program's templates and runs them through `LedgerClient`.

use crate::error::{AppError, AppResult};
use crate::gcp::KeyStore;
use crate::ledger::contracts::{HOLDER, NEW_ACCOUNT, OWNER, RECIPIENT, SERVICE_ADDRESS};
use crate::ledger::{find_event, parse_keypair, InstructionArgs, LedgerClient, LedgerError, SealedTransaction, Template};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Lamports sent to a new custodial account to cover its holder rent
pub const DEFAULT_FUNDING_LAMPORTS: u64 = 10_000_000;

/// Id assigned by the program and the signature of the minting transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintReceipt {
    pub id: u64,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustodialAccount {
    pub address: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerStatus {
    pub network: String,
    pub program_id: String,
    pub service_account: Option<String>,
    pub next_piggy_id: u64,
    pub total_supply: u64,
}

#[async_trait]
pub trait PiggyLedger: Send + Sync {
    /// Mint a piggy and return the id the program assigned
    async fn create_piggy(
        &self,
        creator: &str,
        name: &str,
        description: &str,
    ) -> AppResult<MintReceipt>;

    /// Mint a donation receipt to `recipient`
    async fn mint_donation(
        &self,
        recipient: &str,
        comment: &str,
        piggy_id: u64,
        amount: Decimal,
    ) -> AppResult<MintReceipt>;

    /// Create, fund and register a custodial account
    async fn create_account(&self) -> AppResult<CustodialAccount>;

    async fn status(&self) -> AppResult<LedgerStatus>;
}

/// On-chain amounts are whole cents
pub fn amount_to_cents(amount: Decimal) -> Option<u64> {
    if amount <= Decimal::ZERO {
        return None;
    }
    (amount * Decimal::ONE_HUNDRED).round_dp(0).to_u64()
}

fn minted_id(sealed: &SealedTransaction, event: &str) -> Result<u64, LedgerError> {
    find_event(&sealed.events, event)
        .and_then(|e| e.u64_field(0))
        .ok_or_else(|| LedgerError::MissingEvent {
            event: event.to_string(),
            signature: sealed.signature.clone(),
        })
}

pub struct SolanaPiggyLedger {
    client: Arc<LedgerClient>,
    keystore: Arc<dyn KeyStore>,
    shutdown: CancellationToken,
}

impl SolanaPiggyLedger {
    pub fn new(
        client: Arc<LedgerClient>,
        keystore: Arc<dyn KeyStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            client,
            keystore,
            shutdown,
        }
    }
}

#[async_trait]
impl PiggyLedger for SolanaPiggyLedger {
    async fn create_piggy(
        &self,
        creator: &str,
        name: &str,
        description: &str,
    ) -> AppResult<MintReceipt> {
        info!(
            name = %name,
            description = %description,
            creator = %creator,
            "Creating piggy on {}",
            self.client.network()
        );

        let service = self.client.service_account()?;
        let piggy_account = Keypair::new();
        let args = InstructionArgs::new()
            .string(name)
            .string(description)
            .string(creator);
        let instruction = self.client.contracts().render(
            Template::CreatePiggy,
            &[
                (SERVICE_ADDRESS, service.pubkey()),
                (NEW_ACCOUNT, piggy_account.pubkey()),
            ],
            &args,
        )?;

        let sealed = self
            .client
            .execute(&[instruction], &[&piggy_account], &self.shutdown)
            .await?;
        let id = minted_id(&sealed, "PiggyCreated")?;

        info!(piggy_id = id, signature = %sealed.signature, "Piggy minted");
        Ok(MintReceipt {
            id,
            signature: sealed.signature,
        })
    }

    async fn mint_donation(
        &self,
        recipient: &str,
        comment: &str,
        piggy_id: u64,
        amount: Decimal,
    ) -> AppResult<MintReceipt> {
        let recipient_key = Pubkey::from_str(recipient).map_err(|e| {
            AppError::Validation(format!("invalid recipient address {}: {}", recipient, e))
        })?;
        let cents = amount_to_cents(amount)
            .ok_or_else(|| AppError::Validation(format!("invalid donation amount {}", amount)))?;

        info!(piggy_id, recipient = %recipient, cents, "Minting donation");

        let service = self.client.service_account()?;
        let donation_account = Keypair::new();
        let args = InstructionArgs::new()
            .u64(piggy_id)
            .string(comment)
            .u64(cents);
        let instruction = self.client.contracts().render(
            Template::MintDonation,
            &[
                (SERVICE_ADDRESS, service.pubkey()),
                (NEW_ACCOUNT, donation_account.pubkey()),
                (RECIPIENT, recipient_key),
            ],
            &args,
        )?;

        let sealed = self
            .client
            .execute(&[instruction], &[&donation_account], &self.shutdown)
            .await?;
        let id = minted_id(&sealed, "DonationMinted")?;

        info!(donation_id = id, piggy_id, signature = %sealed.signature, "Donation minted");
        Ok(MintReceipt {
            id,
            signature: sealed.signature,
        })
    }

    async fn create_account(&self) -> AppResult<CustodialAccount> {
        // Fail before touching the chain when writes are disabled
        self.client.service_account()?;

        let owner = Keypair::new();
        let address = owner.pubkey();
        let address_str = address.to_string();

        self.keystore
            .store(&address_str, &address_str, &owner.to_base58_string())
            .await?;

        // The setup is signed with the key as read back from the store
        let stored = self.keystore.fetch(&address_str).await?;
        let owner = parse_keypair(&stored.private_key)?;
        if owner.pubkey() != address {
            return Err(LedgerError::InvalidKey(format!(
                "stored key for {} does not match",
                address_str
            ))
            .into());
        }

        self.client
            .fund_account(&address, DEFAULT_FUNDING_LAMPORTS, &self.shutdown)
            .await?;

        let holder = self.client.contracts().holder_address(&address);
        let instruction = self.client.contracts().render(
            Template::SetupAccount,
            &[(OWNER, address), (HOLDER, holder)],
            &InstructionArgs::new(),
        )?;
        let sealed = self
            .client
            .execute(&[instruction], &[&owner], &self.shutdown)
            .await?;
        require_account_setup(&sealed)?;

        info!(address = %address_str, signature = %sealed.signature, "Custodial account ready");
        Ok(CustodialAccount {
            address: address_str,
            signature: sealed.signature,
        })
    }

    async fn status(&self) -> AppResult<LedgerStatus> {
        let config = self.client.read_config().await?;
        Ok(LedgerStatus {
            network: self.client.network().to_string(),
            program_id: self.client.contracts().program_id().to_string(),
            service_account: self
                .client
                .service_account()
                .ok()
                .map(|k| k.pubkey().to_string()),
            next_piggy_id: config.next_piggy_id,
            total_supply: config.total_supply,
        })
    }
}

fn require_account_setup(sealed: &SealedTransaction) -> Result<(), LedgerError> {
    find_event(&sealed.events, "AccountSetup")
        .map(|_| ())
        .ok_or_else(|| LedgerError::MissingEvent {
            event: "AccountSetup".to_string(),
            signature: sealed.signature.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerEvent;

    fn dec(raw: &str) -> Decimal {
        Decimal::from_str(raw).unwrap()
    }

    #[test]
    fn test_amount_to_cents() {
        assert_eq!(amount_to_cents(dec("12.34")), Some(1234));
        assert_eq!(amount_to_cents(dec("5")), Some(500));
        assert_eq!(amount_to_cents(dec("0.015")), Some(2));
        assert_eq!(amount_to_cents(Decimal::ZERO), None);
        assert_eq!(amount_to_cents(dec("-1")), None);
    }

    #[test]
    fn test_minted_id_from_events() {
        let sealed = SealedTransaction {
            signature: "sig".into(),
            logs: vec![],
            events: vec![LedgerEvent {
                event_type: "piggy.PiggyCreated".into(),
                payload: 9u64.to_le_bytes().to_vec(),
            }],
        };
        assert_eq!(minted_id(&sealed, "PiggyCreated").unwrap(), 9);

        let err = minted_id(&sealed, "DonationMinted").unwrap_err();
        assert!(matches!(err, LedgerError::MissingEvent { .. }));
        assert!(require_account_setup(&sealed).is_err());
    }
}
