//! RPC client for submitting transactions and waiting for them to seal.

use super::contracts::{ContractEnvironment, PiggyConfigState};
use super::events::{decode_program_logs, LedgerEvent};
use super::{LedgerError, Network, PROGRAM_NAME};
use crate::config::{LedgerFile, SealConfig};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction,
    transaction::Transaction,
};
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::UiTransactionEncoding;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Compute-unit limit attached to every transaction
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 200_000;

/// Outcome of one seal check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SealStatus {
    Pending,
    Sealed,
    Failed(String),
}

/// A finalized transaction with its logs and decoded events
#[derive(Debug, Clone)]
pub struct SealedTransaction {
    pub signature: String,
    pub logs: Vec<String>,
    pub events: Vec<LedgerEvent>,
}

/// Parse a secret key given as base58 or as a JSON byte array
pub fn parse_keypair(raw: &str) -> Result<Keypair, LedgerError> {
    let raw = raw.trim();
    let bytes = if raw.starts_with('[') {
        serde_json::from_str::<Vec<u8>>(raw)
            .map_err(|e| LedgerError::InvalidKey(format!("Failed to parse keypair JSON: {}", e)))?
    } else {
        bs58::decode(raw)
            .into_vec()
            .map_err(|e| LedgerError::InvalidKey(format!("Failed to decode base58 keypair: {}", e)))?
    };
    Keypair::from_bytes(&bytes).map_err(|e| LedgerError::InvalidKey(e.to_string()))
}

/// Call `check` every `seal.poll_interval` until it reports a final status.
///
/// Gives up with `SealTimeout` once `seal.timeout` has elapsed and with
/// `Cancelled` as soon as `cancel` fires.
pub async fn poll_until_sealed<F, Fut>(
    signature: &str,
    seal: &SealConfig,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<(), LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<SealStatus, LedgerError>>,
{
    let started = Instant::now();
    let deadline = started + seal.timeout;

    loop {
        match check().await? {
            SealStatus::Sealed => return Ok(()),
            SealStatus::Failed(reason) => {
                return Err(LedgerError::TransactionFailed {
                    signature: signature.to_string(),
                    reason,
                })
            }
            SealStatus::Pending => debug!(signature, "waiting for seal"),
        }

        if Instant::now() >= deadline {
            return Err(LedgerError::SealTimeout {
                signature: signature.to_string(),
                waited_secs: started.elapsed().as_secs(),
            });
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(LedgerError::Cancelled(signature.to_string()));
            }
            _ = tokio::time::sleep(seal.poll_interval) => {}
        }
    }
}

async fn seal_status(rpc: &RpcClient, signature: &Signature) -> Result<SealStatus, LedgerError> {
    let statuses = rpc.get_signature_statuses(&[*signature]).await?;
    let status = match statuses.value.into_iter().next().flatten() {
        Some(status) => status,
        None => return Ok(SealStatus::Pending),
    };
    if let Some(err) = status.err {
        return Ok(SealStatus::Failed(err.to_string()));
    }
    if status.satisfies_commitment(CommitmentConfig::finalized()) {
        Ok(SealStatus::Sealed)
    } else {
        Ok(SealStatus::Pending)
    }
}

/// Ledger client bound to one network and its service account
pub struct LedgerClient {
    rpc: RpcClient,
    rpc_url: String,
    network: Network,
    /// Proposer and payer of every transaction
    service: Option<Arc<Keypair>>,
    contracts: ContractEnvironment,
    seal: SealConfig,
    compute_unit_limit: u32,
}

impl LedgerClient {
    /// Configure a client from the ledger file. No RPC call is made here.
    pub fn connect(
        network: Network,
        file: &LedgerFile,
        seal: SealConfig,
    ) -> Result<Self, LedgerError> {
        let rpc_url = file.rpc_url(network);
        let entry = file.account(network);

        let service = if entry.key.trim().is_empty() {
            warn!(%network, "no service account key configured, ledger writes are disabled");
            None
        } else {
            let keypair = parse_keypair(&entry.key)?;
            let address = keypair.pubkey().to_string();
            if !entry.address.trim().is_empty() && entry.address.trim() != address {
                return Err(LedgerError::InvalidKey(format!(
                    "service key belongs to {}, not {}",
                    address, entry.address
                )));
            }
            info!(%network, service_account = %address, "loaded service account");
            Some(Arc::new(keypair))
        };

        let contracts = ContractEnvironment::for_network(network, &file.contracts)?;
        let rpc = RpcClient::new_with_commitment(rpc_url.clone(), CommitmentConfig::confirmed());

        info!(
            %network,
            rpc_url = %rpc_url,
            program_id = %contracts.program_id(),
            "ledger client configured"
        );

        Ok(Self {
            rpc,
            rpc_url,
            network,
            service,
            contracts,
            seal,
            compute_unit_limit: DEFAULT_COMPUTE_UNIT_LIMIT,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn contracts(&self) -> &ContractEnvironment {
        &self.contracts
    }

    pub fn has_service_account(&self) -> bool {
        self.service.is_some()
    }

    pub fn service_account(&self) -> Result<&Keypair, LedgerError> {
        self.service
            .as_deref()
            .ok_or(LedgerError::NoServiceAccount(self.network))
    }

    pub async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, LedgerError> {
        let response = self
            .rpc
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await?;
        Ok(response.value)
    }

    pub async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        Ok(self.rpc.get_latest_blockhash().await?)
    }

    /// Unsigned transaction paid by `payer`, with the compute-unit limit prepended
    pub fn build_transaction(&self, instructions: &[Instruction], payer: &Pubkey) -> Transaction {
        let mut all = Vec::with_capacity(instructions.len() + 1);
        all.push(ComputeBudgetInstruction::set_compute_unit_limit(
            self.compute_unit_limit,
        ));
        all.extend_from_slice(instructions);
        Transaction::new_with_payer(&all, Some(payer))
    }

    /// Authorizers sign first (payload), the payer signs last (envelope)
    pub fn sign(
        &self,
        transaction: &mut Transaction,
        payer: &Keypair,
        authorizers: &[&Keypair],
        blockhash: Hash,
    ) -> Result<(), LedgerError> {
        if !authorizers.is_empty() {
            transaction
                .try_partial_sign(authorizers, blockhash)
                .map_err(|e| LedgerError::Signing(format!("payload: {}", e)))?;
        }
        transaction
            .try_sign(&[payer], blockhash)
            .map_err(|e| LedgerError::Signing(format!("envelope: {}", e)))?;
        Ok(())
    }

    pub async fn submit(&self, transaction: &Transaction) -> Result<Signature, LedgerError> {
        let signature = self.rpc.send_transaction(transaction).await?;
        info!(signature = %signature, "transaction submitted");
        Ok(signature)
    }

    /// Poll until the transaction is finalized
    pub async fn wait_for_seal(
        &self,
        signature: &Signature,
        cancel: &CancellationToken,
    ) -> Result<(), LedgerError> {
        let rpc = &self.rpc;
        poll_until_sealed(&signature.to_string(), &self.seal, cancel, || {
            seal_status(rpc, signature)
        })
        .await
    }

    /// Log messages of a finalized transaction
    pub async fn transaction_logs(&self, signature: &Signature) -> Result<Vec<String>, LedgerError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(CommitmentConfig::finalized()),
            max_supported_transaction_version: Some(0),
        };
        let transaction = self
            .rpc
            .get_transaction_with_config(signature, config)
            .await?;

        let logs = transaction
            .transaction
            .meta
            .and_then(|meta| match meta.log_messages {
                OptionSerializer::Some(logs) => Some(logs),
                _ => None,
            })
            .unwrap_or_default();
        Ok(logs)
    }

    /// Build, sign, submit and wait for a transaction, then decode its events
    pub async fn execute(
        &self,
        instructions: &[Instruction],
        authorizers: &[&Keypair],
        cancel: &CancellationToken,
    ) -> Result<SealedTransaction, LedgerError> {
        let payer = self.service_account()?;
        let blockhash = self.latest_blockhash().await?;

        let mut transaction = self.build_transaction(instructions, &payer.pubkey());
        self.sign(&mut transaction, payer, authorizers, blockhash)?;

        let signature = self.submit(&transaction).await?;
        self.wait_for_seal(&signature, cancel).await?;
        info!(signature = %signature, "transaction sealed");

        let logs = self.transaction_logs(&signature).await?;
        let events = decode_program_logs(PROGRAM_NAME, &logs);
        debug!(signature = %signature, events = events.len(), "decoded program events");

        Ok(SealedTransaction {
            signature: signature.to_string(),
            logs,
            events,
        })
    }

    /// Current program counters
    pub async fn read_config(&self) -> Result<PiggyConfigState, LedgerError> {
        let address = self.contracts.config_address();
        let account = self
            .get_account(&address)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(address.to_string()))?;
        PiggyConfigState::decode(&account.data)
    }

    /// Transfer lamports from the service account
    pub async fn fund_account(
        &self,
        to: &Pubkey,
        lamports: u64,
        cancel: &CancellationToken,
    ) -> Result<String, LedgerError> {
        let payer = self.service_account()?;
        let transfer = system_instruction::transfer(&payer.pubkey(), to, lamports);
        let sealed = self.execute(&[transfer], &[], cancel).await?;
        info!(to = %to, lamports, signature = %sealed.signature, "account funded");
        Ok(sealed.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fast_seal() -> SealConfig {
        SealConfig {
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_millis(60),
        }
    }

    #[test]
    fn test_parse_keypair_formats() {
        let keypair = Keypair::new();
        let base58 = keypair.to_base58_string();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();

        assert_eq!(parse_keypair(&base58).unwrap().pubkey(), keypair.pubkey());
        assert_eq!(parse_keypair(&json).unwrap().pubkey(), keypair.pubkey());
        assert!(parse_keypair("[1,2,3]").is_err());
        assert!(parse_keypair("0OIl").is_err());
    }

    #[tokio::test]
    async fn test_poll_returns_once_sealed() {
        let calls = AtomicUsize::new(0);
        let result = poll_until_sealed("sig", &fast_seal(), &CancellationToken::new(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, LedgerError>(if n < 2 {
                    SealStatus::Pending
                } else {
                    SealStatus::Sealed
                })
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let err = poll_until_sealed("sig", &fast_seal(), &CancellationToken::new(), || async {
            Ok::<_, LedgerError>(SealStatus::Pending)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, LedgerError::SealTimeout { ref signature, .. } if signature == "sig"));
    }

    #[tokio::test]
    async fn test_poll_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let seal = SealConfig {
            poll_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(300),
        };

        let err = poll_until_sealed("sig", &seal, &cancel, || async { Ok::<_, LedgerError>(SealStatus::Pending) })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_poll_reports_failure() {
        let err = poll_until_sealed("sig", &fast_seal(), &CancellationToken::new(), || async {
            Ok::<_, LedgerError>(SealStatus::Failed("custom program error: 0x1771".into()))
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("0x1771"));
    }

    #[test]
    fn test_connect_without_service_account() {
        let file = LedgerFile::default();
        let client = LedgerClient::connect(Network::Emulator, &file, SealConfig::default()).unwrap();
        assert!(!client.has_service_account());
        assert_eq!(client.rpc_url(), "http://127.0.0.1:8899");
        assert!(matches!(
            client.service_account(),
            Err(LedgerError::NoServiceAccount(Network::Emulator))
        ));
    }

    #[test]
    fn test_connect_rejects_mismatched_address() {
        let mut file = LedgerFile::default();
        file.accounts.testnet.key = Keypair::new().to_base58_string();
        file.accounts.testnet.address = Pubkey::new_unique().to_string();
        let err = LedgerClient::connect(Network::Testnet, &file, SealConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, LedgerError::InvalidKey(_)));
    }

    #[test]
    fn test_sign_payload_then_envelope() {
        let mut file = LedgerFile::default();
        let service = Keypair::new();
        file.accounts.emulator.key = service.to_base58_string();
        let client = LedgerClient::connect(Network::Emulator, &file, SealConfig::default()).unwrap();

        let piggy = Keypair::new();
        let ix = system_instruction::create_account(
            &service.pubkey(),
            &piggy.pubkey(),
            1,
            0,
            &client.contracts().program_id(),
        );
        let payer = client.service_account().unwrap();
        let mut tx = client.build_transaction(&[ix], &payer.pubkey());
        assert_eq!(tx.message.instructions.len(), 2);

        client
            .sign(&mut tx, payer, &[&piggy], Hash::new_unique())
            .unwrap();
        assert!(tx.is_signed());
        assert!(tx.verify().is_ok());
    }

    #[test]
    fn test_sign_without_authorizer_fails() {
        let mut file = LedgerFile::default();
        let service = Keypair::new();
        file.accounts.emulator.key = service.to_base58_string();
        let client = LedgerClient::connect(Network::Emulator, &file, SealConfig::default()).unwrap();

        let piggy = Keypair::new();
        let ix = system_instruction::create_account(
            &service.pubkey(),
            &piggy.pubkey(),
            1,
            0,
            &client.contracts().program_id(),
        );
        let payer = client.service_account().unwrap();
        let mut tx = client.build_transaction(&[ix], &payer.pubkey());
        let err = client.sign(&mut tx, payer, &[], Hash::new_unique()).unwrap_err();
        assert!(matches!(err, LedgerError::Signing(_)));
    }
}
