//! Ledger (Solana) integration
//!
//! Everything that talks to the piggy program lives here: the RPC client and
//! seal polling, instruction templates with address placeholders, and
//! decoding of the events the program emits.

pub mod client;
pub mod contracts;
pub mod events;

pub use client::{parse_keypair, poll_until_sealed, LedgerClient, SealStatus, SealedTransaction};
pub use contracts::{ContractEnvironment, InstructionArgs, PiggyConfigState, Template};
pub use events::{decode_program_logs, find_event, LedgerEvent};

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Name the program's events are namespaced under (`piggy.DonationMinted`)
pub const PROGRAM_NAME: &str = "piggy";

/// Errors raised while talking to the ledger
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("No service account configured for {0}")]
    NoServiceAccount(Network),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Account {0} not found")]
    AccountNotFound(String),

    #[error("Transaction {signature} failed: {reason}")]
    TransactionFailed { signature: String, reason: String },

    #[error("Transaction {signature} not sealed after {waited_secs}s")]
    SealTimeout { signature: String, waited_secs: u64 },

    #[error("Stopped waiting for transaction {0}")]
    Cancelled(String),

    #[error("Event {event} not emitted by transaction {signature}")]
    MissingEvent { event: String, signature: String },
}

impl From<solana_client::client_error::ClientError> for LedgerError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        LedgerError::Rpc(err.to_string())
    }
}

/// Cluster the backend submits to, selected by the deployment profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Local validator (`solana-test-validator`)
    Emulator,
    /// Devnet
    Testnet,
    /// Mainnet-beta
    Mainnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Emulator => "emulator",
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        }
    }

    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Emulator => "http://127.0.0.1:8899",
            Network::Testnet => "https://api.devnet.solana.com",
            Network::Mainnet => "https://api.mainnet-beta.solana.com",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_urls() {
        assert_eq!(Network::Emulator.default_rpc_url(), "http://127.0.0.1:8899");
        assert!(Network::Testnet.default_rpc_url().contains("devnet"));
        assert_eq!(Network::Mainnet.to_string(), "mainnet");
    }

    #[test]
    fn test_error_messages() {
        let err = LedgerError::SealTimeout {
            signature: "5abc".into(),
            waited_secs: 120,
        };
        assert_eq!(err.to_string(), "Transaction 5abc not sealed after 120s");
        assert_eq!(
            LedgerError::NoServiceAccount(Network::Testnet).to_string(),
            "No service account configured for testnet"
        );
    }
}
