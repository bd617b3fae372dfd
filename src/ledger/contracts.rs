//! Instruction templates for the piggy program.
//!
//! A template lists the accounts of one instruction by placeholder address.
//! `ContractEnvironment::render` swaps placeholders for the network's deployed
//! addresses plus per-call bindings, so the same template serves every cluster.

use super::{LedgerError, Network};
use sha2::{Digest, Sha256};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;
use std::collections::HashMap;
use std::str::FromStr;

/// Program id of the piggy program
pub const PIGGY_ADDRESS: &str = "0xPIGGYADDRESS";
/// Program-wide config PDA
pub const CONFIG_ADDRESS: &str = "0xCONFIGADDRESS";
pub const SYSTEM_ADDRESS: &str = "0xSYSTEMADDRESS";
/// Service account, always bound by the client
pub const SERVICE_ADDRESS: &str = "0xSERVICEADDRESS";

// Per-call bindings
pub const NEW_ACCOUNT: &str = "0xNEWACCOUNT";
pub const RECIPIENT: &str = "0xRECIPIENT";
pub const OWNER: &str = "0xOWNER";
pub const HOLDER: &str = "0xHOLDER";

const DEVNET_PROGRAM_ID: &str = "5WXKNb3skc3cusFxcy1gjMJccmD32uhD5ezVcgK7xtgH";
const MAINNET_PROGRAM_ID: &str = "GS4twXFT5kdFoqtcnTPNQKEHaPjWXLZTBgNbMaKinW4r";

const CONFIG_SEED: &[u8] = b"piggy_config";
const HOLDER_SEED: &[u8] = b"holder";

#[derive(Debug, Clone, Copy)]
pub struct AccountSlot {
    pub address: &'static str,
    pub writable: bool,
    pub signer: bool,
}

const fn slot(address: &'static str, writable: bool, signer: bool) -> AccountSlot {
    AccountSlot {
        address,
        writable,
        signer,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    CreatePiggy,
    MintDonation,
    SetupAccount,
}

impl Template {
    pub fn instruction_name(&self) -> &'static str {
        match self {
            Template::CreatePiggy => "create_piggy",
            Template::MintDonation => "mint_donation",
            Template::SetupAccount => "setup_account",
        }
    }

    /// Accounts in the order the program declares them
    pub fn accounts(&self) -> &'static [AccountSlot] {
        const CREATE_PIGGY: &[AccountSlot] = &[
            slot(CONFIG_ADDRESS, true, false),
            slot(NEW_ACCOUNT, true, true),
            slot(SERVICE_ADDRESS, true, true),
            slot(SYSTEM_ADDRESS, false, false),
        ];
        const MINT_DONATION: &[AccountSlot] = &[
            slot(CONFIG_ADDRESS, true, false),
            slot(NEW_ACCOUNT, true, true),
            slot(RECIPIENT, false, false),
            slot(SERVICE_ADDRESS, true, true),
            slot(SYSTEM_ADDRESS, false, false),
        ];
        const SETUP_ACCOUNT: &[AccountSlot] = &[
            slot(HOLDER, true, false),
            slot(OWNER, true, true),
            slot(SYSTEM_ADDRESS, false, false),
        ];

        match self {
            Template::CreatePiggy => CREATE_PIGGY,
            Template::MintDonation => MINT_DONATION,
            Template::SetupAccount => SETUP_ACCOUNT,
        }
    }
}

/// Anchor instruction discriminator: first 8 bytes of SHA256("global:<name>")
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(format!("global:{}", name).as_bytes());
    let hash = hasher.finalize();
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash[..8]);
    discriminator
}

/// Borsh-encoded instruction arguments
#[derive(Debug, Default, Clone)]
pub struct InstructionArgs(Vec<u8>);

impl InstructionArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// u32 little-endian length prefix followed by the UTF-8 bytes
    pub fn string(mut self, value: &str) -> Self {
        self.0
            .extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.0.extend_from_slice(value.as_bytes());
        self
    }

    pub fn u64(mut self, value: u64) -> Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Deployed addresses for one network
#[derive(Debug, Clone)]
pub struct ContractEnvironment {
    network: Network,
    program_id: Pubkey,
    addresses: HashMap<&'static str, Pubkey>,
}

impl ContractEnvironment {
    /// Resolve addresses for `network`. A `piggy` entry in `overrides`
    /// replaces the built-in program id.
    pub fn for_network(
        network: Network,
        overrides: &HashMap<String, String>,
    ) -> Result<Self, LedgerError> {
        let raw = overrides
            .get("piggy")
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(match network {
                Network::Mainnet => MAINNET_PROGRAM_ID,
                Network::Emulator | Network::Testnet => DEVNET_PROGRAM_ID,
            });
        let program_id = Pubkey::from_str(raw.trim())
            .map_err(|e| LedgerError::Template(format!("invalid piggy program id {}: {}", raw, e)))?;

        let (config, _) = Pubkey::find_program_address(&[CONFIG_SEED], &program_id);

        let mut addresses = HashMap::new();
        addresses.insert(PIGGY_ADDRESS, program_id);
        addresses.insert(CONFIG_ADDRESS, config);
        addresses.insert(SYSTEM_ADDRESS, system_program::id());

        Ok(Self {
            network,
            program_id,
            addresses,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    pub fn config_address(&self) -> Pubkey {
        self.addresses[CONFIG_ADDRESS]
    }

    /// Holder PDA marking `owner` as able to receive donations
    pub fn holder_address(&self, owner: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[HOLDER_SEED, owner.as_ref()], &self.program_id).0
    }

    fn resolve(
        &self,
        placeholder: &str,
        bindings: &[(&str, Pubkey)],
    ) -> Option<Pubkey> {
        bindings
            .iter()
            .find(|(name, _)| *name == placeholder)
            .map(|(_, key)| *key)
            .or_else(|| self.addresses.get(placeholder).copied())
    }

    /// Build the instruction for `template`, substituting every placeholder
    pub fn render(
        &self,
        template: Template,
        bindings: &[(&str, Pubkey)],
        args: &InstructionArgs,
    ) -> Result<Instruction, LedgerError> {
        let accounts = template
            .accounts()
            .iter()
            .map(|slot| {
                let key = self.resolve(slot.address, bindings).ok_or_else(|| {
                    LedgerError::Template(format!(
                        "unknown address placeholder {} in {}",
                        slot.address,
                        template.instruction_name()
                    ))
                })?;
                Ok(if slot.writable {
                    AccountMeta::new(key, slot.signer)
                } else {
                    AccountMeta::new_readonly(key, slot.signer)
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        let mut data = instruction_discriminator(template.instruction_name()).to_vec();
        data.extend_from_slice(args.as_bytes());

        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data,
        })
    }
}

/// Counters held in the config PDA
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PiggyConfigState {
    #[serde(serialize_with = "serialize_pubkey")]
    pub admin: Pubkey,
    pub next_piggy_id: u64,
    pub total_supply: u64,
}

fn serialize_pubkey<S: serde::Serializer>(key: &Pubkey, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&key.to_string())
}

impl PiggyConfigState {
    // 8 (discriminator) + 32 (admin) + 8 + 8 + 1 (bump)
    const LEN: usize = 57;

    pub fn decode(data: &[u8]) -> Result<Self, LedgerError> {
        if data.len() < Self::LEN {
            return Err(LedgerError::Rpc(format!(
                "config account too short: {} bytes",
                data.len()
            )));
        }
        let admin = Pubkey::try_from(&data[8..40])
            .map_err(|e| LedgerError::Rpc(format!("invalid admin key: {}", e)))?;
        let mut word = [0u8; 8];
        word.copy_from_slice(&data[40..48]);
        let next_piggy_id = u64::from_le_bytes(word);
        word.copy_from_slice(&data[48..56]);
        let total_supply = u64::from_le_bytes(word);

        Ok(Self {
            admin,
            next_piggy_id,
            total_supply,
        })
    }
}
