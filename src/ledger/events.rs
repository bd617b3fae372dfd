//! Decoding of events emitted by the piggy program.
//!
//! Anchor's `emit!` writes `Program data: <base64>` log lines whose payload is
//! an 8-byte discriminator (SHA256("event:<Name>")) followed by the borsh
//! encoded fields.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

const PROGRAM_DATA_PREFIX: &str = "Program data: ";

/// Events the piggy program emits
pub const KNOWN_EVENTS: [&str; 4] = [
    "PiggyCreated",
    "DonationMinted",
    "AccountSetup",
    "AdminTransferred",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEvent {
    /// `<program>.<EventName>`
    pub event_type: String,
    /// Borsh payload without the discriminator
    #[serde(skip)]
    pub payload: Vec<u8>,
}

impl LedgerEvent {
    /// Reads the `index`-th leading u64 field of the payload
    pub fn u64_field(&self, index: usize) -> Option<u64> {
        let start = index.checked_mul(8)?;
        let bytes = self.payload.get(start..start + 8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(bytes);
        Some(u64::from_le_bytes(word))
    }
}

pub fn event_discriminator(name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("event:{}", name).as_bytes());
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash[..8]);
    discriminator
}

/// Decode every recognised event in a transaction's log messages
pub fn decode_program_logs(program: &str, logs: &[String]) -> Vec<LedgerEvent> {
    let known: Vec<([u8; 8], &str)> = KNOWN_EVENTS
        .iter()
        .map(|name| (event_discriminator(name), *name))
        .collect();

    logs.iter()
        .filter_map(|line| line.strip_prefix(PROGRAM_DATA_PREFIX))
        .filter_map(|encoded| match STANDARD.decode(encoded.trim()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!("skipping undecodable program data: {}", e);
                None
            }
        })
        .filter_map(|bytes| {
            if bytes.len() < 8 {
                return None;
            }
            let (head, payload) = bytes.split_at(8);
            known
                .iter()
                .find(|(discriminator, _)| discriminator[..] == *head)
                .map(|(_, name)| LedgerEvent {
                    event_type: format!("{}.{}", program, name),
                    payload: payload.to_vec(),
                })
        })
        .collect()
}

/// First event whose type contains `needle`
pub fn find_event<'a>(events: &'a [LedgerEvent], needle: &str) -> Option<&'a LedgerEvent> {
    events.iter().find(|event| event.event_type.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program_data(name: &str, payload: &[u8]) -> String {
        let mut bytes = event_discriminator(name).to_vec();
        bytes.extend_from_slice(payload);
        format!("{}{}", PROGRAM_DATA_PREFIX, STANDARD.encode(bytes))
    }

    #[test]
    fn test_decode_donation_minted() {
        let mut payload = 12u64.to_le_bytes().to_vec();
        payload.extend_from_slice(&3u64.to_le_bytes());
        let logs = vec![
            "Program 5WXKNb3skc3cusFxcy1gjMJccmD32uhD5ezVcgK7xtgH invoke [1]".to_string(),
            "Program log: Instruction: MintDonation".to_string(),
            program_data("DonationMinted", &payload),
            "Program 5WXKNb3skc3cusFxcy1gjMJccmD32uhD5ezVcgK7xtgH success".to_string(),
        ];

        let events = decode_program_logs("piggy", &logs);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "piggy.DonationMinted");
        assert_eq!(events[0].u64_field(0), Some(12));
        assert_eq!(events[0].u64_field(1), Some(3));
        assert_eq!(events[0].u64_field(2), None);
    }

    #[test]
    fn test_unknown_and_garbage_lines_are_skipped() {
        let logs = vec![
            program_data("SomethingElse", &[1, 2, 3]),
            format!("{}!!!not-base64", PROGRAM_DATA_PREFIX),
            format!("{}AAEC", PROGRAM_DATA_PREFIX),
        ];
        assert!(decode_program_logs("piggy", &logs).is_empty());
    }

    #[test]
    fn test_find_event_by_substring() {
        let logs = vec![
            program_data("AccountSetup", &[0u8; 32]),
            program_data("PiggyCreated", &5u64.to_le_bytes()),
        ];
        let events = decode_program_logs("piggy", &logs);

        let created = find_event(&events, "PiggyCreated").unwrap();
        assert_eq!(created.u64_field(0), Some(5));
        assert!(find_event(&events, "DonationMinted").is_none());
        assert_eq!(find_event(&events, "piggy.").unwrap().event_type, "piggy.AccountSetup");
    }
}
