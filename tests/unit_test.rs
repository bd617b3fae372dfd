use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use piggy_backend::config::{LedgerFile, Profile};
use piggy_backend::error::AppError;
use piggy_backend::gcp::TokenSource;
use piggy_backend::ledger::contracts::{RECIPIENT, SERVICE_ADDRESS};
use piggy_backend::ledger::events::event_discriminator;
use piggy_backend::ledger::{
    decode_program_logs, find_event, ContractEnvironment, InstructionArgs, LedgerError, Network,
    Template, PROGRAM_NAME,
};
use piggy_backend::models::*;
use piggy_backend::notifications::random_code;
use piggy_backend::services::ledger_service::amount_to_cents;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::str::FromStr;

/// Profile selects the upload folder and the ledger network
#[test]
fn test_profile_drives_network_and_folder() {
    let cases = [
        (Some("PROD"), Network::Mainnet, "users-prod/"),
        (Some("test"), Network::Testnet, "users-test/"),
        (Some("local"), Network::Emulator, "users-dev/"),
    ];
    for (scope, network, folder) in cases {
        let profile = Profile::from_scope(scope).unwrap();
        assert_eq!(profile.network(), network);
        assert_eq!(profile.upload_folder(), folder);
    }
    assert!(Profile::from_scope(None).is_err());
}

#[test]
fn test_ledger_file_overrides_program() {
    let program = Pubkey::new_unique();
    let raw = format!(
        r#"{{ "networks": {{ "testnet": "http://validator:8899" }}, "contracts": {{ "piggy": "{}" }} }}"#,
        program
    );
    let file = LedgerFile::from_json_str(&raw).unwrap();
    assert_eq!(file.rpc_url(Network::Testnet), "http://validator:8899");
    assert_eq!(
        file.rpc_url(Network::Mainnet),
        Network::Mainnet.default_rpc_url()
    );

    let env = ContractEnvironment::for_network(Network::Testnet, &file.contracts).unwrap();
    assert_eq!(env.program_id(), program);
}

/// A donation template renders with the service account, recipient and the
/// mint account bound
#[test]
fn test_render_mint_donation() {
    let env = ContractEnvironment::for_network(Network::Emulator, &HashMap::new()).unwrap();
    let service = Pubkey::new_unique();
    let recipient = Pubkey::new_unique();
    let mint = Pubkey::new_unique();

    let args = InstructionArgs::new().u64(3).u64(1250).string("hi");
    let instruction = env
        .render(
            Template::MintDonation,
            &[
                (SERVICE_ADDRESS, service),
                (RECIPIENT, recipient),
                (piggy_backend::ledger::contracts::NEW_ACCOUNT, mint),
            ],
            &args,
        )
        .unwrap();

    assert_eq!(instruction.program_id, env.program_id());
    assert!(instruction.accounts.iter().any(|a| a.pubkey == recipient));
    assert!(instruction.data.ends_with(args.as_bytes()));

    // Missing the recipient binding
    let err = env
        .render(Template::MintDonation, &[(SERVICE_ADDRESS, service)], &args)
        .unwrap_err();
    assert!(matches!(err, LedgerError::Template(_)));
}

#[test]
fn test_minted_id_from_logs() {
    let mut bytes = event_discriminator("PiggyCreated").to_vec();
    bytes.extend_from_slice(&41u64.to_le_bytes());
    let logs = vec![
        "Program log: Instruction: CreatePiggy".to_string(),
        format!("Program data: {}", STANDARD.encode(&bytes)),
    ];

    let events = decode_program_logs(PROGRAM_NAME, &logs);
    let created = find_event(&events, "PiggyCreated").unwrap();
    assert_eq!(created.event_type, "piggy.PiggyCreated");
    assert_eq!(created.u64_field(0), Some(41));
    assert!(find_event(&events, "DonationMinted").is_none());
}

#[test]
fn test_amount_to_cents() {
    assert_eq!(amount_to_cents(Decimal::new(1250, 2)), Some(1250));
    assert_eq!(amount_to_cents(Decimal::from_str("0.01").unwrap()), Some(1));
    assert_eq!(amount_to_cents(Decimal::from(20)), Some(2000));
    assert_eq!(amount_to_cents(Decimal::ZERO), None);
    assert_eq!(amount_to_cents(Decimal::from(-5)), None);
}

#[test]
fn test_donation_json_shape() {
    let donation: NewDonation =
        serde_json::from_str(r#"{"piggy_id": 4, "amount": "10.50", "broke": true}"#).unwrap();
    assert_eq!(donation.piggy_id, 4);
    assert_eq!(donation.amount, Decimal::new(1050, 2));
    assert!(donation.broke_piggy);
    assert!(donation.validate().is_ok());

    let bad = NewDonation {
        amount: Decimal::from_str("1.005").unwrap(),
        ..donation
    };
    assert!(bad.validate().is_err());
}

#[test]
fn test_piggy_dates_must_be_ordered() {
    let piggy: NewPiggy = serde_json::from_str(
        r#"{"name": "Trip", "goal": "50", "start_date": "2024-05-02T00:00:00Z", "end_date": "2024-05-01T00:00:00Z"}"#,
    )
    .unwrap();
    assert_eq!(
        piggy.validate().unwrap_err(),
        "end_date must not be before start_date"
    );
}

#[test]
fn test_random_code() {
    for _ in 0..50 {
        let code = random_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
}

#[test]
fn test_error_types() {
    let err = AppError::NotFound("User not found".to_string());
    assert!(err.is_not_found());
    assert_eq!(err.status_code(), 404);

    let err: AppError = LedgerError::Cancelled("shutdown".to_string()).into();
    assert_eq!(err.status_code(), 503);

    let err = AppError::Unprocessable("user already exist".to_string());
    assert_eq!(err.public_message(), "user already exist");
}

#[test]
fn test_static_access_token() {
    let source = TokenSource::new(reqwest::Client::new(), Some("ya29.test".to_string()));
    let token = tokio_test::block_on(source.token());
    tokio_test::assert_ok!(&token);
    assert_eq!(token.unwrap(), "ya29.test");
}
