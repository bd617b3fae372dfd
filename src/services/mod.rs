pub mod donation_service;
pub mod ledger_service;
pub mod piggy_service;
pub mod user_service;

pub use donation_service::DonationService;
pub use ledger_service::{
    CustodialAccount, LedgerStatus, MintReceipt, PiggyLedger, SolanaPiggyLedger,
};
pub use piggy_service::PiggyService;
pub use user_service::{OnboardingRequest, UserService, VerificationSent, VerificationRequest};
