pub mod donation_repository;
pub mod piggy_repository;
pub mod user_repository;

// Re-export all repositories for convenient access
pub use donation_repository::DonationRepository;
pub use piggy_repository::PiggyRepository;
pub use user_repository::UserRepository;
