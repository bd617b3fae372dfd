//! Domain models for the Piggy backend.
//!
//! Rows are soft-deleted: `deleted_at` is set instead of removing them.

pub mod donation;
pub mod piggy;
pub mod user;

pub use donation::{Donation, DonationUpdate, DonationWithPiggy, NewDonation};
pub use piggy::{NewPiggy, Piggy, PiggyUpdate, PiggyWithDonations};
pub use user::{NewUser, User, UserUpdate};
