//! HTTP surface of the backend.

pub mod router;
pub mod handlers {
    pub mod common;
    pub mod donations;
    pub mod health;
    pub mod ledger;
    pub mod piggies;
    pub mod uploads;
    pub mod users;
}

pub use router::create_router;
