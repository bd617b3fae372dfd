//! Google Cloud glue: access tokens, Cloud Storage uploads, Cloud KMS and the
//! Datastore-backed keystore for custodial ledger accounts.
//!
//! All calls go through the public REST endpoints with `reqwest`.

pub mod datastore;
pub mod kms;
pub mod storage;
pub mod token;

pub use datastore::{Datastore, KeyEntry, KeyStore, StoredKey};
pub use kms::Kms;
pub use storage::Uploader;
pub use token::TokenSource;

use thiserror::Error;

/// Errors from Google Cloud, Firebase and the delivery providers
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Access token unavailable: {0}")]
    Token(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("{0}")]
    InvalidUpload(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Misconfigured: {0}")]
    Config(String),
}

/// Turn a non-2xx response into `CloudError::Api`, keeping the body for the log
pub(crate) async fn check_response(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, CloudError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CloudError::Api {
        service,
        status: status.as_u16(),
        body,
    })
}
