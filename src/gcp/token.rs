use super::{check_response, CloudError};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the metadata server says the token expires
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// OAuth access tokens for Google APIs.
///
/// Uses `GOOGLE_OAUTH_ACCESS_TOKEN` when set (local development), otherwise
/// the GCE/Cloud Run metadata server.
pub struct TokenSource {
    http: reqwest::Client,
    static_token: Option<String>,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(http: reqwest::Client, static_token: Option<String>) -> Self {
        Self {
            http,
            static_token: static_token.filter(|t| !t.trim().is_empty()),
            cached: Mutex::new(None),
        }
    }

    pub fn is_static(&self) -> bool {
        self.static_token.is_some()
    }

    pub async fn token(&self) -> Result<String, CloudError> {
        if let Some(token) = &self.static_token {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + EXPIRY_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| CloudError::Token(e.to_string()))?;
        let fresh: MetadataToken = check_response("metadata server", response)
            .await?
            .json()
            .await?;

        debug!(expires_in = fresh.expires_in, "refreshed Google access token");
        let value = fresh.access_token.clone();
        *cached = Some(CachedToken {
            value: fresh.access_token,
            expires_at: Instant::now() + Duration::from_secs(fresh.expires_in),
        });
        Ok(value)
    }
}
