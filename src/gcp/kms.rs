//! Cloud KMS encrypt/decrypt with CRC32C integrity checks.

use super::{check_response, CloudError, TokenSource};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

const KMS_ENDPOINT: &str = "https://cloudkms.googleapis.com/v1";

pub fn crc32c(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

// int64 fields arrive as JSON strings
fn int64_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(i64),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Num(n)) => Ok(Some(n)),
        Some(Raw::Str(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EncryptRequest {
    plaintext: String,
    plaintext_crc32c: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncryptResponse {
    ciphertext: String,
    #[serde(default, deserialize_with = "int64_string")]
    ciphertext_crc32c: Option<i64>,
    #[serde(default)]
    verified_plaintext_crc32c: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DecryptRequest {
    ciphertext: String,
    ciphertext_crc32c: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecryptResponse {
    plaintext: String,
    #[serde(default, deserialize_with = "int64_string")]
    plaintext_crc32c: Option<i64>,
}

/// Symmetric key in Cloud KMS used to wrap custodial private keys
pub struct Kms {
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
    key_name: String,
}

impl Kms {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenSource>, key_name: String) -> Self {
        Self {
            http,
            tokens,
            key_name,
        }
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CloudError> {
        let request = EncryptRequest {
            plaintext: STANDARD.encode(plaintext),
            plaintext_crc32c: crc32c(plaintext).to_string(),
        };
        let response: EncryptResponse = self.call("encrypt", &request).await?;

        if !response.verified_plaintext_crc32c {
            return Err(CloudError::Integrity(
                "encrypt: request corrupted in-transit".into(),
            ));
        }
        let ciphertext = STANDARD
            .decode(&response.ciphertext)
            .map_err(|e| CloudError::Decode(e.to_string()))?;
        if !checksum_matches(&ciphertext, response.ciphertext_crc32c) {
            return Err(CloudError::Integrity(
                "encrypt: response corrupted in-transit".into(),
            ));
        }
        Ok(ciphertext)
    }

    pub async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CloudError> {
        let request = DecryptRequest {
            ciphertext: STANDARD.encode(ciphertext),
            ciphertext_crc32c: crc32c(ciphertext).to_string(),
        };
        let response: DecryptResponse = self.call("decrypt", &request).await?;

        let plaintext = STANDARD
            .decode(&response.plaintext)
            .map_err(|e| CloudError::Decode(e.to_string()))?;
        if !checksum_matches(&plaintext, response.plaintext_crc32c) {
            return Err(CloudError::Integrity(
                "decrypt: response corrupted in-transit".into(),
            ));
        }
        Ok(plaintext)
    }

    async fn call<Req: Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &Req,
    ) -> Result<Resp, CloudError> {
        let token = self.tokens.token().await?;
        let url = format!("{}/{}:{}", KMS_ENDPOINT, self.key_name, method);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Ok(check_response("Cloud KMS", response).await?.json().await?)
    }
}

fn checksum_matches(data: &[u8], expected: Option<i64>) -> bool {
    expected == Some(i64::from(crc32c(data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32c_known_value() {
        // Castagnoli check value
        assert_eq!(crc32c(b"123456789"), 0xE306_9283);
    }

    #[test]
    fn test_int64_accepts_string_and_number() {
        let parsed: DecryptResponse =
            serde_json::from_str(r#"{"plaintext":"aGk=","plaintextCrc32c":"42"}"#).unwrap();
        assert_eq!(parsed.plaintext_crc32c, Some(42));

        let parsed: DecryptResponse =
            serde_json::from_str(r#"{"plaintext":"aGk=","plaintextCrc32c":42}"#).unwrap();
        assert_eq!(parsed.plaintext_crc32c, Some(42));

        let parsed: DecryptResponse = serde_json::from_str(r#"{"plaintext":"aGk="}"#).unwrap();
        assert_eq!(parsed.plaintext_crc32c, None);
    }

    #[test]
    fn test_checksum_matches() {
        let data = b"secret";
        assert!(checksum_matches(data, Some(i64::from(crc32c(data)))));
        assert!(!checksum_matches(data, Some(1)));
        assert!(!checksum_matches(data, None));
    }
}
