//! Keystore for custodial ledger accounts.
//!
//! Each account is a Datastore entity named by its address. The private key
//! is wrapped with Cloud KMS before it leaves the process.

use super::{check_response, CloudError, Kms, TokenSource};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

const DATASTORE_ENDPOINT: &str = "https://datastore.googleapis.com/v1/projects";

/// Entity as persisted: the private key is KMS ciphertext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub address: String,
    pub public_key: String,
    pub private_key: Vec<u8>,
}

/// Entity as read back, with the private key decrypted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredKey {
    pub address: String,
    pub public_key: String,
    pub private_key: String,
}

/// Storage for custodial account keys
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Encrypt and persist a key, returning the entity name
    async fn store(
        &self,
        address: &str,
        public_key: &str,
        private_key: &str,
    ) -> Result<String, CloudError>;

    async fn fetch(&self, address: &str) -> Result<StoredKey, CloudError>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    found: Vec<EntityResult>,
}

#[derive(Debug, Deserialize)]
struct EntityResult {
    entity: Entity,
}

#[derive(Debug, Deserialize)]
struct Entity {
    #[serde(default)]
    properties: HashMap<String, PropertyValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertyValue {
    string_value: Option<String>,
    blob_value: Option<String>,
}

impl Entity {
    fn string(&self, name: &str) -> Result<String, CloudError> {
        self.properties
            .get(name)
            .and_then(|v| v.string_value.clone())
            .ok_or_else(|| CloudError::Decode(format!("missing string property {}", name)))
    }

    fn blob(&self, name: &str) -> Result<Vec<u8>, CloudError> {
        let encoded = self
            .properties
            .get(name)
            .and_then(|v| v.blob_value.as_deref())
            .ok_or_else(|| CloudError::Decode(format!("missing blob property {}", name)))?;
        STANDARD
            .decode(encoded)
            .map_err(|e| CloudError::Decode(format!("{}: {}", name, e)))
    }
}

pub struct Datastore {
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
    kms: Arc<Kms>,
    project_id: String,
    kind: String,
}

impl Datastore {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<TokenSource>,
        kms: Arc<Kms>,
        project_id: String,
        kind: String,
    ) -> Self {
        Self {
            http,
            tokens,
            kms,
            project_id,
            kind,
        }
    }

    fn key(&self, name: &str) -> serde_json::Value {
        json!({
            "partitionId": { "projectId": self.project_id },
            "path": [{ "kind": self.kind, "name": name }],
        })
    }

    /// Build an entry with the private key encrypted
    pub async fn create_entry(
        &self,
        address: &str,
        public_key: &str,
        private_key: &str,
    ) -> Result<KeyEntry, CloudError> {
        let private_key = self.kms.encrypt(private_key.as_bytes()).await?;
        Ok(KeyEntry {
            address: address.to_string(),
            public_key: public_key.to_string(),
            private_key,
        })
    }

    /// Upsert the entry, keyed by its address
    pub async fn upload_value(&self, entry: &KeyEntry) -> Result<String, CloudError> {
        let body = json!({
            "mode": "NON_TRANSACTIONAL",
            "mutations": [{
                "upsert": {
                    "key": self.key(&entry.address),
                    "properties": {
                        "Address": { "stringValue": entry.address },
                        "PublicKey": { "stringValue": entry.public_key },
                        "PrivateKey": {
                            "blobValue": STANDARD.encode(&entry.private_key),
                            "excludeFromIndexes": true,
                        },
                    },
                },
            }],
        });

        self.post("commit", &body).await?;
        info!(kind = %self.kind, address = %entry.address, "stored custodial key");
        Ok(entry.address.clone())
    }

    /// Read the entity for `address` and decrypt its private key
    pub async fn get_value(&self, address: &str) -> Result<StoredKey, CloudError> {
        let body = json!({ "keys": [self.key(address)] });
        let response: LookupResponse = self.post("lookup", &body).await?.json().await?;

        let entity = response
            .found
            .into_iter()
            .next()
            .map(|found| found.entity)
            .ok_or_else(|| CloudError::NotFound(format!("{} {}", self.kind, address)))?;

        let ciphertext = entity.blob("PrivateKey")?;
        let plaintext = self.kms.decrypt(&ciphertext).await?;
        let private_key = String::from_utf8(plaintext)
            .map_err(|e| CloudError::Decode(format!("private key is not UTF-8: {}", e)))?;

        Ok(StoredKey {
            address: entity.string("Address")?,
            public_key: entity.string("PublicKey")?,
            private_key,
        })
    }

    async fn post(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, CloudError> {
        let token = self.tokens.token().await?;
        let url = format!("{}/{}:{}", DATASTORE_ENDPOINT, self.project_id, method);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        check_response("Datastore", response).await
    }
}

#[async_trait]
impl KeyStore for Datastore {
    async fn store(
        &self,
        address: &str,
        public_key: &str,
        private_key: &str,
    ) -> Result<String, CloudError> {
        let entry = self.create_entry(address, public_key, private_key).await?;
        self.upload_value(&entry).await
    }

    async fn fetch(&self, address: &str) -> Result<StoredKey, CloudError> {
        self.get_value(address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_response_decoding() {
        let raw = r#"{
            "found": [{
                "entity": {
                    "key": {"path": [{"kind": "Account", "name": "abc"}]},
                    "properties": {
                        "Address": {"stringValue": "abc"},
                        "PublicKey": {"stringValue": "abc"},
                        "PrivateKey": {"blobValue": "c2VjcmV0", "excludeFromIndexes": true}
                    }
                },
                "version": "1"
            }]
        }"#;
        let response: LookupResponse = serde_json::from_str(raw).unwrap();
        let entity = &response.found[0].entity;
        assert_eq!(entity.string("Address").unwrap(), "abc");
        assert_eq!(entity.blob("PrivateKey").unwrap(), b"secret");
        assert!(entity.string("Missing").is_err());
    }

    #[test]
    fn test_missing_lookup_is_empty() {
        let response: LookupResponse =
            serde_json::from_str(r#"{"missing": [{"entity": {"key": {}}}]}"#).unwrap();
        assert!(response.found.is_empty());
    }

    #[test]
    fn test_entity_key_shape() {
        let tokens = Arc::new(TokenSource::new(reqwest::Client::new(), Some("t".into())));
        let kms = Arc::new(Kms::new(reqwest::Client::new(), tokens.clone(), "k".into()));
        let store = Datastore::new(
            reqwest::Client::new(),
            tokens,
            kms,
            "piggy-project".into(),
            "Account".into(),
        );
        let key = store.key("addr");
        assert_eq!(key["partitionId"]["projectId"], "piggy-project");
        assert_eq!(key["path"][0]["kind"], "Account");
        assert_eq!(key["path"][0]["name"], "addr");
    }
}
