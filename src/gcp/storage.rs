//! Uploads of base64 data URLs to Cloud Storage.

use super::{check_response, CloudError, TokenSource};
use crate::config::{Profile, StorageProperties};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const UPLOAD_ENDPOINT: &str = "https://storage.googleapis.com/upload/storage/v1/b";
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(50);

/// A decoded `data:<mime>;base64,<payload>` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    pub fn parse(raw: &str, format_hint: &str) -> Result<Self, CloudError> {
        let (header, payload) = raw
            .split_once(',')
            .ok_or_else(|| CloudError::InvalidUpload(format_hint.to_string()))?;
        let mime = header
            .strip_prefix("data:")
            .and_then(|h| h.strip_suffix(";base64"))
            .ok_or_else(|| CloudError::InvalidUpload(format_hint.to_string()))?;
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| CloudError::InvalidUpload(format!("invalid base64 payload: {}", e)))?;
        Ok(Self {
            mime: mime.to_string(),
            bytes,
        })
    }

    pub fn is_data_url(raw: &str) -> bool {
        raw.starts_with("data:")
    }
}

/// Object name: the caller's path with `/` removed, plus the suffix.
/// A random name is used when no path is given.
pub fn object_name(path: Option<&str>, suffix: &str) -> String {
    let stem = path
        .map(|p| p.replace('/', ""))
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    format!("{}{}", stem, suffix)
}

pub struct Uploader {
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
    bucket: String,
    public_url: String,
    folder: &'static str,
}

impl Uploader {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<TokenSource>,
        storage: &StorageProperties,
        profile: Profile,
    ) -> Self {
        Self {
            http,
            tokens,
            bucket: storage.bucket.clone(),
            public_url: storage.public_url.clone(),
            folder: profile.upload_folder(),
        }
    }

    /// Public URL of an uploaded object
    pub fn public_url(&self, object: &str) -> String {
        let prefix = self.public_url.trim_end_matches('/');
        format!("{}/{}/{}{}", prefix, self.bucket, self.folder, object)
    }

    /// Upload a png or jpeg data URL, returning its public URL
    pub async fn handle_image_upload(
        &self,
        data_url: &str,
        path: Option<&str>,
    ) -> Result<String, CloudError> {
        let data = DataUrl::parse(
            data_url,
            "image must be in format: data:image/png;base64,encodedimage",
        )?;
        let suffix = match data.mime.as_str() {
            "image/png" => ".png",
            "image/jpeg" => ".jpeg",
            _ => return Err(CloudError::InvalidUpload("this is not a valid image".into())),
        };
        let object = object_name(path, suffix);
        self.upload(&object, &data).await?;
        Ok(self.public_url(&object))
    }

    /// Upload a pdf data URL, returning its public URL
    pub async fn handle_file_upload(
        &self,
        data_url: &str,
        path: Option<&str>,
    ) -> Result<String, CloudError> {
        let data = DataUrl::parse(
            data_url,
            "files must be in format: data:application/pdf;base64,base64File",
        )?;
        if data.mime != "application/pdf" {
            return Err(CloudError::InvalidUpload("file must be pdf".into()));
        }
        let object = object_name(path, ".pdf");
        self.upload(&object, &data).await?;
        Ok(self.public_url(&object))
    }

    async fn upload(&self, object: &str, data: &DataUrl) -> Result<(), CloudError> {
        let token = self.tokens.token().await?;
        let name = format!("{}{}", self.folder, object);
        let url = format!("{}/{}/o", UPLOAD_ENDPOINT, self.bucket);

        let response = self
            .http
            .post(&url)
            .query(&[("uploadType", "media"), ("name", name.as_str())])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, data.mime.as_str())
            .timeout(UPLOAD_TIMEOUT)
            .body(data.bytes.clone())
            .send()
            .await?;
        check_response("Cloud Storage", response).await?;

        info!(bucket = %self.bucket, object = %name, bytes = data.bytes.len(), "uploaded object");
        Ok(())
    }
}
