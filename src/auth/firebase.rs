//! Firebase Auth over its REST endpoints: ID token verification against
//! Google's published keys, custom token exchange and action links.

use crate::gcp::{check_response, CloudError, TokenSource};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::AuthError;

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const VERIFY_CUSTOM_TOKEN_URL: &str =
    "https://www.googleapis.com/identitytoolkit/v3/relyingparty/verifyCustomToken";
const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1/projects";

const JWKS_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FirebaseInfo {
    #[serde(default)]
    pub identities: HashMap<String, Vec<Value>>,
    #[serde(default)]
    pub sign_in_provider: Option<String>,
}

/// Claims of a verified Firebase ID token, including the custom claims
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseClaims {
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub exp: usize,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub firebase: FirebaseInfo,
    #[serde(default, rename = "userId")]
    pub user_id: Option<Value>,
    #[serde(default, rename = "userRoles")]
    pub user_roles: Option<Value>,
    #[serde(default, rename = "partnerId")]
    pub partner_id: Option<Value>,
    #[serde(default, rename = "memberRoles")]
    pub member_roles: Option<Value>,
}

impl FirebaseClaims {
    /// Email from the token, falling back to the first linked email identity
    pub fn email(&self) -> Option<String> {
        self.email.clone().or_else(|| {
            self.firebase
                .identities
                .get("email")
                .and_then(|emails| emails.first())
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
    }
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

pub struct FirebaseAuth {
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
    project_id: String,
    api_key: String,
    keys: RwLock<Option<CachedKeys>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomTokenResponse {
    id_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OobResponse {
    oob_link: String,
}

impl FirebaseAuth {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<TokenSource>,
        project_id: String,
        api_key: String,
    ) -> Self {
        Self {
            http,
            tokens,
            project_id,
            api_key,
            keys: RwLock::new(None),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);
        validation
    }

    async fn signing_keys(&self) -> Result<JwkSet, CloudError> {
        {
            let cached = self.keys.read().await;
            if let Some(cached) = cached.as_ref() {
                if cached.fetched_at.elapsed() < JWKS_TTL {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let response = self.http.get(JWKS_URL).send().await?;
        let keys: JwkSet = check_response("Firebase keys", response).await?.json().await?;
        debug!(count = keys.keys.len(), "refreshed Firebase signing keys");

        *self.keys.write().await = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }

    /// Verify an ID token's signature, audience, issuer and expiry
    pub async fn verify_id_token(&self, token: &str) -> Result<FirebaseClaims, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("ID token has no \"kid\" claim".into()))?;

        let keys = self
            .signing_keys()
            .await
            .map_err(|e| AuthError::InvalidToken(format!("cannot fetch signing keys: {}", e)))?;
        let jwk = keys.find(&kid).ok_or_else(|| {
            AuthError::InvalidToken(format!("ID token signed by unknown key {}", kid))
        })?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let data = decode::<FirebaseClaims>(token, &key, &self.validation())
            .map_err(|e| AuthError::InvalidToken(format!("ID token is invalid: {}", e)))?;

        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("ID token has an empty subject".into()));
        }
        Ok(data.claims)
    }

    /// Exchange a custom token for an ID token
    pub async fn sign_in_with_custom_token(&self, token: &str) -> Result<String, CloudError> {
        if self.api_key.is_empty() {
            return Err(CloudError::Token("FIREBASE_API_KEY is not set".into()));
        }
        let response = self
            .http
            .post(VERIFY_CUSTOM_TOKEN_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "token": token, "returnSecureToken": true }))
            .send()
            .await?;
        let body: CustomTokenResponse = check_response("Firebase", response).await?.json().await?;
        Ok(body.id_token)
    }

    /// Resolve the bearer value to an ID token. Custom tokens are exchanged,
    /// anything the exchange rejects is treated as an ID token already.
    pub async fn resolve_id_token(&self, bearer: &str) -> String {
        if self.api_key.is_empty() {
            return bearer.to_string();
        }
        match self.sign_in_with_custom_token(bearer).await {
            Ok(id_token) => id_token,
            Err(e) => {
                debug!("custom token exchange failed, using bearer as ID token: {}", e);
                bearer.to_string()
            }
        }
    }

    async fn oob_link(&self, body: Value) -> Result<String, CloudError> {
        let token = self.tokens.token().await?;
        let url = format!("{}/{}/accounts:sendOobCode", IDENTITY_TOOLKIT_URL, self.project_id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let body: OobResponse = check_response("Firebase", response).await?.json().await?;
        Ok(body.oob_link)
    }

    pub async fn password_reset_link(
        &self,
        email: &str,
        continue_url: &str,
    ) -> Result<String, CloudError> {
        self.oob_link(json!({
            "requestType": "PASSWORD_RESET",
            "email": email,
            "continueUrl": continue_url,
            "returnOobLink": true,
        }))
        .await
    }

    /// Passwordless sign-in link that lands on `continue_url`
    pub async fn email_sign_in_link(
        &self,
        email: &str,
        continue_url: &str,
    ) -> Result<String, CloudError> {
        if continue_url.is_empty() {
            warn!("email sign-in link requested without a callback URL");
        }
        self.oob_link(json!({
            "requestType": "EMAIL_SIGNIN",
            "email": email,
            "continueUrl": continue_url,
            "canHandleCodeInApp": false,
            "returnOobLink": true,
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> FirebaseAuth {
        FirebaseAuth::new(
            reqwest::Client::new(),
            Arc::new(TokenSource::new(reqwest::Client::new(), Some("t".into()))),
            "piggy-dev".into(),
            String::new(),
        )
    }

    #[test]
    fn test_claims_with_custom_fields() {
        let raw = r#"{
            "sub": "uid-1", "aud": "piggy-dev", "iss": "https://securetoken.google.com/piggy-dev",
            "exp": 1, "userId": 7, "memberRoles": {"admin": true},
            "firebase": {"identities": {"email": ["ada@example.com"]}, "sign_in_provider": "password"}
        }"#;
        let claims: FirebaseClaims = serde_json::from_str(raw).unwrap();
        assert_eq!(claims.email().as_deref(), Some("ada@example.com"));
        assert_eq!(claims.user_id, Some(serde_json::json!(7)));
        assert!(claims.partner_id.is_none());
    }

    #[test]
    fn test_validation_targets_project() {
        let validation = auth().validation();
        assert!(validation
            .iss
            .as_ref()
            .unwrap()
            .contains("https://securetoken.google.com/piggy-dev"));
        assert!(validation.aud.as_ref().unwrap().contains("piggy-dev"));
    }

    #[tokio::test]
    async fn test_malformed_token_rejected_before_key_fetch() {
        let err = auth().verify_id_token("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_resolve_without_api_key_keeps_bearer() {
        assert_eq!(auth().resolve_id_token("abc").await, "abc");
    }
}
