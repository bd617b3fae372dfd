use super::{AuthError, AuthMode, FirebaseClaims};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

pub const ADMIN_ROLE: &str = "admin";

/// Identity of the caller, inserted into request extensions by `require_auth`
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthContext {
    pub uid: String,
    pub email: Option<String>,
    pub user_id: Option<Value>,
    pub user_roles: Option<Value>,
    pub partner_id: Option<Value>,
    pub member_roles: Vec<String>,
}

impl AuthContext {
    /// Identity used when authentication is disabled
    pub fn dev(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            member_roles: vec![ADMIN_ROLE.to_string()],
            ..Default::default()
        }
    }

    pub fn from_claims(claims: FirebaseClaims) -> Self {
        let email = claims.email();
        let member_roles = role_names(claims.member_roles.as_ref());
        Self {
            uid: claims.sub,
            email,
            user_id: claims.user_id,
            user_roles: claims.user_roles,
            partner_id: claims.partner_id,
            member_roles,
        }
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        self.member_roles
            .iter()
            .any(|role| roles.contains(&role.as_str()))
    }
}

/// Role claims arrive as a map keyed by role, a list, or a single string
fn role_names(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(role)) => vec![role.clone()],
        _ => Vec::new(),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = raw.replacen("Bearer", "", 1).trim().to_string();
    (!token.is_empty()).then_some(token)
}

/// Authenticate the request and attach its `AuthContext`
pub async fn require_auth(
    State(mode): State<AuthMode>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let context = match &mode {
        AuthMode::Dev { user_id } => AuthContext::dev(user_id),
        AuthMode::Firebase(firebase) => {
            let bearer = bearer_token(req.headers()).ok_or(AuthError::MissingToken)?;
            let id_token = firebase.resolve_id_token(&bearer).await;
            let claims = firebase.verify_id_token(&id_token).await.map_err(|e| {
                warn!("rejected ID token: {}", e);
                e
            })?;
            AuthContext::from_claims(claims)
        }
    };

    debug!(uid = %context.uid, "authenticated request");
    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

/// Let the request through only if the caller holds one of `roles`
pub async fn allow(roles: &[&str], req: Request, next: Next) -> Result<Response, AuthError> {
    let allowed = req
        .extensions()
        .get::<AuthContext>()
        .map(|context| context.has_any_role(roles))
        .unwrap_or(false);
    if !allowed {
        return Err(AuthError::Forbidden);
    }
    Ok(next.run(req).await)
}

pub async fn require_admin(req: Request, next: Next) -> Result<Response, AuthError> {
    allow(&[ADMIN_ROLE], req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_role_names_shapes() {
        assert_eq!(role_names(Some(&json!({"admin": true}))), vec!["admin"]);
        assert_eq!(role_names(Some(&json!(["a", 1, "b"]))), vec!["a", "b"]);
        assert_eq!(role_names(Some(&json!("owner"))), vec!["owner"]);
        assert!(role_names(None).is_empty());
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_dev_context_is_admin() {
        let context = AuthContext::dev("dev-user");
        assert_eq!(context.uid, "dev-user");
        assert!(context.has_any_role(&[ADMIN_ROLE]));
        assert!(!AuthContext::default().has_any_role(&[ADMIN_ROLE]));
    }
}
