use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User account, keyed by the Firebase Auth UID
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub street_address: String,
    /// Ledger address (custodial or external)
    pub wallet_address: String,
    pub external_wallet: bool,
    pub status: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<NaiveDateTime>,
}

impl User {
    pub fn enable(&mut self) {
        self.status = true;
    }

    pub fn disable(&mut self) {
        self.status = false;
    }

    pub fn has_wallet(&self) -> bool {
        !self.wallet_address.trim().is_empty()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Signup / invite payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub street_address: String,
    #[serde(alias = "flow_address")]
    pub wallet_address: String,
    pub external_wallet: bool,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), String> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err("email is required".to_string());
        }
        if !email.contains('@') {
            return Err(format!("invalid email: {}", email));
        }
        if self.external_wallet && self.wallet_address.trim().is_empty() {
            return Err("wallet_address is required for an external wallet".to_string());
        }
        Ok(())
    }
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub street_address: Option<String>,
    #[serde(alias = "flow_address")]
    pub wallet_address: Option<String>,
    pub external_wallet: Option<bool>,
    pub status: Option<bool>,
}

impl UserUpdate {
    pub fn apply(self, user: &mut User) {
        if let Some(v) = self.first_name {
            user.first_name = v;
        }
        if let Some(v) = self.last_name {
            user.last_name = v;
        }
        if let Some(v) = self.email {
            user.email = v;
        }
        if let Some(v) = self.street_address {
            user.street_address = v;
        }
        if let Some(v) = self.wallet_address {
            user.wallet_address = v;
        }
        if let Some(v) = self.external_wallet {
            user.external_wallet = v;
        }
        if let Some(v) = self.status {
            user.status = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        let now = chrono::Utc::now().naive_utc();
        User {
            id: "uid-1".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            street_address: String::new(),
            wallet_address: String::new(),
            external_wallet: false,
            status: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_enable_disable() {
        let mut user = sample();
        user.enable();
        assert!(user.status);
        user.disable();
        assert!(!user.status);
    }

    #[test]
    fn test_update_only_touches_present_fields() {
        let mut user = sample();
        let update: UserUpdate =
            serde_json::from_str(r#"{"last_name":"Byron","flow_address":"abc"}"#).unwrap();
        update.apply(&mut user);
        assert_eq!(user.first_name, "Ada");
        assert_eq!(user.last_name, "Byron");
        assert!(user.has_wallet());
    }

    #[test]
    fn test_new_user_validation() {
        let mut new_user = NewUser {
            email: "ada@example.com".into(),
            ..Default::default()
        };
        assert!(new_user.validate().is_ok());

        new_user.external_wallet = true;
        assert!(new_user.validate().is_err());

        new_user.email = "nope".into();
        assert!(new_user.validate().is_err());
    }

    #[test]
    fn test_deleted_at_hidden_when_absent() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("deleted_at").is_none());
        assert_eq!(json["status"], false);
    }
}
