use crate::auth::AuthContext;
use crate::error::{option_to_result, AppError, AppResult};
use crate::models::{NewUser, User, UserUpdate};
use crate::notifications::{Invite, Notifier};
use crate::repositories::UserRepository;
use crate::services::PiggyLedger;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OnboardingRequest {
    /// Address of an external wallet; ignored for custodial users
    #[serde(default, alias = "flow_address")]
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerificationRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Channel a verification code went out on. The code itself stays with the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationSent {
    pub channel: &'static str,
}

/// Outcome of a signup request
#[derive(Debug)]
pub struct Signup {
    pub user: User,
    pub created: bool,
}

/// Service for user accounts and onboarding
pub struct UserService {
    user_repo: Arc<UserRepository>,
    ledger: Arc<dyn PiggyLedger>,
    notifier: Arc<Notifier>,
}

impl UserService {
    pub fn new(
        user_repo: Arc<UserRepository>,
        ledger: Arc<dyn PiggyLedger>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            user_repo,
            ledger,
            notifier,
        }
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        Ok(self.user_repo.list().await?)
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<User> {
        option_to_result(self.user_repo.find_by_email(email).await?, "Mail not found")
    }

    pub async fn get(&self, id: &str) -> AppResult<User> {
        option_to_result(self.user_repo.find_by_id(id).await?, "User not found")
    }

    /// Register the authenticated user. An enabled account cannot sign up again.
    pub async fn signup(&self, uid: &str, new_user: NewUser) -> AppResult<Signup> {
        new_user.validate().map_err(AppError::Validation)?;

        let (user, created) = self.user_repo.first_or_create(uid, &new_user).await?;
        if user.status {
            return Err(AppError::Unprocessable("user already exist".to_string()));
        }

        if created {
            info!("User signed up: id={}, email={}", user.id, user.email);
        }
        Ok(Signup { user, created })
    }

    pub async fn update(&self, id: &str, update: UserUpdate) -> AppResult<User> {
        let mut user = self.get(id).await?;
        update.apply(&mut user);
        if user.email.trim().is_empty() {
            return Err(AppError::Validation("email is required".to_string()));
        }
        Ok(self.user_repo.update(&user).await?)
    }

    pub async fn delete(&self, id: &str) -> AppResult<String> {
        if !self.user_repo.soft_delete(id).await? {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        info!("User deleted: id={}", id);
        Ok(id.to_string())
    }

    pub async fn enable(&self, id: &str) -> AppResult<String> {
        self.set_status(id, true).await
    }

    pub async fn disable(&self, id: &str) -> AppResult<String> {
        self.set_status(id, false).await
    }

    async fn set_status(&self, id: &str, enabled: bool) -> AppResult<String> {
        let mut user = self.get(id).await?;
        if enabled {
            user.enable();
        } else {
            user.disable();
        }
        self.user_repo.set_status(&user.id, user.status).await?;
        info!("User status changed: id={}, status={}", id, user.status);
        Ok(id.to_string())
    }

    /// Give the user a ledger address and enable the account.
    ///
    /// External-wallet users supply their address; everyone else gets a
    /// custodial account created on the ledger.
    pub async fn onboard(&self, id: &str, request: OnboardingRequest) -> AppResult<User> {
        let user = self.get(id).await?;

        let user = if user.external_wallet {
            let address = request
                .wallet_address
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| user.wallet_address.clone());
            let address = address.trim();
            Pubkey::from_str(address).map_err(|_| {
                AppError::Validation(format!("invalid wallet address: {}", address))
            })?;
            self.user_repo.set_wallet(&user.id, address, true).await?
        } else if user.has_wallet() {
            user
        } else {
            let account = self.ledger.create_account().await?;
            match self
                .user_repo
                .set_wallet(&user.id, &account.address, false)
                .await
            {
                Ok(updated) => updated,
                Err(e) => {
                    warn!(
                        user_id = %user.id,
                        address = %account.address,
                        signature = %account.signature,
                        "custodial account created but not recorded: {}",
                        e
                    );
                    return Err(e.into());
                }
            }
        };

        let user = self.user_repo.set_status(&user.id, true).await?;
        info!("User onboarded: id={}, wallet={}", user.id, user.wallet_address);
        Ok(user)
    }

    /// Email a sign-in link to a new member on behalf of the caller
    pub async fn invite(&self, inviter: &AuthContext, invitee: &NewUser) -> AppResult<()> {
        invitee.validate().map_err(AppError::Validation)?;

        let invited_by = match self.user_repo.find_by_id(&inviter.uid).await? {
            Some(user) if !user.full_name().is_empty() => user.full_name(),
            _ => inviter.email.clone().unwrap_or_else(|| inviter.uid.clone()),
        };

        self.notifier
            .email_signup(&Invite {
                email: invitee.email.trim(),
                first_name: &invitee.first_name,
                last_name: &invitee.last_name,
                invited_by: &invited_by,
                user_id: &inviter.uid,
            })
            .await?;
        info!("Invite sent: email={}, invited_by={}", invitee.email, inviter.uid);
        Ok(())
    }

    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        if email.trim().is_empty() {
            return Err(AppError::Validation("email is required".to_string()));
        }
        self.notifier.password_reset_email(email.trim()).await?;
        Ok(())
    }

    /// Send a verification code by email, or by SMS when only a phone is given
    pub async fn send_verification_code(
        &self,
        request: VerificationRequest,
    ) -> AppResult<VerificationSent> {
        let email = request.email.filter(|e| !e.trim().is_empty());
        let phone = request.phone.filter(|p| !p.trim().is_empty());

        let channel = match (email, phone) {
            (Some(email), _) => {
                self.notifier.send_email_code(email.trim()).await?;
                "email"
            }
            (None, Some(phone)) => {
                self.notifier.send_sms_code(phone.trim()).await?;
                "sms"
            }
            (None, None) => {
                return Err(AppError::Validation(
                    "email or phone is required".to_string(),
                ))
            }
        };
        info!("Verification code sent: channel={}", channel);
        Ok(VerificationSent { channel })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_response_carries_only_the_channel() {
        let json = serde_json::to_value(VerificationSent { channel: "sms" }).unwrap();
        assert_eq!(json, serde_json::json!({ "channel": "sms" }));
    }
}
