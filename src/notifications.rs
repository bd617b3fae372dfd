//! Email (SendGrid dynamic templates) and SMS (Twilio) delivery.

use crate::auth::FirebaseAuth;
use crate::config::{SenderProperties, TwilioConfig};
use crate::gcp::{check_response, CloudError};
use rand::Rng;
use reqwest::Url;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const TWILIO_API_URL: &str = "https://api.twilio.com/2010-04-01/Accounts";

/// Six random digits, left-padded with zeros
pub fn random_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

pub fn verification_sms(code: &str) -> String {
    format!("Your piggy verification code from piggy is : {}", code)
}

pub struct Mailer {
    http: reqwest::Client,
    api_key: String,
    from_email: String,
    from_name: String,
}

impl Mailer {
    pub fn new(http: reqwest::Client, api_key: String, sender: &SenderProperties) -> Self {
        Self {
            http,
            api_key,
            from_email: sender.from_email.clone(),
            from_name: sender.from_name.clone(),
        }
    }

    pub fn message(&self, to_email: &str, to_name: &str, template_id: &str, data: Value) -> Value {
        json!({
            "from": { "email": self.from_email, "name": self.from_name },
            "personalizations": [{
                "to": [{ "email": to_email, "name": to_name }],
                "dynamic_template_data": data,
            }],
            "template_id": template_id,
        })
    }

    pub async fn send_template(
        &self,
        to_email: &str,
        to_name: &str,
        template_id: &str,
        data: Value,
    ) -> Result<(), CloudError> {
        if self.api_key.is_empty() {
            return Err(CloudError::Config("SENDGRID_API_KEY is not set".into()));
        }
        let response = self
            .http
            .post(SENDGRID_URL)
            .bearer_auth(&self.api_key)
            .json(&self.message(to_email, to_name, template_id, data))
            .send()
            .await?;
        check_response("SendGrid", response).await?;
        info!(template_id, to = %to_email, "email sent");
        Ok(())
    }
}

pub struct SmsSender {
    http: reqwest::Client,
    twilio: TwilioConfig,
}

impl SmsSender {
    pub fn new(http: reqwest::Client, twilio: TwilioConfig) -> Self {
        Self { http, twilio }
    }

    pub async fn send(&self, to: &str, body: &str) -> Result<(), CloudError> {
        if self.twilio.account_sid.is_empty() || self.twilio.auth_token.is_empty() {
            return Err(CloudError::Config("Twilio credentials are not set".into()));
        }
        let url = format!("{}/{}/Messages.json", TWILIO_API_URL, self.twilio.account_sid);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.twilio.account_sid, Some(&self.twilio.auth_token))
            .form(&[
                ("To", to),
                ("From", self.twilio.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await?;
        check_response("Twilio", response).await?;
        info!(to, "sms sent");
        Ok(())
    }
}

/// Invitation details carried on the sign-in callback URL
pub struct Invite<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub invited_by: &'a str,
    pub user_id: &'a str,
}

/// User-facing messages built on top of Firebase action links
pub struct Notifier {
    firebase: Arc<FirebaseAuth>,
    mailer: Mailer,
    sms: SmsSender,
    sender: SenderProperties,
}

impl Notifier {
    pub fn new(
        firebase: Arc<FirebaseAuth>,
        mailer: Mailer,
        sms: SmsSender,
        sender: SenderProperties,
    ) -> Self {
        Self {
            firebase,
            mailer,
            sms,
            sender,
        }
    }

    /// Callback landing page for an invited member
    pub fn invite_url(&self, invite: &Invite<'_>) -> Result<Url, CloudError> {
        Url::parse_with_params(
            &format!("{}member-login", self.sender.callback_url),
            &[
                ("email", invite.email),
                ("first_name", invite.first_name),
                ("last_name", invite.last_name),
                ("invited_by", invite.invited_by),
                ("user_id", invite.user_id),
            ],
        )
        .map_err(|e| CloudError::Config(format!("invalid callback URL: {}", e)))
    }

    /// Email a sign-in link to an invited member
    pub async fn email_signup(&self, invite: &Invite<'_>) -> Result<(), CloudError> {
        let callback = self.invite_url(invite)?;
        let link = self
            .firebase
            .email_sign_in_link(invite.email, callback.as_str())
            .await?;
        self.mailer
            .send_template(
                invite.email,
                invite.first_name,
                &self.sender.templates.invite,
                json!({ "inviteName": invite.invited_by, "buttonUrl": link }),
            )
            .await
    }

    pub async fn password_reset_email(&self, email: &str) -> Result<(), CloudError> {
        let continue_url = format!("{}reset-password", self.sender.callback_url);
        let link = self
            .firebase
            .password_reset_link(email, &continue_url)
            .await?;
        self.mailer
            .send_template(
                email,
                "piggy user",
                &self.sender.templates.password_reset,
                json!({ "buttonUrl": link }),
            )
            .await
    }

    /// Email a fresh verification code
    pub async fn send_email_code(&self, email: &str) -> Result<(), CloudError> {
        let code = random_code();
        self.mailer
            .send_template(
                email,
                "piggy user",
                &self.sender.templates.verification_code,
                json!({ "randomNumber": code }),
            )
            .await
    }

    /// Text a fresh verification code
    pub async fn send_sms_code(&self, number: &str) -> Result<(), CloudError> {
        let code = random_code();
        if let Err(e) = self.sms.send(number, &verification_sms(&code)).await {
            warn!(to = number, "sms delivery failed: {}", e);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SenderTemplates;
    use crate::gcp::TokenSource;

    fn sender() -> SenderProperties {
        SenderProperties {
            callback_url: "https://app.piggy.test/".into(),
            from_email: "hello@piggy.test".into(),
            from_name: "Piggy".into(),
            templates: SenderTemplates {
                invite: "d-invite".into(),
                password_reset: "d-reset".into(),
                verification_code: "d-code".into(),
            },
        }
    }

    fn notifier() -> Notifier {
        let http = reqwest::Client::new();
        let tokens = Arc::new(TokenSource::new(http.clone(), Some("t".into())));
        let firebase = Arc::new(FirebaseAuth::new(
            http.clone(),
            tokens,
            "piggy-test".into(),
            String::new(),
        ));
        Notifier::new(
            firebase,
            Mailer::new(http.clone(), String::new(), &sender()),
            SmsSender::new(http, TwilioConfig::default()),
            sender(),
        )
    }

    #[test]
    fn test_random_code_is_six_digits() {
        for _ in 0..200 {
            let code = random_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_verification_sms_body() {
        assert_eq!(
            verification_sms("004211"),
            "Your piggy verification code from piggy is : 004211"
        );
    }

    #[test]
    fn test_invite_url_escapes_query() {
        let url = notifier()
            .invite_url(&Invite {
                email: "ada+1@example.com",
                first_name: "Ada",
                last_name: "Lovelace",
                invited_by: "Charles",
                user_id: "uid-1",
            })
            .unwrap();
        assert!(url.as_str().starts_with("https://app.piggy.test/member-login?"));
        assert!(url.as_str().contains("email=ada%2B1%40example.com"));
        assert!(url.as_str().contains("invited_by=Charles"));
    }

    #[test]
    fn test_sendgrid_message_shape() {
        let mailer = Mailer::new(reqwest::Client::new(), "key".into(), &sender());
        let message = mailer.message("a@b.c", "A", "d-code", json!({ "randomNumber": "000001" }));
        assert_eq!(message["template_id"], "d-code");
        assert_eq!(message["from"]["email"], "hello@piggy.test");
        assert_eq!(message["personalizations"][0]["to"][0]["email"], "a@b.c");
        assert_eq!(
            message["personalizations"][0]["dynamic_template_data"]["randomNumber"],
            "000001"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_providers_fail_fast() {
        let n = notifier();
        assert!(matches!(
            n.send_email_code("a@b.c").await,
            Err(CloudError::Config(_))
        ));
        assert!(matches!(
            n.send_sms_code("+15550000000").await,
            Err(CloudError::Config(_))
        ));
    }
}
