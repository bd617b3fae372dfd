use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::piggy::check_len;
use super::Piggy;

/// Contribution to a piggy. The id is assigned by the ledger program.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Donation {
    pub id: i64,
    pub piggy_id: i64,
    pub sender_id: String,
    pub comment: String,
    pub amount: Decimal, // NUMERIC(20, 2) in database
    #[serde(rename = "broke")]
    pub broke_piggy: bool,
    /// Ledger transaction signature of the mint
    pub transaction_id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<NaiveDateTime>,
}

impl Donation {
    /// Byte limit enforced by the ledger program on `mint_donation`
    pub const MAX_COMMENT_LEN: usize = 256;
}

/// Donation with its piggy embedded
#[derive(Debug, Clone, Serialize)]
pub struct DonationWithPiggy {
    #[serde(flatten)]
    pub donation: Donation,
    pub piggy: Option<Piggy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewDonation {
    pub piggy_id: i64,
    pub comment: String,
    pub amount: Decimal,
    #[serde(rename = "broke")]
    pub broke_piggy: bool,
}

impl NewDonation {
    pub fn validate(&self) -> Result<(), String> {
        if self.piggy_id <= 0 {
            return Err("piggy_id is required".to_string());
        }
        if self.amount <= Decimal::ZERO {
            return Err("amount must be greater than zero".to_string());
        }
        if self.amount.scale() > 2 && self.amount.round_dp(2) != self.amount {
            return Err("amount supports at most two decimal places".to_string());
        }
        check_len("comment", &self.comment, Donation::MAX_COMMENT_LEN)
    }
}

/// Only the local bookkeeping fields are editable after minting
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DonationUpdate {
    pub comment: Option<String>,
    #[serde(rename = "broke")]
    pub broke_piggy: Option<bool>,
    pub transaction_id: Option<String>,
}

impl DonationUpdate {
    pub fn apply(self, donation: &mut Donation) {
        if let Some(v) = self.comment {
            donation.comment = v;
        }
        if let Some(v) = self.broke_piggy {
            donation.broke_piggy = v;
        }
        if let Some(v) = self.transaction_id {
            donation.transaction_id = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_donation_validation() {
        let donation: NewDonation =
            serde_json::from_str(r#"{"piggy_id":3,"amount":"10.25","broke":true}"#).unwrap();
        assert!(donation.broke_piggy);
        assert!(donation.validate().is_ok());

        let zero = NewDonation {
            piggy_id: 3,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let fractional = NewDonation {
            piggy_id: 3,
            amount: Decimal::new(10001, 3),
            ..Default::default()
        };
        assert!(fractional.validate().is_err());
    }

    #[test]
    fn test_comment_length_limit() {
        let mut donation = NewDonation {
            piggy_id: 3,
            amount: Decimal::ONE,
            comment: "c".repeat(256),
            ..Default::default()
        };
        assert!(donation.validate().is_ok());

        donation.comment.push('c');
        assert_eq!(
            donation.validate().unwrap_err(),
            "comment must be at most 256 bytes"
        );
    }

    #[test]
    fn test_broke_flag_serialized_as_broke() {
        let now = chrono::Utc::now().naive_utc();
        let donation = Donation {
            id: 7,
            piggy_id: 3,
            sender_id: "uid".into(),
            comment: String::new(),
            amount: Decimal::ONE,
            broke_piggy: true,
            transaction_id: "sig".into(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let json = serde_json::to_value(DonationWithPiggy {
            donation,
            piggy: None,
        })
        .unwrap();
        assert_eq!(json["broke"], true);
        assert_eq!(json["id"], 7);
        assert!(json.get("broke_piggy").is_none());
    }
}
