use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Donation;

/// Fundraising campaign. The id is assigned by the ledger program.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Piggy {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub image: String,
    pub goal: Decimal, // NUMERIC(20, 2) in database
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Ledger address of the owning user
    pub user_address: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<NaiveDateTime>,
}

impl Piggy {
    /// Byte limits enforced by the ledger program on `create_piggy`
    pub const MAX_NAME_LEN: usize = 64;
    pub const MAX_DESCRIPTION_LEN: usize = 256;
    pub const MAX_CREATOR_LEN: usize = 64;
}

/// Piggy together with the donations it received
#[derive(Debug, Clone, Serialize)]
pub struct PiggyWithDonations {
    #[serde(flatten)]
    pub piggy: Piggy,
    pub donations: Vec<Donation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewPiggy {
    pub name: String,
    pub description: String,
    /// Public URL, or a `data:image/...;base64,` payload to upload
    pub image: String,
    pub goal: Decimal,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub user_address: String,
}

impl NewPiggy {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        check_len("name", &self.name, Piggy::MAX_NAME_LEN)?;
        check_len("description", &self.description, Piggy::MAX_DESCRIPTION_LEN)?;
        check_len("user_address", &self.user_address, Piggy::MAX_CREATOR_LEN)?;
        if self.goal < Decimal::ZERO {
            return Err("goal must not be negative".to_string());
        }
        validate_dates(self.start_date, self.end_date)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PiggyUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub goal: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub user_address: Option<String>,
}

impl PiggyUpdate {
    /// Apply the present fields and re-check the result
    pub fn apply(self, piggy: &mut Piggy) -> Result<(), String> {
        if let Some(v) = self.name {
            if v.trim().is_empty() {
                return Err("name must not be empty".to_string());
            }
            check_len("name", &v, Piggy::MAX_NAME_LEN)?;
            piggy.name = v;
        }
        if let Some(v) = self.description {
            check_len("description", &v, Piggy::MAX_DESCRIPTION_LEN)?;
            piggy.description = v;
        }
        if let Some(v) = self.image {
            piggy.image = v;
        }
        if let Some(v) = self.goal {
            if v < Decimal::ZERO {
                return Err("goal must not be negative".to_string());
            }
            piggy.goal = v;
        }
        if self.start_date.is_some() {
            piggy.start_date = self.start_date;
        }
        if self.end_date.is_some() {
            piggy.end_date = self.end_date;
        }
        if let Some(v) = self.user_address {
            check_len("user_address", &v, Piggy::MAX_CREATOR_LEN)?;
            piggy.user_address = v;
        }
        validate_dates(piggy.start_date, piggy.end_date)
    }
}

/// Length in bytes, as the program measures it
pub(crate) fn check_len(field: &str, value: &str, max: usize) -> Result<(), String> {
    if value.len() > max {
        return Err(format!("{} must be at most {} bytes", field, max));
    }
    Ok(())
}

fn validate_dates(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<(), String> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            Err("end_date must not be before start_date".to_string())
        }
        _ => Ok(()),
    }
}
