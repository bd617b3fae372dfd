use crate::error::RepositoryError;
use crate::models::{Donation, DonationWithPiggy, NewDonation, Piggy};
use sqlx::PgPool;
use std::collections::HashMap;

const DONATION_COLUMNS: &str = "id, piggy_id, sender_id, comment, amount, broke_piggy, \
     transaction_id, created_at, updated_at, deleted_at";

/// Repository for donation data access
pub struct DonationRepository {
    pool: PgPool,
}

impl DonationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Donations sent by one user, each with its piggy preloaded
    pub async fn list_by_sender(
        &self,
        sender_id: &str,
    ) -> Result<Vec<DonationWithPiggy>, RepositoryError> {
        let donations = sqlx::query_as::<_, Donation>(&format!(
            "SELECT {} FROM donations WHERE sender_id = $1 AND deleted_at IS NULL ORDER BY id",
            DONATION_COLUMNS
        ))
        .bind(sender_id)
        .fetch_all(&self.pool)
        .await?;

        let mut piggy_ids: Vec<i64> = donations.iter().map(|d| d.piggy_id).collect();
        piggy_ids.sort_unstable();
        piggy_ids.dedup();

        let piggies: HashMap<i64, Piggy> = sqlx::query_as::<_, Piggy>(
            r#"
            SELECT id, name, description, image, goal, start_date, end_date,
                   user_address, created_at, updated_at, deleted_at
            FROM piggies
            WHERE id = ANY($1) AND deleted_at IS NULL
            "#,
        )
        .bind(&piggy_ids)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

        Ok(donations
            .into_iter()
            .map(|donation| {
                let piggy = piggies.get(&donation.piggy_id).cloned();
                DonationWithPiggy { donation, piggy }
            })
            .collect())
    }

    pub async fn list_by_piggy(&self, piggy_id: i64) -> Result<Vec<Donation>, RepositoryError> {
        let donations = sqlx::query_as::<_, Donation>(&format!(
            "SELECT {} FROM donations WHERE piggy_id = $1 AND deleted_at IS NULL ORDER BY id",
            DONATION_COLUMNS
        ))
        .bind(piggy_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(donations)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Donation>, RepositoryError> {
        let donation = sqlx::query_as::<_, Donation>(&format!(
            "SELECT {} FROM donations WHERE id = $1 AND deleted_at IS NULL",
            DONATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(donation)
    }

    /// Persist a donation under the id the ledger assigned
    pub async fn first_or_create(
        &self,
        id: i64,
        sender_id: &str,
        new_donation: &NewDonation,
        transaction_id: &str,
    ) -> Result<Donation, RepositoryError> {
        let inserted = sqlx::query_as::<_, Donation>(&format!(
            r#"
            INSERT INTO donations (id, piggy_id, sender_id, comment, amount, broke_piggy, transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            RETURNING {}
            "#,
            DONATION_COLUMNS
        ))
        .bind(id)
        .bind(new_donation.piggy_id)
        .bind(sender_id)
        .bind(&new_donation.comment)
        .bind(new_donation.amount)
        .bind(new_donation.broke_piggy)
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(donation) => Ok(donation),
            None => sqlx::query_as::<_, Donation>(&format!(
                "SELECT {} FROM donations WHERE id = $1",
                DONATION_COLUMNS
            ))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from),
        }
    }

    pub async fn update(&self, donation: &Donation) -> Result<Donation, RepositoryError> {
        let updated = sqlx::query_as::<_, Donation>(&format!(
            r#"
            UPDATE donations
            SET comment = $2, broke_piggy = $3, transaction_id = $4,
                updated_at = (NOW() AT TIME ZONE 'utc')
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            DONATION_COLUMNS
        ))
        .bind(donation.id)
        .bind(&donation.comment)
        .bind(donation.broke_piggy)
        .bind(&donation.transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        updated
            .ok_or_else(|| RepositoryError::NotFound(format!("Donation {} not found", donation.id)))
    }

    pub async fn soft_delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE donations SET deleted_at = (NOW() AT TIME ZONE 'utc') WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
