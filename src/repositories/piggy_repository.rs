use crate::error::RepositoryError;
use crate::models::{NewPiggy, Piggy};
use sqlx::PgPool;

const PIGGY_COLUMNS: &str = "id, name, description, image, goal, start_date, end_date, \
     user_address, created_at, updated_at, deleted_at";

/// Repository for piggy data access
pub struct PiggyRepository {
    pool: PgPool,
}

impl PiggyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Piggy>, RepositoryError> {
        let piggies = sqlx::query_as::<_, Piggy>(&format!(
            "SELECT {} FROM piggies WHERE deleted_at IS NULL ORDER BY id",
            PIGGY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(piggies)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Piggy>, RepositoryError> {
        let piggy = sqlx::query_as::<_, Piggy>(&format!(
            "SELECT {} FROM piggies WHERE id = $1 AND deleted_at IS NULL",
            PIGGY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(piggy)
    }

    /// Persist a piggy under the id the ledger assigned.
    ///
    /// Re-running with an id that already exists returns the stored row untouched.
    pub async fn first_or_create(
        &self,
        id: i64,
        new_piggy: &NewPiggy,
    ) -> Result<Piggy, RepositoryError> {
        let inserted = sqlx::query_as::<_, Piggy>(&format!(
            r#"
            INSERT INTO piggies (id, name, description, image, goal, start_date, end_date, user_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            RETURNING {}
            "#,
            PIGGY_COLUMNS
        ))
        .bind(id)
        .bind(&new_piggy.name)
        .bind(&new_piggy.description)
        .bind(&new_piggy.image)
        .bind(new_piggy.goal)
        .bind(new_piggy.start_date)
        .bind(new_piggy.end_date)
        .bind(&new_piggy.user_address)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(piggy) => Ok(piggy),
            None => sqlx::query_as::<_, Piggy>(&format!(
                "SELECT {} FROM piggies WHERE id = $1",
                PIGGY_COLUMNS
            ))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from),
        }
    }

    pub async fn update(&self, piggy: &Piggy) -> Result<Piggy, RepositoryError> {
        let updated = sqlx::query_as::<_, Piggy>(&format!(
            r#"
            UPDATE piggies
            SET name = $2, description = $3, image = $4, goal = $5, start_date = $6,
                end_date = $7, user_address = $8, updated_at = (NOW() AT TIME ZONE 'utc')
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            PIGGY_COLUMNS
        ))
        .bind(piggy.id)
        .bind(&piggy.name)
        .bind(&piggy.description)
        .bind(&piggy.image)
        .bind(piggy.goal)
        .bind(piggy.start_date)
        .bind(piggy.end_date)
        .bind(&piggy.user_address)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| RepositoryError::NotFound(format!("Piggy {} not found", piggy.id)))
    }

    pub async fn soft_delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE piggies SET deleted_at = (NOW() AT TIME ZONE 'utc') WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
