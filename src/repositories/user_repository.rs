use crate::error::RepositoryError;
use crate::models::{NewUser, User};
use sqlx::PgPool;

const USER_COLUMNS: &str = "id, first_name, last_name, email, street_address, wallet_address, \
     external_wallet, status, created_at, updated_at, deleted_at";

/// Repository for user data access
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All users that have not been deleted
    pub async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE deleted_at IS NULL ORDER BY created_at",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Insert a new user with the given auth UID
    pub async fn create(&self, id: &str, new_user: &NewUser) -> Result<User, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, first_name, last_name, email, street_address, wallet_address, external_wallet)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.email.trim())
        .bind(&new_user.street_address)
        .bind(&new_user.wallet_address)
        .bind(new_user.external_wallet)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    /// Return the existing user for `id`, creating it when missing.
    /// The flag is `true` when the row was inserted.
    pub async fn first_or_create(
        &self,
        id: &str,
        new_user: &NewUser,
    ) -> Result<(User, bool), RepositoryError> {
        if let Some(user) = self.find_by_id(id).await? {
            return Ok((user, false));
        }
        let user = self.create(id, new_user).await?;
        Ok((user, true))
    }

    /// Persist every editable field of `user`
    pub async fn update(&self, user: &User) -> Result<User, RepositoryError> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, email = $4, street_address = $5,
                wallet_address = $6, external_wallet = $7, status = $8,
                updated_at = (NOW() AT TIME ZONE 'utc')
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.email.trim())
        .bind(&user.street_address)
        .bind(&user.wallet_address)
        .bind(user.external_wallet)
        .bind(user.status)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| RepositoryError::NotFound(format!("User {} not found", user.id)))
    }

    pub async fn set_status(&self, id: &str, status: bool) -> Result<User, RepositoryError> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET status = $2, updated_at = (NOW() AT TIME ZONE 'utc')
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| RepositoryError::NotFound(format!("User {} not found", id)))
    }

    /// Record the user's ledger address after onboarding
    pub async fn set_wallet(
        &self,
        id: &str,
        wallet_address: &str,
        external_wallet: bool,
    ) -> Result<User, RepositoryError> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET wallet_address = $2, external_wallet = $3, updated_at = (NOW() AT TIME ZONE 'utc')
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(wallet_address)
        .bind(external_wallet)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| RepositoryError::NotFound(format!("User {} not found", id)))
    }

    /// Soft delete. Returns `false` when no live row matched.
    pub async fn soft_delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = (NOW() AT TIME ZONE 'utc') WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
