use crate::error::{option_to_result, AppError, AppResult};
use crate::gcp::{storage::DataUrl, Uploader};
use crate::models::{NewPiggy, Piggy, PiggyUpdate, PiggyWithDonations};
use crate::repositories::{DonationRepository, PiggyRepository, UserRepository};
use crate::services::PiggyLedger;
use std::sync::Arc;
use tracing::{error, info};

/// Service for piggies (fundraising campaigns)
pub struct PiggyService {
    piggy_repo: Arc<PiggyRepository>,
    donation_repo: Arc<DonationRepository>,
    user_repo: Arc<UserRepository>,
    ledger: Arc<dyn PiggyLedger>,
    uploader: Arc<Uploader>,
}

impl PiggyService {
    pub fn new(
        piggy_repo: Arc<PiggyRepository>,
        donation_repo: Arc<DonationRepository>,
        user_repo: Arc<UserRepository>,
        ledger: Arc<dyn PiggyLedger>,
        uploader: Arc<Uploader>,
    ) -> Self {
        Self {
            piggy_repo,
            donation_repo,
            user_repo,
            ledger,
            uploader,
        }
    }

    pub async fn list(&self) -> AppResult<Vec<Piggy>> {
        Ok(self.piggy_repo.list().await?)
    }

    async fn find(&self, id: i64) -> AppResult<Piggy> {
        option_to_result(self.piggy_repo.find_by_id(id).await?, "Piggy not found")
    }

    /// Fetch a piggy together with its donations
    pub async fn get(&self, id: i64) -> AppResult<PiggyWithDonations> {
        let piggy = self.find(id).await?;
        let donations = self.donation_repo.list_by_piggy(piggy.id).await?;
        Ok(PiggyWithDonations { piggy, donations })
    }

    /// Mint the piggy on the ledger, then persist it under the minted id.
    ///
    /// When `user_address` is empty the creator's wallet is used.
    pub async fn create(&self, uid: &str, mut new_piggy: NewPiggy) -> AppResult<Piggy> {
        new_piggy.validate().map_err(AppError::Validation)?;

        if new_piggy.user_address.trim().is_empty() {
            let user =
                option_to_result(self.user_repo.find_by_id(uid).await?, "User not found")?;
            if !user.has_wallet() {
                return Err(AppError::Unprocessable(
                    "user has no wallet address, complete onboarding first".to_string(),
                ));
            }
            new_piggy.user_address = user.wallet_address;
        }

        // Images are uploaded before the mint
        if DataUrl::is_data_url(&new_piggy.image) {
            new_piggy.image = self
                .uploader
                .handle_image_upload(&new_piggy.image, None)
                .await?;
        }

        let receipt = self
            .ledger
            .create_piggy(
                &new_piggy.user_address,
                &new_piggy.name,
                &new_piggy.description,
            )
            .await?;

        let id = i64::try_from(receipt.id).map_err(|_| {
            AppError::ExternalService(format!("ledger piggy id out of range: {}", receipt.id))
        })?;

        match self.piggy_repo.first_or_create(id, &new_piggy).await {
            Ok(piggy) => {
                info!(
                    piggy_id = piggy.id,
                    signature = %receipt.signature,
                    "Piggy created: name={}",
                    piggy.name
                );
                Ok(piggy)
            }
            Err(e) => {
                error!(
                    piggy_id = id,
                    signature = %receipt.signature,
                    "piggy minted but not persisted: {}",
                    e
                );
                Err(e.into())
            }
        }
    }

    pub async fn update(&self, id: i64, mut update: PiggyUpdate) -> AppResult<Piggy> {
        let mut piggy = self.find(id).await?;
        let image = update.image.take();
        update.apply(&mut piggy).map_err(AppError::Validation)?;

        if let Some(image) = image {
            piggy.image = if DataUrl::is_data_url(&image) {
                let path = format!("piggy-{}", piggy.id);
                self.uploader
                    .handle_image_upload(&image, Some(path.as_str()))
                    .await?
            } else {
                image
            };
        }
        Ok(self.piggy_repo.update(&piggy).await?)
    }

    pub async fn delete(&self, id: i64) -> AppResult<i64> {
        if !self.piggy_repo.soft_delete(id).await? {
            return Err(AppError::NotFound("Piggy not found".to_string()));
        }
        info!("Piggy deleted: id={}", id);
        Ok(id)
    }
}
