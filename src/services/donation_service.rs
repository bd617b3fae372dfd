use crate::error::{option_to_result, AppError, AppResult};
use crate::models::{Donation, DonationUpdate, DonationWithPiggy, NewDonation};
use crate::repositories::{DonationRepository, PiggyRepository, UserRepository};
use crate::services::PiggyLedger;
use std::sync::Arc;
use tracing::{error, info};

/// Service for donations to piggies
pub struct DonationService {
    donation_repo: Arc<DonationRepository>,
    piggy_repo: Arc<PiggyRepository>,
    user_repo: Arc<UserRepository>,
    ledger: Arc<dyn PiggyLedger>,
}

impl DonationService {
    pub fn new(
        donation_repo: Arc<DonationRepository>,
        piggy_repo: Arc<PiggyRepository>,
        user_repo: Arc<UserRepository>,
        ledger: Arc<dyn PiggyLedger>,
    ) -> Self {
        Self {
            donation_repo,
            piggy_repo,
            user_repo,
            ledger,
        }
    }

    /// Donations sent by `sender_id`, each with its piggy embedded
    pub async fn list_for_sender(&self, sender_id: &str) -> AppResult<Vec<DonationWithPiggy>> {
        Ok(self.donation_repo.list_by_sender(sender_id).await?)
    }

    pub async fn get(&self, id: i64) -> AppResult<Donation> {
        option_to_result(self.donation_repo.find_by_id(id).await?, "Donation not found")
    }

    /// Mint the donation to the sender's wallet and record it under the minted id
    pub async fn create(&self, sender_id: &str, new_donation: NewDonation) -> AppResult<Donation> {
        new_donation.validate().map_err(AppError::Validation)?;

        let piggy = option_to_result(
            self.piggy_repo.find_by_id(new_donation.piggy_id).await?,
            "Piggy not found",
        )?;

        let sender = option_to_result(
            self.user_repo.find_by_id(sender_id).await?,
            "User not found",
        )?;
        if !sender.has_wallet() {
            return Err(AppError::Unprocessable(
                "sender has no wallet address, complete onboarding first".to_string(),
            ));
        }

        let piggy_ledger_id = u64::try_from(piggy.id)
            .map_err(|_| AppError::Validation(format!("invalid piggy id: {}", piggy.id)))?;
        let receipt = self
            .ledger
            .mint_donation(
                &sender.wallet_address,
                &new_donation.comment,
                piggy_ledger_id,
                new_donation.amount,
            )
            .await?;

        let id = i64::try_from(receipt.id).map_err(|_| {
            AppError::ExternalService(format!("ledger donation id out of range: {}", receipt.id))
        })?;

        match self
            .donation_repo
            .first_or_create(id, &sender.id, &new_donation, &receipt.signature)
            .await
        {
            Ok(donation) => {
                info!(
                    donation_id = donation.id,
                    piggy_id = donation.piggy_id,
                    signature = %receipt.signature,
                    "Donation created: amount={}",
                    donation.amount
                );
                Ok(donation)
            }
            Err(e) => {
                error!(
                    donation_id = id,
                    piggy_id = piggy.id,
                    signature = %receipt.signature,
                    "donation minted but not persisted: {}",
                    e
                );
                Err(e.into())
            }
        }
    }

    pub async fn update(&self, id: i64, update: DonationUpdate) -> AppResult<Donation> {
        let mut donation = self.get(id).await?;
        update.apply(&mut donation);
        Ok(self.donation_repo.update(&donation).await?)
    }

    pub async fn delete(&self, id: i64) -> AppResult<i64> {
        if !self.donation_repo.soft_delete(id).await? {
            return Err(AppError::NotFound("Donation not found".to_string()));
        }
        info!("Donation deleted: id={}", id);
        Ok(id)
    }
}
