use anchor_lang::prelude::*;

pub mod errors;
pub mod events;
pub mod state;

use errors::*;
use events::*;
use state::*;

declare_id!("5WXKNb3skc3cusFxcy1gjMJccmD32uhD5ezVcgK7xtgH"); // Generate with: anchor keys list

#[program]
pub mod piggy {
    use super::*;

    // ============================================================================
    // INITIALIZE
    // ============================================================================

    #[derive(Accounts)]
    pub struct Initialize<'info> {
        #[account(
            init,
            payer = admin,
            space = PiggyConfig::MAX_SIZE,
            seeds = [PiggyConfig::SEED],
            bump
        )]
        pub config: Account<'info, PiggyConfig>,

        #[account(mut)]
        pub admin: Signer<'info>,

        pub system_program: Program<'info, System>,
    }

    pub fn initialize(ctx: Context<Initialize>) -> Result<()> {
        let config = &mut ctx.accounts.config;
        config.admin = ctx.accounts.admin.key();
        config.next_piggy_id = 1;
        config.total_supply = 0;
        config.bump = ctx.bumps.config;

        Ok(())
    }

    // ============================================================================
    // CREATE PIGGY
    // ============================================================================

    #[derive(Accounts)]
    pub struct CreatePiggy<'info> {
        #[account(
            mut,
            seeds = [PiggyConfig::SEED],
            bump = config.bump,
            has_one = admin @ PiggyError::Unauthorized
        )]
        pub config: Account<'info, PiggyConfig>,

        #[account(init, payer = admin, space = Piggy::MAX_SIZE)]
        pub piggy: Account<'info, Piggy>,

        #[account(mut)]
        pub admin: Signer<'info>,

        pub system_program: Program<'info, System>,
    }

    pub fn create_piggy(
        ctx: Context<CreatePiggy>,
        name: String,
        description: String,
        creator: String,
    ) -> Result<()> {
        require!(name.len() <= Piggy::MAX_NAME_LEN, PiggyError::NameTooLong);
        require!(
            description.len() <= Piggy::MAX_DESCRIPTION_LEN,
            PiggyError::DescriptionTooLong
        );
        require!(creator.len() <= Piggy::MAX_CREATOR_LEN, PiggyError::CreatorTooLong);

        let clock = Clock::get()?;
        let config = &mut ctx.accounts.config;
        let id = config.next_piggy_id;
        config.next_piggy_id = id.checked_add(1).ok_or(PiggyError::Overflow)?;

        let piggy = &mut ctx.accounts.piggy;
        piggy.id = id;
        piggy.name = name.clone();
        piggy.description = description;
        piggy.creator = creator.clone();
        piggy.created_at = clock.unix_timestamp;

        emit!(PiggyCreated { id, creator, name });

        Ok(())
    }

    // ============================================================================
    // MINT DONATION
    // ============================================================================

    #[derive(Accounts)]
    pub struct MintDonation<'info> {
        #[account(
            mut,
            seeds = [PiggyConfig::SEED],
            bump = config.bump,
            has_one = admin @ PiggyError::Unauthorized
        )]
        pub config: Account<'info, PiggyConfig>,

        #[account(init, payer = admin, space = Donation::MAX_SIZE)]
        pub donation: Account<'info, Donation>,

        /// CHECK: any wallet may receive a donation receipt
        pub recipient: UncheckedAccount<'info>,

        #[account(mut)]
        pub admin: Signer<'info>,

        pub system_program: Program<'info, System>,
    }

    pub fn mint_donation(
        ctx: Context<MintDonation>,
        piggy_id: u64,
        comment: String,
        amount: u64,
    ) -> Result<()> {
        require!(comment.len() <= Donation::MAX_COMMENT_LEN, PiggyError::CommentTooLong);
        require!(amount > 0, PiggyError::ZeroAmount);

        let config = &mut ctx.accounts.config;
        require!(
            piggy_id >= 1 && piggy_id < config.next_piggy_id,
            PiggyError::PiggyNotFound
        );

        let id = config.total_supply.checked_add(1).ok_or(PiggyError::Overflow)?;
        config.total_supply = id;

        let clock = Clock::get()?;
        let recipient = ctx.accounts.recipient.key();
        let donation = &mut ctx.accounts.donation;
        donation.id = id;
        donation.piggy_id = piggy_id;
        donation.recipient = recipient;
        donation.comment = comment;
        donation.amount = amount;
        donation.minted_at = clock.unix_timestamp;

        emit!(DonationMinted {
            id,
            piggy_id,
            recipient,
            amount,
        });

        Ok(())
    }

    // ============================================================================
    // SETUP ACCOUNT
    // ============================================================================

    #[derive(Accounts)]
    pub struct SetupAccount<'info> {
        #[account(
            init,
            payer = owner,
            space = Holder::MAX_SIZE,
            seeds = [Holder::SEED, owner.key().as_ref()],
            bump
        )]
        pub holder: Account<'info, Holder>,

        #[account(mut)]
        pub owner: Signer<'info>,

        pub system_program: Program<'info, System>,
    }

    pub fn setup_account(ctx: Context<SetupAccount>) -> Result<()> {
        let owner = ctx.accounts.owner.key();
        let holder = &mut ctx.accounts.holder;
        holder.owner = owner;
        holder.bump = ctx.bumps.holder;

        emit!(AccountSetup { owner });

        Ok(())
    }

    // ============================================================================
    // TRANSFER ADMIN
    // ============================================================================

    #[derive(Accounts)]
    pub struct TransferAdmin<'info> {
        #[account(
            mut,
            seeds = [PiggyConfig::SEED],
            bump = config.bump,
            has_one = admin @ PiggyError::Unauthorized
        )]
        pub config: Account<'info, PiggyConfig>,

        pub admin: Signer<'info>,
    }

    pub fn transfer_admin(ctx: Context<TransferAdmin>, new_admin: Pubkey) -> Result<()> {
        let config = &mut ctx.accounts.config;
        let previous = config.admin;
        config.admin = new_admin;

        emit!(AdminTransferred {
            previous,
            new_admin,
        });

        Ok(())
    }
}
