use anchor_lang::prelude::*;

/// Program-wide counters, stored at the `piggy_config` PDA.
#[account]
pub struct PiggyConfig {
    pub admin: Pubkey,       // 32 bytes
    pub next_piggy_id: u64,  // 8 bytes
    pub total_supply: u64,   // 8 bytes (donations minted so far)
    pub bump: u8,            // 1 byte
}

impl PiggyConfig {
    pub const SEED: &'static [u8] = b"piggy_config";

    pub const MAX_SIZE: usize = 8 + // discriminator
        32 + // admin
        8 + // next_piggy_id
        8 + // total_supply
        1; // bump
}

#[account]
pub struct Piggy {
    pub id: u64,             // 8 bytes
    pub name: String,        // 4 + len (max 64 chars)
    pub description: String, // 4 + len (max 256 chars)
    pub creator: String,     // 4 + len (max 64 chars)
    pub created_at: i64,     // 8 bytes
}

impl Piggy {
    pub const MAX_NAME_LEN: usize = 64;
    pub const MAX_DESCRIPTION_LEN: usize = 256;
    pub const MAX_CREATOR_LEN: usize = 64;

    pub const MAX_SIZE: usize = 8 + // discriminator
        8 + // id
        (4 + Self::MAX_NAME_LEN) +
        (4 + Self::MAX_DESCRIPTION_LEN) +
        (4 + Self::MAX_CREATOR_LEN) +
        8; // created_at
}

#[account]
pub struct Donation {
    pub id: u64,           // 8 bytes
    pub piggy_id: u64,     // 8 bytes
    pub recipient: Pubkey, // 32 bytes
    pub comment: String,   // 4 + len (max 256 chars)
    pub amount: u64,       // 8 bytes
    pub minted_at: i64,    // 8 bytes
}

impl Donation {
    pub const MAX_COMMENT_LEN: usize = 256;

    pub const MAX_SIZE: usize = 8 + // discriminator
        8 + // id
        8 + // piggy_id
        32 + // recipient
        (4 + Self::MAX_COMMENT_LEN) +
        8 + // amount
        8; // minted_at
}

/// Marks a wallet as able to hold donation receipts.
#[account]
pub struct Holder {
    pub owner: Pubkey, // 32 bytes
    pub bump: u8,      // 1 byte
}

impl Holder {
    pub const SEED: &'static [u8] = b"holder";

    pub const MAX_SIZE: usize = 8 + 32 + 1;
}
