use anchor_lang::prelude::*;

// The backend reads the first field of each event as its numeric id.

#[event]
pub struct PiggyCreated {
    pub id: u64,
    pub creator: String,
    pub name: String,
}

#[event]
pub struct DonationMinted {
    pub id: u64,
    pub piggy_id: u64,
    pub recipient: Pubkey,
    pub amount: u64,
}

#[event]
pub struct AccountSetup {
    pub owner: Pubkey,
}

#[event]
pub struct AdminTransferred {
    pub previous: Pubkey,
    pub new_admin: Pubkey,
}
