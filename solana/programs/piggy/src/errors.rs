use anchor_lang::prelude::*;

#[error_code]
pub enum PiggyError {
    #[msg("Unauthorized: Only admin can perform this action")]
    Unauthorized,

    #[msg("Piggy not found")]
    PiggyNotFound,

    #[msg("Name too long (max 64 characters)")]
    NameTooLong,

    #[msg("Description too long (max 256 characters)")]
    DescriptionTooLong,

    #[msg("Creator too long (max 64 characters)")]
    CreatorTooLong,

    #[msg("Comment too long (max 256 characters)")]
    CommentTooLong,

    #[msg("Amount must be greater than zero")]
    ZeroAmount,

    #[msg("Counter overflow")]
    Overflow,
}
