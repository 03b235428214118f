use lucky_common::{ClaimStatus, WeekId};
use lucky_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DistributorError {
    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("stored setting is malformed: {0}")]
    MalformedSetting(#[from] serde_json::Error),

    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Percentages must sum to 100%: draw({draw}) + profit({profit}) + maintenance({maintenance}) = {total}")]
    PercentSumMismatch {
        draw: u8,
        profit: u8,
        maintenance: u8,
        total: u32,
    },

    #[error("invalid {field}: {reason}")]
    InvalidSetting { field: String, reason: String },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("scheduled draws are disabled")]
    DrawsDisabled,

    #[error("draw for week {week} is already completed")]
    DrawAlreadyCompleted { week: WeekId },

    #[error("draw for week {week} not found")]
    DrawNotFound { week: WeekId },

    #[error("draw for week {week} is not completed")]
    DrawNotCompleted { week: WeekId },

    #[error("no eligible subscribers for week {week}")]
    NoEligibleEntrants { week: WeekId },

    #[error("randomness unavailable after {attempts} attempts: {reason}")]
    RandomnessUnavailable { attempts: u32, reason: String },

    #[error("{uid} is not a winner of week {week}")]
    NotAWinner { uid: String, week: WeekId },

    #[error("a claim for {uid} in week {week} already exists")]
    ClaimAlreadyExists { uid: String, week: WeekId },

    #[error("claim {id} not found")]
    ClaimNotFound { id: String },

    #[error("claim cannot move from {from} to {to}")]
    InvalidClaimTransition { from: ClaimStatus, to: ClaimStatus },
}
