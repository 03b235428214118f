use thiserror::Error;

use crate::verify::VerifyError;

#[derive(Error, Debug)]
pub enum BeaconError {
    #[error("beacon request failed: {reason}")]
    Http { reason: String },

    #[error("beacon returned round {got}, requested {requested}")]
    RoundMismatch { requested: u64, got: u64 },

    #[error("invalid hex input: {field}")]
    InvalidHex { field: String },

    #[error("BLS verification failed for round {round}: {source}")]
    VerificationFailed { round: u64, source: VerifyError },

    #[error("time {at} is before the chain genesis")]
    BeforeGenesis { at: i64 },

    #[error("entropy source failed: {reason}")]
    Entropy { reason: String },
}

impl From<reqwest::Error> for BeaconError {
    fn from(e: reqwest::Error) -> Self {
        BeaconError::Http {
            reason: e.to_string(),
        }
    }
}
