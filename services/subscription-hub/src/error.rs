use lucky_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("user {uid} not found")]
    UserNotFound { uid: String },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("unknown referral code {code}")]
    UnknownReferralCode { code: String },

    #[error("no subscription found for {uid}")]
    SubscriptionNotFound { uid: String },

    #[error("subscription for {uid} is already active")]
    SubscriptionAlreadyActive { uid: String },

    #[error("subscription for {uid} is not active")]
    SubscriptionNotActive { uid: String },

    #[error("order {got} does not match the pending order for this user")]
    OrderMismatch { got: String },

    #[error("payment signature verification failed")]
    InvalidSignature,

    #[error("payment gateway error: {reason}")]
    Gateway { reason: String },
}

impl From<reqwest::Error> for HubError {
    fn from(e: reqwest::Error) -> Self {
        HubError::Gateway {
            reason: e.to_string(),
        }
    }
}
