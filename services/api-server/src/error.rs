use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lucky_reward_distributor::DistributorError;
use lucky_store::StoreError;
use lucky_subscription_hub::HubError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unauthenticated: {reason}")]
    Unauthenticated { reason: String },

    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("malformed request: {reason}")]
    BadRequest { reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Distributor(#[from] DistributorError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest {
            reason: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest {
            reason: rejection.body_text(),
        }
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::Conflict { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn hub_status(e: &HubError) -> StatusCode {
    match e {
        HubError::Store(e) => store_status(e),
        HubError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        HubError::UserNotFound { .. } | HubError::SubscriptionNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        HubError::InvalidInput { .. }
        | HubError::UnknownReferralCode { .. }
        | HubError::OrderMismatch { .. }
        | HubError::InvalidSignature => StatusCode::BAD_REQUEST,
        HubError::SubscriptionAlreadyActive { .. } | HubError::SubscriptionNotActive { .. } => {
            StatusCode::CONFLICT
        }
        HubError::Gateway { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn distributor_status(e: &DistributorError) -> StatusCode {
    match e {
        DistributorError::Store(e) => store_status(e),
        DistributorError::MalformedSetting(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DistributorError::Unauthorized { .. } | DistributorError::NotAWinner { .. } => {
            StatusCode::FORBIDDEN
        }
        DistributorError::PercentSumMismatch { .. }
        | DistributorError::InvalidSetting { .. }
        | DistributorError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        DistributorError::DrawNotFound { .. } | DistributorError::ClaimNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        DistributorError::DrawsDisabled
        | DistributorError::DrawAlreadyCompleted { .. }
        | DistributorError::DrawNotCompleted { .. }
        | DistributorError::NoEligibleEntrants { .. }
        | DistributorError::ClaimAlreadyExists { .. }
        | DistributorError::InvalidClaimTransition { .. } => StatusCode::CONFLICT,
        DistributorError::RandomnessUnavailable { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Hub(e) => hub_status(e),
            ApiError::Distributor(e) => distributor_status(e),
            ApiError::Store(e) => store_status(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
