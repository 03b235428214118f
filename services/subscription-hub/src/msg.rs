use chrono::{DateTime, Utc};
use lucky_common::{Subscription, SubscriptionStatus};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct RegisterUserRequest {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Referral code of the user who invited this one
    #[serde(default)]
    pub referral_code: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct CreateOrderResponse {
    pub order_id: String,
    /// Minor units (paise)
    pub amount: u64,
    pub currency: String,
    /// Public gateway key the checkout widget needs
    pub key_id: String,
}

/// Fields returned by the Razorpay checkout on success.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct SubscriptionResponse {
    pub uid: String,
    pub status: SubscriptionStatus,
    /// True when the subscription is active and its period has not lapsed
    pub active: bool,
    pub amount: u64,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl SubscriptionResponse {
    pub fn from_subscription(sub: &Subscription, now: DateTime<Utc>) -> Self {
        Self {
            uid: sub.uid.clone(),
            status: sub.status,
            active: sub.is_active_at(now),
            amount: sub.amount,
            current_period_end: sub.current_period_end,
            cancelled_at: sub.cancelled_at,
        }
    }
}
