use chrono::Duration;
use lucky_common::{Caller, Env, Subscription, SubscriptionStatus, User};
use lucky_store::Store;
use tracing::info;

use crate::error::HubError;
use crate::msg::{CreateOrderResponse, RegisterUserRequest, VerifyPaymentRequest};
use crate::payments::{OrderRequest, PaymentGateway};
use crate::state::{referral_code_for, HubConfig, CURRENCY};

const RECEIPT_UID_PREFIX: usize = 8;

fn validate_email(email: &str) -> Result<String, HubError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(HubError::InvalidInput {
            field: "email".to_string(),
            reason: "must be a valid email address".to_string(),
        });
    }
    Ok(email.to_string())
}

/// Create or refresh the caller's profile. The referral link is only set
/// the first time a user registers.
pub fn register_user(
    store: &dyn Store,
    env: &Env,
    caller: &Caller,
    request: RegisterUserRequest,
) -> Result<User, HubError> {
    let email = validate_email(&request.email)?;
    let display_name = request
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    if let Some(mut existing) = store.get_user(&caller.uid)? {
        existing.email = email;
        if display_name.is_some() {
            existing.display_name = display_name;
        }
        existing.updated_at = env.now;
        store.put_user(&existing)?;
        return Ok(existing);
    }

    let own_code = referral_code_for(&caller.uid);
    let referred_by = match request
        .referral_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        None => None,
        Some(code) if code == own_code => {
            return Err(HubError::InvalidInput {
                field: "referral_code".to_string(),
                reason: "cannot use your own referral code".to_string(),
            });
        }
        Some(code) => match store.find_user_by_referral_code(code)? {
            Some(referrer) => Some(referrer.uid),
            None => {
                return Err(HubError::UnknownReferralCode {
                    code: code.to_string(),
                })
            }
        },
    };

    let user = User {
        uid: caller.uid.clone(),
        email,
        display_name,
        referral_code: own_code,
        referred_by,
        is_admin: false,
        created_at: env.now,
        updated_at: env.now,
    };
    store.put_user(&user)?;

    info!(
        event = "lucky_user_registered",
        uid = %user.uid,
        referred_by = user.referred_by.as_deref().unwrap_or(""),
        "user registered"
    );
    Ok(user)
}

/// Ask the gateway for a payment order and park the subscription as pending.
pub async fn create_subscription_order(
    store: &dyn Store,
    gateway: &dyn PaymentGateway,
    config: &HubConfig,
    env: &Env,
    caller: &Caller,
) -> Result<CreateOrderResponse, HubError> {
    if store.get_user(&caller.uid)?.is_none() {
        return Err(HubError::UserNotFound {
            uid: caller.uid.clone(),
        });
    }

    let existing = store.get_subscription(&caller.uid)?;
    if existing.as_ref().is_some_and(|s| s.is_active_at(env.now)) {
        return Err(HubError::SubscriptionAlreadyActive {
            uid: caller.uid.clone(),
        });
    }

    let uid_prefix: String = caller.uid.chars().take(RECEIPT_UID_PREFIX).collect();
    let request = OrderRequest {
        amount: config.amount_minor(),
        currency: CURRENCY.to_string(),
        receipt: format!("sub_{}_{}", uid_prefix, env.now.timestamp()),
    };
    let order = gateway.create_order(&request).await?;

    let subscription = Subscription {
        uid: caller.uid.clone(),
        status: SubscriptionStatus::Pending,
        amount: config.subscription_amount,
        order_id: Some(order.id.clone()),
        payment_id: None,
        // Keep history of a lapsed subscription until the new one activates
        started_at: existing.as_ref().and_then(|s| s.started_at),
        current_period_end: existing.as_ref().and_then(|s| s.current_period_end),
        cancelled_at: None,
        updated_at: env.now,
    };
    store.put_subscription(&subscription)?;

    info!(
        event = "lucky_subscription_order_created",
        uid = %caller.uid,
        order_id = %order.id,
        amount = order.amount,
        "subscription order created"
    );

    Ok(CreateOrderResponse {
        order_id: order.id,
        amount: order.amount,
        currency: order.currency,
        key_id: gateway.key_id().to_string(),
    })
}

/// Verify the checkout signature and activate the subscription.
pub fn verify_subscription_payment(
    store: &dyn Store,
    gateway: &dyn PaymentGateway,
    config: &HubConfig,
    env: &Env,
    caller: &Caller,
    request: VerifyPaymentRequest,
) -> Result<Subscription, HubError> {
    let mut subscription =
        store
            .get_subscription(&caller.uid)?
            .ok_or_else(|| HubError::SubscriptionNotFound {
                uid: caller.uid.clone(),
            })?;

    let pending_order = subscription.order_id.as_deref();
    if subscription.status != SubscriptionStatus::Pending
        || pending_order != Some(request.razorpay_order_id.as_str())
    {
        return Err(HubError::OrderMismatch {
            got: request.razorpay_order_id,
        });
    }

    if !gateway.verify_payment(
        &request.razorpay_order_id,
        &request.razorpay_payment_id,
        &request.razorpay_signature,
    ) {
        return Err(HubError::InvalidSignature);
    }

    let period_end = Duration::try_days(config.period_days)
        .and_then(|period| env.now.checked_add_signed(period))
        .ok_or_else(|| HubError::InvalidInput {
            field: "period_days".to_string(),
            reason: format!("{} days is out of range", config.period_days),
        })?;
    subscription.status = SubscriptionStatus::Active;
    subscription.payment_id = Some(request.razorpay_payment_id);
    subscription.started_at = Some(env.now);
    subscription.current_period_end = Some(period_end);
    subscription.cancelled_at = None;
    subscription.updated_at = env.now;
    store.put_subscription(&subscription)?;

    info!(
        event = "lucky_subscription_activated",
        uid = %caller.uid,
        order_id = %request.razorpay_order_id,
        period_end = %period_end,
        "subscription activated"
    );
    Ok(subscription)
}

pub fn cancel_subscription(
    store: &dyn Store,
    env: &Env,
    caller: &Caller,
) -> Result<Subscription, HubError> {
    let mut subscription = store
        .get_subscription(&caller.uid)?
        .filter(|s| s.status == SubscriptionStatus::Active)
        .ok_or_else(|| HubError::SubscriptionNotActive {
            uid: caller.uid.clone(),
        })?;

    subscription.status = SubscriptionStatus::Cancelled;
    subscription.cancelled_at = Some(env.now);
    subscription.updated_at = env.now;
    store.put_subscription(&subscription)?;

    info!(
        event = "lucky_subscription_cancelled",
        uid = %caller.uid,
        "subscription cancelled"
    );
    Ok(subscription)
}

/// Mark active subscriptions whose period has ended as expired. Returns the
/// number of subscriptions changed.
pub fn expire_lapsed_subscriptions(store: &dyn Store, env: &Env) -> Result<usize, HubError> {
    let mut expired = 0;
    for mut subscription in store.list_subscriptions()? {
        let lapsed = subscription.status == SubscriptionStatus::Active
            && subscription
                .current_period_end
                .is_some_and(|end| end <= env.now);
        if !lapsed {
            continue;
        }
        subscription.status = SubscriptionStatus::Expired;
        subscription.updated_at = env.now;
        store.put_subscription(&subscription)?;
        expired += 1;
    }
    if expired > 0 {
        info!(
            event = "lucky_subscriptions_expired",
            count = expired,
            "expired lapsed subscriptions"
        );
    }
    Ok(expired)
}
