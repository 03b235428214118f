use chrono::{DateTime, Utc};
use lucky_common::{Caller, Env, Subscription, User};
use lucky_store::Store;

use crate::error::HubError;
use crate::msg::SubscriptionResponse;

pub fn get_profile(store: &dyn Store, caller: &Caller) -> Result<User, HubError> {
    store
        .get_user(&caller.uid)?
        .ok_or_else(|| HubError::UserNotFound {
            uid: caller.uid.clone(),
        })
}

/// Subscription of `uid`; only the user themselves or an admin may look.
pub fn get_subscription(
    store: &dyn Store,
    env: &Env,
    caller: &Caller,
    uid: &str,
) -> Result<SubscriptionResponse, HubError> {
    if !caller.can_access(uid) {
        return Err(HubError::Unauthorized {
            reason: "cannot view another user's subscription".to_string(),
        });
    }
    let subscription = store
        .get_subscription(uid)?
        .ok_or_else(|| HubError::SubscriptionNotFound {
            uid: uid.to_string(),
        })?;
    Ok(SubscriptionResponse::from_subscription(&subscription, env.now))
}

/// Subscriptions active at `at`, sorted by uid.
pub fn active_subscriptions(
    store: &dyn Store,
    at: DateTime<Utc>,
) -> Result<Vec<Subscription>, HubError> {
    let mut active: Vec<Subscription> = store
        .list_subscriptions()?
        .into_iter()
        .filter(|s| s.is_active_at(at))
        .collect();
    active.sort_by(|a, b| a.uid.cmp(&b.uid));
    Ok(active)
}
