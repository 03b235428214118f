use chrono::{DateTime, Utc};
use lucky_common::{Claim, Draw, Reward, Subscription, User, WeekId};
use serde_json::Value;

use crate::error::StoreError;

/// Primary store used by the services. Both backends implement it, so the
/// API can run against either one (`USE_FIREBASE_AS_PRIMARY`).
pub trait Store: Send + Sync {
    fn get_user(&self, uid: &str) -> Result<Option<User>, StoreError>;
    fn put_user(&self, user: &User) -> Result<(), StoreError>;
    fn list_users(&self) -> Result<Vec<User>, StoreError>;

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .list_users()?
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    fn find_user_by_referral_code(&self, code: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .list_users()?
            .into_iter()
            .find(|u| u.referral_code == code))
    }

    fn get_subscription(&self, uid: &str) -> Result<Option<Subscription>, StoreError>;
    fn put_subscription(&self, subscription: &Subscription) -> Result<(), StoreError>;
    fn list_subscriptions(&self) -> Result<Vec<Subscription>, StoreError>;

    fn get_reward(&self, id: &str) -> Result<Option<Reward>, StoreError>;
    fn put_reward(&self, reward: &Reward) -> Result<(), StoreError>;
    fn list_rewards(&self) -> Result<Vec<Reward>, StoreError>;

    fn get_draw(&self, week: &WeekId) -> Result<Option<Draw>, StoreError>;
    fn put_draw(&self, draw: &Draw) -> Result<(), StoreError>;
    /// Read, modify and write one draw without letting another writer in
    /// between. Returns the stored result, or `None` when the week has no
    /// draw.
    fn update_draw(
        &self,
        week: &WeekId,
        update: &mut dyn FnMut(&mut Draw),
    ) -> Result<Option<Draw>, StoreError>;
    /// Newest week first.
    fn list_draws(&self) -> Result<Vec<Draw>, StoreError>;

    fn get_claim(&self, id: &str) -> Result<Option<Claim>, StoreError>;
    /// Insert a new claim. Fails with [`StoreError::Conflict`] when the id or
    /// the (uid, week) pair is already taken.
    fn insert_claim(&self, claim: &Claim) -> Result<(), StoreError>;
    fn put_claim(&self, claim: &Claim) -> Result<(), StoreError>;
    fn list_claims(&self) -> Result<Vec<Claim>, StoreError>;

    fn list_claims_for_user(&self, uid: &str) -> Result<Vec<Claim>, StoreError> {
        Ok(self
            .list_claims()?
            .into_iter()
            .filter(|c| c.uid == uid)
            .collect())
    }

    fn load_setting(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn save_setting(&self, key: &str, value: &Value, now: DateTime<Utc>) -> Result<(), StoreError>;
}
