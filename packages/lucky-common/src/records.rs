use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::{ClaimStatus, Collection, DrawStatus, SubscriptionStatus};
use crate::week::WeekId;

/// A row/document that lives in one of the shared collections, addressed by
/// its natural key.
pub trait Record {
    const COLLECTION: Collection;

    fn natural_key(&self) -> String;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct User {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    /// Code this user hands out to others.
    pub referral_code: String,
    /// Uid of the user whose code was used at registration.
    pub referred_by: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;

    fn natural_key(&self) -> String {
        self.uid.clone()
    }
}

/// One subscription per user, keyed by uid.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct Subscription {
    pub uid: String,
    pub status: SubscriptionStatus,
    /// Fee per period, whole rupees
    pub amount: u64,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active
            && self.current_period_end.map_or(true, |end| end > at)
    }
}

impl Record for Subscription {
    const COLLECTION: Collection = Collection::Subscriptions;

    fn natural_key(&self) -> String {
        self.uid.clone()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct Reward {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Whole rupees
    pub amount: u64,
    pub week: Option<WeekId>,
    #[serde(default = "default_true")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Record for Reward {
    const COLLECTION: Collection = Collection::Rewards;

    fn natural_key(&self) -> String {
        self.id.clone()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct DrawWinner {
    pub uid: String,
    pub prize_amount: u64,
    /// Mirrors the status of the winner's claim, None until one is submitted.
    pub claim_status: Option<ClaimStatus>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct Draw {
    pub week: WeekId,
    pub status: DrawStatus,
    #[serde(default)]
    pub winners: Vec<DrawWinner>,
    pub total_prize_pool: u64,
    pub total_revenue: u64,
    #[serde(default)]
    pub entrant_count: u32,
    /// Entrant uids in the order committed to by `entrants_root`
    #[serde(default)]
    pub entrants: Vec<String>,
    /// Merkle root over the sorted entrant list, hex-encoded
    pub entrants_root: Option<String>,
    /// 32 bytes of selection randomness, hex-encoded
    pub randomness: Option<String>,
    pub randomness_source: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Draw {
    pub fn pending(week: WeekId, now: DateTime<Utc>) -> Self {
        Self {
            week,
            status: DrawStatus::Pending,
            winners: vec![],
            total_prize_pool: 0,
            total_revenue: 0,
            entrant_count: 0,
            entrants: vec![],
            entrants_root: None,
            randomness: None,
            randomness_source: None,
            attempts: 0,
            failure_reason: None,
            created_at: now,
            completed_at: None,
        }
    }

    pub fn winner(&self, uid: &str) -> Option<&DrawWinner> {
        self.winners.iter().find(|w| w.uid == uid)
    }

    pub fn winner_mut(&mut self, uid: &str) -> Option<&mut DrawWinner> {
        self.winners.iter_mut().find(|w| w.uid == uid)
    }
}

impl Record for Draw {
    const COLLECTION: Collection = Collection::Draws;

    fn natural_key(&self) -> String {
        self.week.to_string()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct Claim {
    pub id: String,
    pub uid: String,
    pub week: WeekId,
    pub prize_amount: u64,
    pub status: ClaimStatus,
    /// Where the prize should be paid (UPI id, bank details, address)
    pub payout_details: String,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Claim {
    const COLLECTION: Collection = Collection::Claims;

    fn natural_key(&self) -> String {
        self.id.clone()
    }
}
