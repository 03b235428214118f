use chrono::{DateTime, Utc};
use lucky_common::{ClaimStatus, Draw, DrawStatus, DrawWinner, WeekId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::{DrawConfig, DrawSettings};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct DrawSettingsResponse {
    pub config: DrawConfig,
    pub settings: DrawSettings,
}

/// Either section may be omitted; a present section replaces the stored one.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct UpdateDrawSettingsRequest {
    #[serde(default)]
    pub config: Option<DrawConfig>,
    #[serde(default)]
    pub settings: Option<DrawSettings>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct RunDrawRequest {
    /// Defaults to the current ISO week
    #[serde(default)]
    pub week: Option<WeekId>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct CreateRewardRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub amount: u64,
    #[serde(default)]
    pub week: Option<WeekId>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct SubmitClaimRequest {
    pub week: WeekId,
    pub payout_details: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct UpdateClaimStatusRequest {
    pub status: ClaimStatus,
    #[serde(default)]
    pub note: Option<String>,
}

/// One row of the public draw history.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct DrawSummary {
    pub week: WeekId,
    pub status: DrawStatus,
    pub winners: Vec<DrawWinner>,
    pub total_prize_pool: u64,
    pub total_revenue: u64,
    pub entrant_count: u32,
    pub entrants_root: Option<String>,
    pub randomness: Option<String>,
    pub randomness_source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Draw> for DrawSummary {
    fn from(draw: Draw) -> Self {
        Self {
            week: draw.week,
            status: draw.status,
            winners: draw.winners,
            total_prize_pool: draw.total_prize_pool,
            total_revenue: draw.total_revenue,
            entrant_count: draw.entrant_count,
            entrants_root: draw.entrants_root,
            randomness: draw.randomness,
            randomness_source: draw.randomness_source,
            created_at: draw.created_at,
            completed_at: draw.completed_at,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct DrawHistoryResponse {
    pub draws: Vec<DrawSummary>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct WinnerEntry {
    pub week: WeekId,
    pub uid: String,
    pub display_name: Option<String>,
    pub prize_amount: u64,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct RecentWinnersResponse {
    pub winners: Vec<WinnerEntry>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct UserWin {
    pub week: WeekId,
    pub prize_amount: u64,
    pub claim_status: Option<ClaimStatus>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct UserWinsResponse {
    pub uid: String,
    pub total_wins: u32,
    pub total_won_amount: u64,
    pub wins: Vec<UserWin>,
}

/// Proof that a user was among the entrants committed to by a draw.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct InclusionResponse {
    pub week: WeekId,
    pub uid: String,
    pub included: bool,
    pub entrants_root: Option<String>,
    /// Position in the uid-sorted entrant list
    pub index: Option<u32>,
    pub proof: Vec<String>,
}
