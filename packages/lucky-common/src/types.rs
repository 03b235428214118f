use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// The lifecycle status of a weekly draw.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DrawStatus {
    Pending,
    Completed,
    Failed,
}

impl DrawStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            DrawStatus::Pending => "pending",
            DrawStatus::Completed => "completed",
            DrawStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DrawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrawStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DrawStatus::Pending),
            "completed" => Ok(DrawStatus::Completed),
            "failed" => Ok(DrawStatus::Failed),
            other => Err(ParseEnumError {
                kind: "draw status",
                value: other.to_string(),
            }),
        }
    }
}

/// Status of a winner's claim on a draw prize.
///
/// Reachable transitions: submitted → approved → fulfilled, submitted → rejected.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Submitted,
    Approved,
    Fulfilled,
    Rejected,
}

impl ClaimStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ClaimStatus::Submitted => "submitted",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Fulfilled => "fulfilled",
            ClaimStatus::Rejected => "rejected",
        }
    }

    pub fn can_transition_to(self, next: ClaimStatus) -> bool {
        matches!(
            (self, next),
            (ClaimStatus::Submitted, ClaimStatus::Approved)
                | (ClaimStatus::Approved, ClaimStatus::Fulfilled)
                | (ClaimStatus::Submitted, ClaimStatus::Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ClaimStatus::Fulfilled | ClaimStatus::Rejected)
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(ClaimStatus::Submitted),
            "approved" => Ok(ClaimStatus::Approved),
            "fulfilled" => Ok(ClaimStatus::Fulfilled),
            "rejected" => Ok(ClaimStatus::Rejected),
            other => Err(ParseEnumError {
                kind: "claim status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Order created at the gateway, payment not verified yet.
    Pending,
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "expired" => Ok(SubscriptionStatus::Expired),
            other => Err(ParseEnumError {
                kind: "subscription status",
                value: other.to_string(),
            }),
        }
    }
}

/// The collections shared by the document store and the relational store.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Subscriptions,
    Rewards,
    Draws,
    Claims,
}

impl Collection {
    /// Sync order: parents before the rows that reference them.
    pub const ALL: [Collection; 5] = [
        Collection::Users,
        Collection::Subscriptions,
        Collection::Rewards,
        Collection::Draws,
        Collection::Claims,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Subscriptions => "subscriptions",
            Collection::Rewards => "rewards",
            Collection::Draws => "draws",
            Collection::Claims => "claims",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "collection",
                value: s.to_string(),
            })
    }
}
