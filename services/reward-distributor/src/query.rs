use std::collections::HashMap;

use lucky_common::merkle::{compute_leaf_hash, verify_merkle_proof};
use lucky_common::{Caller, Claim, DrawStatus, Reward, WeekId};
use lucky_store::Store;

use crate::error::DistributorError;
use crate::msg::{
    DrawHistoryResponse, DrawSettingsResponse, DrawSummary, InclusionResponse,
    RecentWinnersResponse, UserWin, UserWinsResponse, WinnerEntry,
};
use crate::selection::entrant_proof;
use crate::state::{DRAW_CONFIG, DRAW_SETTINGS};

pub const DEFAULT_HISTORY_LIMIT: u32 = 10;
pub const MAX_HISTORY_LIMIT: u32 = 100;

fn clamp_limit(limit: Option<u32>) -> usize {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT) as usize
}

pub fn get_draw_settings(
    store: &dyn Store,
    caller: &Caller,
) -> Result<DrawSettingsResponse, DistributorError> {
    if !caller.is_admin {
        return Err(DistributorError::Unauthorized {
            reason: "only admins can view draw settings".to_string(),
        });
    }
    Ok(DrawSettingsResponse {
        config: DRAW_CONFIG.load(store)?,
        settings: DRAW_SETTINGS.load(store)?,
    })
}

/// Most recent draws, newest first.
pub fn draw_history(
    store: &dyn Store,
    limit: Option<u32>,
) -> Result<DrawHistoryResponse, DistributorError> {
    let draws = store
        .list_draws()?
        .into_iter()
        .take(clamp_limit(limit))
        .map(DrawSummary::from)
        .collect();
    Ok(DrawHistoryResponse { draws })
}

/// Winners of the most recent completed draws.
pub fn recent_winners(
    store: &dyn Store,
    limit: Option<u32>,
) -> Result<RecentWinnersResponse, DistributorError> {
    let draws: Vec<_> = store
        .list_draws()?
        .into_iter()
        .filter(|d| d.status == DrawStatus::Completed)
        .take(clamp_limit(limit))
        .collect();

    let names: HashMap<String, Option<String>> = store
        .list_users()?
        .into_iter()
        .map(|u| (u.uid, u.display_name))
        .collect();

    let winners = draws
        .into_iter()
        .flat_map(|draw| {
            let week = draw.week;
            let completed_at = draw.completed_at;
            draw.winners.into_iter().map(move |w| (week, completed_at, w))
        })
        .map(|(week, completed_at, w)| WinnerEntry {
            week,
            display_name: names.get(&w.uid).cloned().flatten(),
            uid: w.uid,
            prize_amount: w.prize_amount,
            completed_at,
        })
        .collect();
    Ok(RecentWinnersResponse { winners })
}

pub fn user_wins(
    store: &dyn Store,
    caller: &Caller,
    uid: &str,
) -> Result<UserWinsResponse, DistributorError> {
    if !caller.can_access(uid) {
        return Err(DistributorError::Unauthorized {
            reason: "cannot view another user's wins".to_string(),
        });
    }

    let wins: Vec<UserWin> = store
        .list_draws()?
        .into_iter()
        .filter(|d| d.status == DrawStatus::Completed)
        .filter_map(|d| {
            d.winner(uid).map(|w| UserWin {
                week: d.week,
                prize_amount: w.prize_amount,
                claim_status: w.claim_status,
            })
        })
        .collect();

    Ok(UserWinsResponse {
        uid: uid.to_string(),
        total_wins: wins.len() as u32,
        total_won_amount: wins.iter().map(|w| w.prize_amount).sum(),
        wins,
    })
}

/// Check that `uid` was an entrant of the week's draw, returning the Merkle
/// path so the caller can check it against the published root.
pub fn verify_inclusion(
    store: &dyn Store,
    week: WeekId,
    uid: &str,
) -> Result<InclusionResponse, DistributorError> {
    let draw = store
        .get_draw(&week)?
        .ok_or(DistributorError::DrawNotFound { week })?;

    let (included, index, proof) = match (&draw.entrants_root, entrant_proof(&draw.entrants, uid))
    {
        (Some(root), Some((index, proof))) => {
            let leaf = compute_leaf_hash(uid, index);
            (verify_merkle_proof(root, &proof, &leaf), Some(index), proof)
        }
        _ => (false, None, vec![]),
    };

    Ok(InclusionResponse {
        week,
        uid: uid.to_string(),
        included,
        entrants_root: draw.entrants_root,
        index,
        proof,
    })
}

/// The caller's own claims; admins see every claim.
pub fn list_claims(store: &dyn Store, caller: &Caller) -> Result<Vec<Claim>, DistributorError> {
    if caller.is_admin {
        Ok(store.list_claims()?)
    } else {
        Ok(store.list_claims_for_user(&caller.uid)?)
    }
}

/// Active rewards for everyone; admins may include retired ones.
pub fn list_rewards(
    store: &dyn Store,
    include_inactive: bool,
) -> Result<Vec<Reward>, DistributorError> {
    Ok(store
        .list_rewards()?
        .into_iter()
        .filter(|r| include_inactive || r.active)
        .collect())
}
