use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use lucky_common::merkle::{build_merkle_proof, build_merkle_root, compute_leaf_hash};
use lucky_common::{Draw, DrawStatus, Subscription};
use sha2::{Digest, Sha256};

use crate::state::DrawConfig;

/// Revenue split for one draw, in rupees.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PayoutSplit {
    pub revenue: u64,
    pub prize_pool: u64,
    pub profit: u64,
    /// Remainder after prize pool and profit, so the three always add up
    pub maintenance: u64,
}

pub fn compute_split(revenue: u64, config: &DrawConfig) -> PayoutSplit {
    let share = |pct: u8| (revenue as u128 * pct as u128 / 100) as u64;
    let prize_pool = share(config.draw_percentage);
    let profit = share(config.profit_percentage);
    PayoutSplit {
        revenue,
        prize_pool,
        profit,
        maintenance: revenue - prize_pool - profit,
    }
}

/// Equal share of the pool per winner, never below the configured floor.
pub fn prize_per_winner(prize_pool: u64, winners: u32, minimum_reward: u64) -> u64 {
    if winners == 0 {
        return 0;
    }
    (prize_pool / winners as u64).max(minimum_reward)
}

/// Uids that won a completed draw within the cool-down window before `now`.
pub fn recent_winners(draws: &[Draw], eligibility_days: u32, now: DateTime<Utc>) -> HashSet<String> {
    let cutoff = now
        .checked_sub_signed(Duration::days(eligibility_days as i64))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    draws
        .iter()
        .filter(|d| d.status == DrawStatus::Completed)
        .filter(|d| d.completed_at.is_some_and(|at| at > cutoff && at <= now))
        .flat_map(|d| d.winners.iter().map(|w| w.uid.clone()))
        .collect()
}

/// Active subscribers outside the cool-down window, sorted by uid.
pub fn eligible_entrants(
    subscriptions: &[Subscription],
    draws: &[Draw],
    config: &DrawConfig,
    now: DateTime<Utc>,
) -> Vec<String> {
    let cooling_down = recent_winners(draws, config.eligibility_days, now);
    let mut entrants: Vec<String> = subscriptions
        .iter()
        .filter(|s| s.is_active_at(now))
        .filter(|s| !cooling_down.contains(&s.uid))
        .map(|s| s.uid.clone())
        .collect();
    entrants.sort();
    entrants.dedup();
    entrants
}

/// Leaves of the entrant commitment, one per entrant in list order.
pub fn entrant_leaves(entrants: &[String]) -> Vec<[u8; 32]> {
    entrants
        .iter()
        .enumerate()
        .map(|(i, uid)| compute_leaf_hash(uid, i as u32))
        .collect()
}

pub fn entrants_root(entrants: &[String]) -> Option<String> {
    build_merkle_root(&entrant_leaves(entrants)).map(hex::encode)
}

/// Index and sibling path for `uid`, if it is an entrant.
pub fn entrant_proof(entrants: &[String], uid: &str) -> Option<(u32, Vec<String>)> {
    let index = entrants.iter().position(|e| e == uid)?;
    let proof = build_merkle_proof(&entrant_leaves(entrants), index)?;
    Some((index as u32, proof))
}

/// Ticket for pick `i`: `u128_be(sha256(randomness || i_be32)[0..16])`.
fn ticket(randomness: &[u8; 32], pick: u32) -> u128 {
    let mut hasher = Sha256::new();
    hasher.update(randomness);
    hasher.update(pick.to_be_bytes());
    let seed: [u8; 32] = hasher.finalize().into();

    let mut ticket_bytes = [0u8; 16];
    ticket_bytes.copy_from_slice(&seed[0..16]);
    u128::from_be_bytes(ticket_bytes)
}

/// Pick up to `count` distinct winners. The result depends only on the
/// entrant list and the randomness.
pub fn select_winners(entrants: &[String], randomness: &[u8; 32], count: u32) -> Vec<String> {
    let mut remaining = entrants.to_vec();
    let picks = (count as usize).min(remaining.len());
    let mut winners = Vec::with_capacity(picks);
    for i in 0..picks {
        let index = (ticket(randomness, i as u32) % remaining.len() as u128) as usize;
        winners.push(remaining.remove(index));
    }
    winners
}
