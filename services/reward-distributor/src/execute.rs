use lucky_common::{Caller, Claim, ClaimStatus, DrawStatus, Env, Reward};
use lucky_store::{Store, StoreError};
use tracing::info;
use uuid::Uuid;

use crate::error::DistributorError;
use crate::msg::{
    CreateRewardRequest, DrawSettingsResponse, SubmitClaimRequest, UpdateClaimStatusRequest,
    UpdateDrawSettingsRequest,
};
use crate::notify::{Notification, Notifier};
use crate::state::{DrawConfig, DrawSettings, DRAW_CONFIG, DRAW_SETTINGS};

/// Lowest prize a draw may pay out, in rupees.
pub const MIN_REWARD_FLOOR: u64 = 500;
pub const MAX_DRAW_ATTEMPTS: u8 = 5;
/// Upper bound for the prize floor, in rupees.
pub const MAX_MINIMUM_REWARD: u64 = 10_000_000;
pub const MAX_WINNERS_PER_DRAW: u32 = 1_000;
/// Upper bound for the cool-down and claim reminder windows.
pub const MAX_WINDOW_DAYS: u32 = 3_650;
pub const MAX_NOTIFICATION_HOURS: u32 = 8_760;

fn invalid(field: &str, reason: &str) -> DistributorError {
    DistributorError::InvalidSetting {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn require_admin(caller: &Caller, action: &str) -> Result<(), DistributorError> {
    if !caller.is_admin {
        return Err(DistributorError::Unauthorized {
            reason: format!("only admins can {action}"),
        });
    }
    Ok(())
}

pub fn validate_draw_config(config: &DrawConfig) -> Result<(), DistributorError> {
    let total = config.draw_percentage as u32
        + config.profit_percentage as u32
        + config.maintenance_percentage as u32;
    if total != 100 {
        return Err(DistributorError::PercentSumMismatch {
            draw: config.draw_percentage,
            profit: config.profit_percentage,
            maintenance: config.maintenance_percentage,
            total,
        });
    }
    if !(1..=MAX_WINNERS_PER_DRAW).contains(&config.winners_per_draw) {
        return Err(invalid(
            "winners_per_draw",
            &format!("must be between 1 and {MAX_WINNERS_PER_DRAW}"),
        ));
    }
    if !(MIN_REWARD_FLOOR..=MAX_MINIMUM_REWARD).contains(&config.minimum_reward) {
        return Err(invalid(
            "minimum_reward",
            &format!("must be between {MIN_REWARD_FLOOR} and {MAX_MINIMUM_REWARD}"),
        ));
    }
    if config.eligibility_days > MAX_WINDOW_DAYS {
        return Err(invalid(
            "eligibility_days",
            &format!("must be at most {MAX_WINDOW_DAYS}"),
        ));
    }
    if config.notification_days > MAX_WINDOW_DAYS {
        return Err(invalid(
            "notification_days",
            &format!("must be at most {MAX_WINDOW_DAYS}"),
        ));
    }
    Ok(())
}

pub fn validate_draw_settings(settings: &DrawSettings) -> Result<(), DistributorError> {
    if settings.draw_hour > 23 {
        return Err(invalid("draw_hour", "must be between 0 and 23"));
    }
    if settings.draw_day > 6 {
        return Err(invalid("draw_day", "must be between 0 (Sunday) and 6 (Saturday)"));
    }
    if !(1..=MAX_DRAW_ATTEMPTS).contains(&settings.max_draw_attempts) {
        return Err(invalid(
            "max_draw_attempts",
            &format!("must be between 1 and {MAX_DRAW_ATTEMPTS}"),
        ));
    }
    if settings.notification_hours > MAX_NOTIFICATION_HOURS {
        return Err(invalid(
            "notification_hours",
            &format!("must be at most {MAX_NOTIFICATION_HOURS}"),
        ));
    }
    let email = settings.notification_email.trim();
    if !email.is_empty() && !email.contains('@') {
        return Err(invalid("notification_email", "must be empty or an email address"));
    }
    Ok(())
}

/// Replace the draw configuration and/or schedule settings. Both sections
/// are validated before either one is written.
pub fn update_draw_settings(
    store: &dyn Store,
    env: &Env,
    caller: &Caller,
    request: UpdateDrawSettingsRequest,
) -> Result<DrawSettingsResponse, DistributorError> {
    require_admin(caller, "update draw settings")?;

    if let Some(config) = &request.config {
        validate_draw_config(config)?;
    }
    if let Some(settings) = &request.settings {
        validate_draw_settings(settings)?;
    }

    if let Some(config) = &request.config {
        DRAW_CONFIG.save(store, config, env.now)?;
        info!(
            event = "lucky_settings_updated",
            section = DRAW_CONFIG.key(),
            admin = %caller.uid,
            draw_percentage = config.draw_percentage,
            profit_percentage = config.profit_percentage,
            maintenance_percentage = config.maintenance_percentage,
            winners_per_draw = config.winners_per_draw,
            minimum_reward = config.minimum_reward,
            "draw config updated"
        );
    }
    if let Some(settings) = &request.settings {
        DRAW_SETTINGS.save(store, settings, env.now)?;
        info!(
            event = "lucky_settings_updated",
            section = DRAW_SETTINGS.key(),
            admin = %caller.uid,
            enabled = settings.enabled,
            draw_day = settings.draw_day,
            draw_hour = settings.draw_hour,
            max_draw_attempts = settings.max_draw_attempts,
            "draw settings updated"
        );
    }

    Ok(DrawSettingsResponse {
        config: DRAW_CONFIG.load(store)?,
        settings: DRAW_SETTINGS.load(store)?,
    })
}

/// Write default config and settings where none are stored yet. Returns the
/// keys that were written.
pub fn seed_default_settings(
    store: &dyn Store,
    env: &Env,
) -> Result<Vec<&'static str>, DistributorError> {
    let mut written = vec![];
    if DRAW_CONFIG.may_load(store)?.is_none() {
        DRAW_CONFIG.save(store, &DrawConfig::default(), env.now)?;
        written.push(DRAW_CONFIG.key());
    }
    if DRAW_SETTINGS.may_load(store)?.is_none() {
        DRAW_SETTINGS.save(store, &DrawSettings::default(), env.now)?;
        written.push(DRAW_SETTINGS.key());
    }
    if !written.is_empty() {
        info!(event = "lucky_settings_seeded", keys = ?written, "default settings seeded");
    }
    Ok(written)
}

pub fn create_reward(
    store: &dyn Store,
    env: &Env,
    caller: &Caller,
    request: CreateRewardRequest,
) -> Result<Reward, DistributorError> {
    require_admin(caller, "create rewards")?;

    let title = request.title.trim();
    if title.is_empty() {
        return Err(DistributorError::InvalidInput {
            field: "title".to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if request.amount == 0 {
        return Err(DistributorError::InvalidInput {
            field: "amount".to_string(),
            reason: "must be positive".to_string(),
        });
    }

    let reward = Reward {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        description: request.description.trim().to_string(),
        amount: request.amount,
        week: request.week,
        active: true,
        created_at: env.now,
    };
    store.put_reward(&reward)?;

    info!(
        event = "lucky_reward_created",
        id = %reward.id,
        amount = reward.amount,
        "reward created"
    );
    Ok(reward)
}

/// Mirror a claim's status onto its winner entry in the draw record.
fn set_winner_claim_status(store: &dyn Store, claim: &Claim) -> Result<(), DistributorError> {
    store.update_draw(&claim.week, &mut |draw| {
        if let Some(winner) = draw.winner_mut(&claim.uid) {
            winner.claim_status = Some(claim.status);
        }
    })?;
    Ok(())
}

/// A winner asks for their prize. One claim per (uid, week).
pub fn submit_claim(
    store: &dyn Store,
    env: &Env,
    caller: &Caller,
    request: SubmitClaimRequest,
) -> Result<Claim, DistributorError> {
    let week = request.week;
    let payout_details = request.payout_details.trim();
    if payout_details.is_empty() {
        return Err(DistributorError::InvalidInput {
            field: "payout_details".to_string(),
            reason: "must not be empty".to_string(),
        });
    }

    let draw = store
        .get_draw(&week)?
        .ok_or(DistributorError::DrawNotFound { week })?;
    if draw.status != DrawStatus::Completed {
        return Err(DistributorError::DrawNotCompleted { week });
    }
    let prize_amount = draw
        .winner(&caller.uid)
        .map(|w| w.prize_amount)
        .ok_or_else(|| DistributorError::NotAWinner {
            uid: caller.uid.clone(),
            week,
        })?;

    let claim = Claim {
        id: Uuid::new_v4().to_string(),
        uid: caller.uid.clone(),
        week,
        prize_amount,
        status: ClaimStatus::Submitted,
        payout_details: payout_details.to_string(),
        admin_note: None,
        created_at: env.now,
        updated_at: env.now,
    };
    store.insert_claim(&claim).map_err(|e| match e {
        StoreError::Conflict { .. } => DistributorError::ClaimAlreadyExists {
            uid: caller.uid.clone(),
            week,
        },
        other => other.into(),
    })?;

    set_winner_claim_status(store, &claim)?;

    info!(
        event = "lucky_claim_submitted",
        id = %claim.id,
        uid = %claim.uid,
        week = %week,
        prize_amount,
        "claim submitted"
    );
    Ok(claim)
}

/// Admin moves a claim along its lifecycle and the winner is told.
pub fn update_claim_status(
    store: &dyn Store,
    notifier: &dyn Notifier,
    env: &Env,
    caller: &Caller,
    id: &str,
    request: UpdateClaimStatusRequest,
) -> Result<Claim, DistributorError> {
    require_admin(caller, "update claims")?;

    let mut claim = store
        .get_claim(id)?
        .ok_or_else(|| DistributorError::ClaimNotFound { id: id.to_string() })?;

    if !claim.status.can_transition_to(request.status) {
        return Err(DistributorError::InvalidClaimTransition {
            from: claim.status,
            to: request.status,
        });
    }

    let from = claim.status;
    claim.status = request.status;
    if let Some(note) = request.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
        claim.admin_note = Some(note);
    }
    claim.updated_at = env.now;
    store.put_claim(&claim)?;

    set_winner_claim_status(store, &claim)?;

    info!(
        event = "lucky_claim_status_changed",
        id = %claim.id,
        uid = %claim.uid,
        from = %from,
        to = %claim.status,
        admin = %caller.uid,
        "claim status changed"
    );
    notifier.notify(Notification::ClaimStatusChanged {
        uid: claim.uid.clone(),
        week: claim.week,
        status: claim.status,
    });
    Ok(claim)
}
