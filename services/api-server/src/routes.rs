use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts, Path, State},
    http::StatusCode,
    Json,
};
use lucky_common::{Claim, Env, Reward, User, WeekId};
use lucky_reward_distributor::msg::{
    CreateRewardRequest, DrawHistoryResponse, DrawSettingsResponse, DrawSummary,
    InclusionResponse, RecentWinnersResponse, RunDrawRequest, SubmitClaimRequest,
    UpdateClaimStatusRequest, UpdateDrawSettingsRequest, UserWinsResponse,
};
use lucky_reward_distributor::{execute as draws, query as draw_query, DistributorError, RunTrigger};
use lucky_subscription_hub::msg::{
    CreateOrderResponse, RegisterUserRequest, SubscriptionResponse, VerifyPaymentRequest,
};
use lucky_subscription_hub::{execute as hub, query as hub_query};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

type AppResult<T> = Result<T, ApiError>;

/// JSON body whose rejections render as `{"error": ..}`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(Deserialize, Debug, Default)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

/// Run synchronous store work on the blocking pool.
async fn blocking<T, F>(state: &Arc<AppState>, work: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> AppResult<T> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || work(&state))
        .await
        .map_err(|e| ApiError::Internal {
            reason: format!("store task failed: {e}"),
        })?
}

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ── Profile & subscription ──

pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
) -> AppResult<Json<User>> {
    let user = blocking(&state, move |s| {
        Ok(hub_query::get_profile(s.store.as_ref(), &caller)?)
    })
    .await?;
    Ok(Json(user))
}

pub async fn register_profile_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    ApiJson(request): ApiJson<RegisterUserRequest>,
) -> AppResult<Json<User>> {
    let user = blocking(&state, move |s| {
        Ok(hub::register_user(s.store.as_ref(), &Env::now(), &caller, request)?)
    })
    .await?;
    Ok(Json(user))
}

pub async fn get_subscription_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(uid): Path<String>,
) -> AppResult<Json<SubscriptionResponse>> {
    let response = blocking(&state, move |s| {
        Ok(hub_query::get_subscription(s.store.as_ref(), &Env::now(), &caller, &uid)?)
    })
    .await?;
    Ok(Json(response))
}

pub async fn create_order_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
) -> AppResult<Json<CreateOrderResponse>> {
    let order = hub::create_subscription_order(
        state.store.as_ref(),
        state.gateway.as_ref(),
        &state.hub,
        &Env::now(),
        &caller,
    )
    .await?;
    Ok(Json(order))
}

pub async fn verify_payment_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    ApiJson(request): ApiJson<VerifyPaymentRequest>,
) -> AppResult<Json<SubscriptionResponse>> {
    let env = Env::now();
    let subscription = blocking(&state, move |s| {
        Ok(hub::verify_subscription_payment(
            s.store.as_ref(),
            s.gateway.as_ref(),
            &s.hub,
            &env,
            &caller,
            request,
        )?)
    })
    .await?;
    Ok(Json(SubscriptionResponse::from_subscription(&subscription, env.now)))
}

pub async fn cancel_subscription_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
) -> AppResult<Json<SubscriptionResponse>> {
    let env = Env::now();
    let subscription = blocking(&state, move |s| {
        Ok(hub::cancel_subscription(s.store.as_ref(), &env, &caller)?)
    })
    .await?;
    Ok(Json(SubscriptionResponse::from_subscription(&subscription, env.now)))
}

// ── Rewards ──

pub async fn list_rewards_handler(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<Reward>>> {
    let rewards = blocking(&state, |s| {
        Ok(draw_query::list_rewards(s.store.as_ref(), false)?)
    })
    .await?;
    Ok(Json(rewards))
}

pub async fn create_reward_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    ApiJson(request): ApiJson<CreateRewardRequest>,
) -> AppResult<(StatusCode, Json<Reward>)> {
    let reward = blocking(&state, move |s| {
        Ok(draws::create_reward(s.store.as_ref(), &Env::now(), &caller, request)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(reward)))
}

// ── Draws ──

pub async fn recent_winners_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> AppResult<Json<RecentWinnersResponse>> {
    let winners = blocking(&state, move |s| {
        Ok(draw_query::recent_winners(s.store.as_ref(), query.limit)?)
    })
    .await?;
    Ok(Json(winners))
}

pub async fn draw_history_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> AppResult<Json<DrawHistoryResponse>> {
    let history = blocking(&state, move |s| {
        Ok(draw_query::draw_history(s.store.as_ref(), query.limit)?)
    })
    .await?;
    Ok(Json(history))
}

pub async fn user_wins_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(uid): Path<String>,
) -> AppResult<Json<UserWinsResponse>> {
    let wins = blocking(&state, move |s| {
        Ok(draw_query::user_wins(s.store.as_ref(), &caller, &uid)?)
    })
    .await?;
    Ok(Json(wins))
}

pub async fn verify_inclusion_handler(
    State(state): State<Arc<AppState>>,
    Path((week, uid)): Path<(String, String)>,
) -> AppResult<Json<InclusionResponse>> {
    let week: WeekId = week.parse().map_err(|e| ApiError::BadRequest {
        reason: format!("{e}"),
    })?;
    let inclusion = blocking(&state, move |s| {
        Ok(draw_query::verify_inclusion(s.store.as_ref(), week, &uid)?)
    })
    .await?;
    Ok(Json(inclusion))
}

/// Run a draw now. The week defaults to the current one; an empty body is
/// accepted.
pub async fn run_draw_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    body: Option<ApiJson<RunDrawRequest>>,
) -> AppResult<Json<DrawSummary>> {
    if !caller.is_admin {
        return Err(DistributorError::Unauthorized {
            reason: "only admins can run draws".to_string(),
        }
        .into());
    }
    let env = Env::now();
    let week = body
        .and_then(|ApiJson(request)| request.week)
        .unwrap_or_else(|| env.week());
    let draw = state.executor.run(&env, week, RunTrigger::Admin).await?;
    Ok(Json(DrawSummary::from(draw)))
}

// ── Claims ──

pub async fn list_claims_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
) -> AppResult<Json<Vec<Claim>>> {
    let claims = blocking(&state, move |s| {
        Ok(draw_query::list_claims(s.store.as_ref(), &caller)?)
    })
    .await?;
    Ok(Json(claims))
}

pub async fn submit_claim_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    ApiJson(request): ApiJson<SubmitClaimRequest>,
) -> AppResult<(StatusCode, Json<Claim>)> {
    let claim = blocking(&state, move |s| {
        Ok(draws::submit_claim(s.store.as_ref(), &Env::now(), &caller, request)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(claim)))
}

pub async fn update_claim_status_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateClaimStatusRequest>,
) -> AppResult<Json<Claim>> {
    let claim = blocking(&state, move |s| {
        Ok(draws::update_claim_status(
            s.store.as_ref(),
            s.notifier(),
            &Env::now(),
            &caller,
            &id,
            request,
        )?)
    })
    .await?;
    Ok(Json(claim))
}

// ── Settings ──

pub async fn get_draw_settings_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
) -> AppResult<Json<DrawSettingsResponse>> {
    let response = blocking(&state, move |s| {
        Ok(draw_query::get_draw_settings(s.store.as_ref(), &caller)?)
    })
    .await?;
    Ok(Json(response))
}

pub async fn update_draw_settings_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    ApiJson(request): ApiJson<UpdateDrawSettingsRequest>,
) -> AppResult<Json<DrawSettingsResponse>> {
    let response = blocking(&state, move |s| {
        Ok(draws::update_draw_settings(s.store.as_ref(), &Env::now(), &caller, request)?)
    })
    .await?;
    Ok(Json(response))
}
