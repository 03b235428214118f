//! HTTP API for the subscription hub and the weekly draws.
//!
//! Identity arrives in the `x-user-uid` header (or `x-dev-user-email` when
//! `APP_ENV=development`). Every error renders as `{"error": "..."}`.
//!
//! A background task ticks once a minute: it expires lapsed subscriptions
//! and, unless `SCHEDULER_ENABLED=false`, runs the draw scheduler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    http::{
        header::{HeaderName, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use lucky_common::Env;
use lucky_drand_beacon::{ChainInfo, DrandBeacon, OsRandomness};
use lucky_reward_distributor::{DrawExecutor, LogNotifier, Scheduler};
use lucky_store::{DocumentStore, SqlStore, Store};
use lucky_subscription_hub::{execute::expire_lapsed_subscriptions, RazorpayClient};
use tokio::{
    net::TcpListener,
    signal::{
        ctrl_c,
        unix::{signal, SignalKind},
    },
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use auth::{DEV_EMAIL_HEADER, USER_UID_HEADER};
use config::{Config, ConfigError};
use routes::*;
use state::{AppState, AuthConfig};

pub const TICK_SECONDS: u64 = 60;

/// `RUST_LOG` filtering, JSON lines when `LOG_JSON=true`.
pub fn init_tracing() {
    let json = std::env::var("LOG_JSON").is_ok_and(|v| v.eq_ignore_ascii_case("true"));
    let builder = fmt().with_env_filter(EnvFilter::from_default_env());
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialised: {e}");
    }
}

pub fn cors_layer(origin: Option<&str>) -> Result<CorsLayer, ConfigError> {
    let allow_origin = match origin {
        None | Some("*") => AllowOrigin::any(),
        Some(origin) => {
            AllowOrigin::exact(HeaderValue::from_str(origin).map_err(|e| {
                ConfigError::Invalid {
                    key: "CORS_ORIGIN".to_string(),
                    reason: e.to_string(),
                }
            })?)
        }
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(USER_UID_HEADER),
            HeaderName::from_static(DEV_EMAIL_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60)))
}

pub fn build_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/user/profile",
            get(get_profile_handler).post(register_profile_handler),
        )
        .route("/api/user/subscription/:uid", get(get_subscription_handler))
        .route("/api/create-subscription-order", post(create_order_handler))
        .route("/api/verify-subscription-payment", post(verify_payment_handler))
        .route("/api/cancel-subscription", post(cancel_subscription_handler))
        .route(
            "/api/rewards",
            get(list_rewards_handler).post(create_reward_handler),
        )
        .route("/api/draws/winners", get(recent_winners_handler))
        .route("/api/draws/history", get(draw_history_handler))
        .route("/api/draws/wins/:uid", get(user_wins_handler))
        .route("/api/draws/:week/verify/:uid", get(verify_inclusion_handler))
        .route("/api/draws/run", post(run_draw_handler))
        .route(
            "/api/claims",
            get(list_claims_handler).post(submit_claim_handler),
        )
        .route("/api/claims/:id/status", post(update_claim_status_handler))
        .route(
            "/api/settings/draw",
            get(get_draw_settings_handler).post(update_draw_settings_handler),
        )
        .layer(cors)
        .with_state(state)
}

/// The primary store named by the config, migrated when relational.
pub fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    if config.use_firebase_as_primary {
        let dir = config
            .firestore_export_dir
            .as_ref()
            .context("FIRESTORE_EXPORT_DIR is required with USE_FIREBASE_AS_PRIMARY")?;
        info!(dir = %dir.display(), "using document store as primary");
        return Ok(Arc::new(DocumentStore::open(dir.clone())?));
    }

    let store = SqlStore::open(&config.database_url)
        .with_context(|| format!("opening {}", config.database_url))?;
    let report = store.migrate()?;
    info!(?report, "relational store ready");
    Ok(Arc::new(store))
}

pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let store = open_store(config)?;
    let gateway = RazorpayClient::new(
        &config.razorpay_api_url,
        &config.razorpay_key_id,
        &config.razorpay_key_secret,
    )?;
    let beacon = DrandBeacon::new(&config.drand_url, ChainInfo::quicknet())?;
    let executor = DrawExecutor::new(
        store.clone(),
        Arc::new(beacon),
        Arc::new(OsRandomness),
        Arc::new(LogNotifier),
    );

    Ok(AppState::new(
        store,
        Arc::new(gateway),
        Arc::new(executor),
        config.hub.clone(),
        AuthConfig {
            admin_emails: config.admin_emails.clone(),
            dev_mode: config.dev_mode,
        },
    ))
}

/// Minute ticker: subscription expiry, then the draw scheduler if any.
pub fn spawn_background(state: Arc<AppState>, scheduler: Option<Scheduler>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(TICK_SECONDS));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let env = Env::now();

            match expire_lapsed_subscriptions(state.store.as_ref(), &env) {
                Ok(0) => {}
                Ok(expired) => info!(expired, "expired lapsed subscriptions"),
                Err(e) => error!(error = %e, "subscription expiry failed"),
            }

            if let Some(scheduler) = &scheduler {
                if let Err(e) = scheduler.tick(&env).await {
                    error!(error = %e, "scheduler tick failed");
                }
            }
        }
    })
}

pub async fn start_server(config: Config) -> anyhow::Result<()> {
    info!("Initializing state...");
    let state = build_state(&config)?;

    let scheduler = if config.scheduler_enabled {
        Some(Scheduler::new(state.executor.clone()))
    } else {
        warn!("draw scheduler disabled by SCHEDULER_ENABLED");
        None
    };
    let background = spawn_background(state.clone(), scheduler);

    let app = build_router(state, cors_layer(config.cors_origin.as_deref())?);

    let address = format!("0.0.0.0:{}", config.port);
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    background.abort();
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
