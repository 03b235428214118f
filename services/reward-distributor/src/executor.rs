use std::sync::Arc;

use lucky_common::{Draw, DrawStatus, DrawWinner, Env, WeekId};
use lucky_drand_beacon::{Randomness, RandomnessSource};
use lucky_store::Store;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::DistributorError;
use crate::notify::{Notification, Notifier};
use crate::retry::{BackoffPolicy, RetryPolicy};
use crate::selection::{
    compute_split, eligible_entrants, entrants_root, prize_per_winner, select_winners,
};
use crate::state::{DrawSettings, DRAW_CONFIG, DRAW_SETTINGS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunTrigger {
    /// Fired by the scheduler; honours the `enabled` switch.
    Scheduled,
    /// Forced by an admin.
    Admin,
}

/// Runs weekly draws. One run at a time per executor.
pub struct DrawExecutor {
    store: Arc<dyn Store>,
    primary: Arc<dyn RandomnessSource>,
    backup: Arc<dyn RandomnessSource>,
    notifier: Arc<dyn Notifier>,
    base_backoff_ms: u64,
    run_lock: Mutex<()>,
}

impl DrawExecutor {
    pub fn new(
        store: Arc<dyn Store>,
        primary: Arc<dyn RandomnessSource>,
        backup: Arc<dyn RandomnessSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            primary,
            backup,
            notifier,
            base_backoff_ms: RetryPolicy::default().base_backoff_ms,
            run_lock: Mutex::new(()),
        }
    }

    pub fn with_backoff_ms(mut self, base_backoff_ms: u64) -> Self {
        self.base_backoff_ms = base_backoff_ms;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Run the draw for `week` at `env.now`.
    ///
    /// A completed draw is never re-run. A pending draw left behind by an
    /// interrupted run, or a failed one, is run again from scratch.
    pub async fn run(
        &self,
        env: &Env,
        week: WeekId,
        trigger: RunTrigger,
    ) -> Result<Draw, DistributorError> {
        let _guard = self.run_lock.lock().await;
        let store = self.store.as_ref();

        let config = DRAW_CONFIG.load(store)?;
        let settings = DRAW_SETTINGS.load(store)?;
        if trigger == RunTrigger::Scheduled && !settings.enabled {
            return Err(DistributorError::DrawsDisabled);
        }

        match store.get_draw(&week)? {
            Some(existing) if existing.status == DrawStatus::Completed => {
                return Err(DistributorError::DrawAlreadyCompleted { week });
            }
            Some(existing) => warn!(
                %week,
                previous_status = %existing.status,
                "re-running draw"
            ),
            None => {}
        }

        let mut draw = Draw::pending(week, env.now);
        store.put_draw(&draw)?;

        let subscriptions = store.list_subscriptions()?;
        let revenue: u64 = subscriptions
            .iter()
            .filter(|s| s.is_active_at(env.now))
            .map(|s| s.amount)
            .sum();
        let split = compute_split(revenue, &config);

        let past_draws = store.list_draws()?;
        let entrants = eligible_entrants(&subscriptions, &past_draws, &config, env.now);
        draw.total_revenue = revenue;
        draw.entrant_count = entrants.len() as u32;
        draw.entrants_root = entrants_root(&entrants);
        draw.entrants = entrants;

        if draw.entrants.is_empty() {
            return Err(self.fail(draw, &settings, DistributorError::NoEligibleEntrants { week }));
        }

        let randomness = match self.fetch_randomness(env, &settings, &mut draw).await {
            Ok(r) => r,
            Err(e) => return Err(self.fail(draw, &settings, e)),
        };

        let winners = select_winners(&draw.entrants, &randomness.bytes, config.winners_per_draw);
        let prize = prize_per_winner(split.prize_pool, winners.len() as u32, config.minimum_reward);
        draw.winners = winners
            .into_iter()
            .map(|uid| DrawWinner {
                uid,
                prize_amount: prize,
                claim_status: None,
            })
            .collect();
        draw.total_prize_pool = match prize.checked_mul(draw.winners.len() as u64) {
            Some(total) => total,
            None => {
                let err = DistributorError::InvalidSetting {
                    field: "minimum_reward".to_string(),
                    reason: "prize pool overflows".to_string(),
                };
                draw.winners.clear();
                return Err(self.fail(draw, &settings, err));
            }
        };
        draw.randomness = Some(randomness.to_hex());
        draw.randomness_source = Some(randomness.source.clone());
        draw.status = DrawStatus::Completed;
        draw.completed_at = Some(env.now);
        store.put_draw(&draw)?;

        info!(
            event = "lucky_draw_completed",
            %week,
            entrants = draw.entrant_count,
            winners = draw.winners.len(),
            total_revenue = split.revenue,
            prize_pool = split.prize_pool,
            profit = split.profit,
            maintenance = split.maintenance,
            total_prize_pool = draw.total_prize_pool,
            randomness_source = %randomness.source,
            drand_round = randomness.round.unwrap_or_default(),
            entrants_root = draw.entrants_root.as_deref().unwrap_or(""),
            "draw completed"
        );

        for winner in &draw.winners {
            self.notifier.notify(Notification::WinnerAnnounced {
                uid: winner.uid.clone(),
                week,
                prize_amount: winner.prize_amount,
            });
        }
        Ok(draw)
    }

    /// Primary source with linear back-off, then the backup when allowed.
    async fn fetch_randomness(
        &self,
        env: &Env,
        settings: &DrawSettings,
        draw: &mut Draw,
    ) -> Result<Randomness, DistributorError> {
        let policy = RetryPolicy {
            max_attempts: settings.max_draw_attempts.max(1) as u32,
            base_backoff_ms: self.base_backoff_ms,
        };

        let mut last_error = String::new();
        for attempt in 1..=policy.max_attempts {
            draw.attempts = attempt;
            match self.primary.fetch(env.now).await {
                Ok(randomness) => return Ok(randomness),
                Err(e) => {
                    warn!(
                        week = %draw.week,
                        attempt,
                        source = self.primary.name(),
                        error = %e,
                        "randomness fetch failed"
                    );
                    last_error = e.to_string();
                }
            }
            if attempt < policy.max_attempts {
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
            }
        }

        if settings.backup_draw_enabled {
            match self.backup.fetch(env.now).await {
                Ok(randomness) => {
                    warn!(
                        week = %draw.week,
                        source = self.backup.name(),
                        "primary randomness exhausted, using backup"
                    );
                    return Ok(randomness);
                }
                Err(e) => last_error = e.to_string(),
            }
        }

        Err(DistributorError::RandomnessUnavailable {
            attempts: policy.max_attempts,
            reason: last_error,
        })
    }

    /// Persist the draw as failed and tell the operator. Returns `cause` so
    /// the caller can propagate it.
    fn fail(
        &self,
        mut draw: Draw,
        settings: &DrawSettings,
        cause: DistributorError,
    ) -> DistributorError {
        draw.status = DrawStatus::Failed;
        draw.failure_reason = Some(cause.to_string());
        if let Err(e) = self.store.put_draw(&draw) {
            error!(week = %draw.week, error = %e, "could not persist failed draw");
        }

        error!(
            event = "lucky_draw_failed",
            week = %draw.week,
            attempts = draw.attempts,
            reason = %cause,
            "draw failed"
        );

        let email = settings.notification_email.trim();
        if email.is_empty() {
            warn!(week = %draw.week, "no notification email configured for draw failures");
        } else {
            self.notifier.notify(Notification::DrawFailed {
                email: email.to_string(),
                week: draw.week,
                reason: cause.to_string(),
            });
        }
        cause
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;
    use crate::state::DrawConfig;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use lucky_common::{Subscription, SubscriptionStatus};
    use lucky_drand_beacon::BeaconError;
    use lucky_store::SqlStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `failures` times, then returns fixed bytes.
    struct ScriptedSource {
        name: &'static str,
        failures: u32,
        calls: AtomicU32,
        bytes: [u8; 32],
    }

    impl ScriptedSource {
        fn new(name: &'static str, failures: u32, fill: u8) -> Arc<Self> {
            Arc::new(Self {
                name,
                failures,
                calls: AtomicU32::new(0),
                bytes: [fill; 32],
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RandomnessSource for ScriptedSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _at: DateTime<Utc>) -> Result<Randomness, BeaconError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(BeaconError::Http {
                    reason: "connection refused".to_string(),
                });
            }
            Ok(Randomness {
                bytes: self.bytes,
                round: Some(42),
                source: self.name.to_string(),
            })
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 8, 18, 0, 0).unwrap()
    }

    fn week() -> WeekId {
        WeekId::from_datetime(now())
    }

    fn subscribe(store: &SqlStore, uid: &str, amount: u64) {
        store
            .put_subscription(&Subscription {
                uid: uid.to_string(),
                status: SubscriptionStatus::Active,
                amount,
                order_id: None,
                payment_id: None,
                started_at: Some(now() - Duration::days(1)),
                current_period_end: Some(now() + Duration::days(30)),
                cancelled_at: None,
                updated_at: now(),
            })
            .unwrap();
    }

    struct Harness {
        store: Arc<SqlStore>,
        primary: Arc<ScriptedSource>,
        backup: Arc<ScriptedSource>,
        notifier: Arc<MemoryNotifier>,
        executor: DrawExecutor,
    }

    fn harness(primary_failures: u32) -> Harness {
        let store = Arc::new(SqlStore::open_in_memory().unwrap());
        let primary = ScriptedSource::new("primary", primary_failures, 1);
        let backup = ScriptedSource::new("backup", 0, 2);
        let notifier = Arc::new(MemoryNotifier::new());
        let executor = DrawExecutor::new(
            store.clone(),
            primary.clone(),
            backup.clone(),
            notifier.clone(),
        )
        .with_backoff_ms(1);
        Harness {
            store,
            primary,
            backup,
            notifier,
            executor,
        }
    }

    fn save_settings(store: &SqlStore, settings: DrawSettings) {
        DRAW_SETTINGS.save(store, &settings, now()).unwrap();
    }

    #[tokio::test]
    async fn test_completed_draw_pays_split() {
        let h = harness(0);
        for (i, uid) in ["amy", "bob", "cat", "dan"].iter().enumerate() {
            subscribe(&h.store, uid, 1000 + i as u64);
        }
        DRAW_CONFIG
            .save(
                h.store.as_ref(),
                &DrawConfig {
                    winners_per_draw: 2,
                    ..DrawConfig::default()
                },
                now(),
            )
            .unwrap();

        let draw = h
            .executor
            .run(&Env::at(now()), week(), RunTrigger::Scheduled)
            .await
            .unwrap();

        assert_eq!(draw.status, DrawStatus::Completed);
        assert_eq!(draw.total_revenue, 4006);
        assert_eq!(draw.entrant_count, 4);
        assert_eq!(draw.entrants, vec!["amy", "bob", "cat", "dan"]);
        assert_eq!(draw.winners.len(), 2);
        // floor(2003 / 2) = 1001 per winner
        assert!(draw.winners.iter().all(|w| w.prize_amount == 1001));
        assert_eq!(draw.total_prize_pool, 2002);
        assert_eq!(draw.randomness, Some(hex::encode([1u8; 32])));
        assert_eq!(draw.randomness_source.as_deref(), Some("primary"));
        assert_eq!(draw.attempts, 1);
        assert!(draw.entrants_root.is_some());

        let expected = select_winners(&draw.entrants, &[1u8; 32], 2);
        let got: Vec<String> = draw.winners.iter().map(|w| w.uid.clone()).collect();
        assert_eq!(got, expected);

        assert_eq!(h.store.get_draw(&week()).unwrap(), Some(draw));
        assert_eq!(h.notifier.count("winner_announced"), 2);
    }

    #[tokio::test]
    async fn test_minimum_reward_applies_to_small_pools() {
        let h = harness(0);
        subscribe(&h.store, "amy", 49);
        let draw = h
            .executor
            .run(&Env::at(now()), week(), RunTrigger::Admin)
            .await
            .unwrap();
        assert_eq!(draw.winners[0].prize_amount, 500);
        assert_eq!(draw.total_prize_pool, 500);
    }

    #[tokio::test]
    async fn test_overflowing_prize_pool_fails_draw() {
        let h = harness(0);
        subscribe(&h.store, "amy", 49);
        subscribe(&h.store, "bob", 49);
        // Bypasses the admin bounds on purpose
        let config = DrawConfig {
            winners_per_draw: 2,
            minimum_reward: u64::MAX,
            ..DrawConfig::default()
        };
        DRAW_CONFIG.save(h.store.as_ref(), &config, now()).unwrap();

        let err = h
            .executor
            .run(&Env::at(now()), week(), RunTrigger::Admin)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DistributorError::InvalidSetting { ref field, .. } if field == "minimum_reward"
        ));

        let draw = h.store.get_draw(&week()).unwrap().unwrap();
        assert_eq!(draw.status, DrawStatus::Failed);
        assert!(draw.winners.is_empty());
    }

    #[tokio::test]
    async fn test_completed_draw_is_not_rerun() {
        let h = harness(0);
        subscribe(&h.store, "amy", 49);
        let env = Env::at(now());
        h.executor.run(&env, week(), RunTrigger::Admin).await.unwrap();

        let err = h.executor.run(&env, week(), RunTrigger::Admin).await.unwrap_err();
        assert!(matches!(err, DistributorError::DrawAlreadyCompleted { .. }));
    }

    #[tokio::test]
    async fn test_disabled_blocks_scheduled_runs_only() {
        let h = harness(0);
        subscribe(&h.store, "amy", 49);
        save_settings(
            &h.store,
            DrawSettings {
                enabled: false,
                ..DrawSettings::default()
            },
        );
        let env = Env::at(now());

        assert!(matches!(
            h.executor.run(&env, week(), RunTrigger::Scheduled).await,
            Err(DistributorError::DrawsDisabled)
        ));
        assert_eq!(h.store.get_draw(&week()).unwrap(), None);
        assert!(h.executor.run(&env, week(), RunTrigger::Admin).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_entrants_fails_without_retry() {
        let h = harness(0);
        save_settings(
            &h.store,
            DrawSettings {
                notification_email: "ops@example.com".to_string(),
                ..DrawSettings::default()
            },
        );

        let err = h
            .executor
            .run(&Env::at(now()), week(), RunTrigger::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, DistributorError::NoEligibleEntrants { .. }));
        assert_eq!(h.primary.calls(), 0);

        let stored = h.store.get_draw(&week()).unwrap().unwrap();
        assert_eq!(stored.status, DrawStatus::Failed);
        assert_eq!(
            stored.failure_reason,
            Some(format!("no eligible subscribers for week {}", week()))
        );
        assert_eq!(h.notifier.count("draw_failed"), 1);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds_on_primary() {
        let h = harness(2);
        subscribe(&h.store, "amy", 49);

        let draw = h
            .executor
            .run(&Env::at(now()), week(), RunTrigger::Admin)
            .await
            .unwrap();
        assert_eq!(draw.attempts, 3);
        assert_eq!(draw.randomness_source.as_deref(), Some("primary"));
        assert_eq!(h.primary.calls(), 3);
        assert_eq!(h.backup.calls(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_primary_falls_back_to_backup() {
        let h = harness(u32::MAX);
        subscribe(&h.store, "amy", 49);

        let draw = h
            .executor
            .run(&Env::at(now()), week(), RunTrigger::Admin)
            .await
            .unwrap();
        assert_eq!(h.primary.calls(), 3);
        assert_eq!(h.backup.calls(), 1);
        assert_eq!(draw.randomness_source.as_deref(), Some("backup"));
        assert_eq!(draw.randomness, Some(hex::encode([2u8; 32])));
    }

    #[tokio::test]
    async fn test_exhausted_primary_without_backup_fails() {
        let h = harness(u32::MAX);
        subscribe(&h.store, "amy", 49);
        save_settings(
            &h.store,
            DrawSettings {
                backup_draw_enabled: false,
                max_draw_attempts: 2,
                ..DrawSettings::default()
            },
        );

        let err = h
            .executor
            .run(&Env::at(now()), week(), RunTrigger::Admin)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DistributorError::RandomnessUnavailable { attempts: 2, .. }
        ));
        assert_eq!(h.primary.calls(), 2);
        assert_eq!(h.backup.calls(), 0);

        let stored = h.store.get_draw(&week()).unwrap().unwrap();
        assert_eq!(stored.status, DrawStatus::Failed);
        assert_eq!(stored.attempts, 2);
        // No notification email configured
        assert_eq!(h.notifier.count("draw_failed"), 0);
    }

    #[tokio::test]
    async fn test_failed_draw_can_be_rerun() {
        let h = harness(0);
        let env = Env::at(now());
        assert!(h.executor.run(&env, week(), RunTrigger::Admin).await.is_err());

        subscribe(&h.store, "amy", 49);
        let draw = h.executor.run(&env, week(), RunTrigger::Admin).await.unwrap();
        assert_eq!(draw.status, DrawStatus::Completed);
        assert_eq!(draw.failure_reason, None);
    }

    #[tokio::test]
    async fn test_recent_winner_sits_out_next_week() {
        let h = harness(0);
        subscribe(&h.store, "amy", 49);
        subscribe(&h.store, "bob", 49);
        let env = Env::at(now());
        let first = h.executor.run(&env, week(), RunTrigger::Admin).await.unwrap();
        let first_winner = first.winners[0].uid.clone();

        let next = Env::at(now() + Duration::days(7));
        let second = h
            .executor
            .run(&next, next.week(), RunTrigger::Admin)
            .await
            .unwrap();
        assert_eq!(second.entrant_count, 1);
        assert_ne!(second.winners[0].uid, first_winner);
    }
}
