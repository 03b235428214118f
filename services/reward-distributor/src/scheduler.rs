use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use lucky_common::{DrawStatus, Env, WeekId};
use lucky_store::Store;
use tracing::{debug, error, info, warn};

use crate::error::DistributorError;
use crate::executor::{DrawExecutor, RunTrigger};
use crate::notify::{Notification, Notifier};
use crate::state::{DrawSettings, DRAW_CONFIG, DRAW_SETTINGS};

/// How long after the configured draw time a scheduled run may still start.
pub const DRAW_WINDOW_MINUTES: i64 = 60;

/// The configured draw time within `week`.
pub fn draw_time(week: WeekId, settings: &DrawSettings) -> DateTime<Utc> {
    // Weeks start on Monday; draw_day counts from Sunday
    let offset_days = match settings.draw_day % 7 {
        0 => 6,
        day => day as i64 - 1,
    };
    week.start() + Duration::days(offset_days) + Duration::hours(settings.draw_hour.min(23) as i64)
}

/// The first draw time strictly after `now`.
pub fn next_draw_time(now: DateTime<Utc>, settings: &DrawSettings) -> DateTime<Utc> {
    let week = WeekId::from_datetime(now);
    let this_week = draw_time(week, settings);
    if this_week > now {
        this_week
    } else {
        draw_time(WeekId::from_datetime(now + Duration::days(7)), settings)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub draw_week: Option<WeekId>,
    pub draw_reminder_sent: bool,
    pub claim_reminders: usize,
}

#[derive(Debug, Default)]
struct SchedulerState {
    last_reminder_week: Option<WeekId>,
    last_claim_reminder_day: Option<NaiveDate>,
}

/// Decides, once per tick, whether the draw is due and which reminders go
/// out. Reminder bookkeeping lives in memory, so a restart may repeat at
/// most one reminder of each kind.
pub struct Scheduler {
    executor: Arc<DrawExecutor>,
    state: Mutex<SchedulerState>,
}

impl Scheduler {
    pub fn new(executor: Arc<DrawExecutor>) -> Self {
        Self {
            executor,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    fn store(&self) -> &dyn Store {
        self.executor.store().as_ref()
    }

    fn notifier(&self) -> &dyn Notifier {
        self.executor.notifier().as_ref()
    }

    pub async fn tick(&self, env: &Env) -> Result<TickReport, DistributorError> {
        let settings = DRAW_SETTINGS.load(self.store())?;
        let mut report = TickReport::default();

        if !settings.enabled {
            debug!("draws disabled, scheduler idle");
            return Ok(report);
        }

        report.draw_reminder_sent = self.draw_reminder(env, &settings);
        report.claim_reminders = self.claim_reminders(env)?;

        let week = env.week();
        let draw_at = draw_time(week, &settings);
        let in_window =
            env.now >= draw_at && env.now < draw_at + Duration::minutes(DRAW_WINDOW_MINUTES);
        if in_window && self.draw_due(week)? {
            report.draw_week = Some(week);
            match self.executor.run(env, week, RunTrigger::Scheduled).await {
                Ok(draw) => info!(
                    event = "lucky_scheduled_draw",
                    %week,
                    winners = draw.winners.len(),
                    "scheduled draw finished"
                ),
                // Already persisted as failed and reported by the executor
                Err(e) => warn!(%week, error = %e, "scheduled draw did not complete"),
            }
        }
        Ok(report)
    }

    /// Anything short of a completed draw is retried while the window is
    /// open.
    fn draw_due(&self, week: WeekId) -> Result<bool, DistributorError> {
        Ok(self
            .store()
            .get_draw(&week)?
            .map_or(true, |draw| draw.status != DrawStatus::Completed))
    }

    fn draw_reminder(&self, env: &Env, settings: &DrawSettings) -> bool {
        let email = settings.notification_email.trim();
        if email.is_empty() || settings.notification_hours == 0 {
            return false;
        }

        let draw_at = next_draw_time(env.now, settings);
        let lead = Duration::hours(settings.notification_hours as i64);
        if draw_at
            .checked_sub_signed(lead)
            .is_some_and(|opens| env.now < opens)
        {
            return false;
        }

        let week = WeekId::from_datetime(draw_at);
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if state.last_reminder_week == Some(week) {
            return false;
        }
        state.last_reminder_week = Some(week);
        drop(state);

        self.notifier().notify(Notification::DrawReminder {
            email: email.to_string(),
            week,
            draw_at,
        });
        true
    }

    fn claim_reminders(&self, env: &Env) -> Result<usize, DistributorError> {
        let today = env.now.date_naive();
        {
            let Ok(state) = self.state.lock() else {
                return Ok(0);
            };
            if state.last_claim_reminder_day == Some(today) {
                return Ok(0);
            }
        }

        let config = DRAW_CONFIG.load(self.store())?;
        let cutoff = env
            .now
            .checked_sub_signed(Duration::days(config.notification_days as i64))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut sent = 0;
        for draw in self.store().list_draws()? {
            if draw.status != DrawStatus::Completed
                || !draw.completed_at.is_some_and(|at| at > cutoff)
            {
                continue;
            }
            for winner in draw.winners.iter().filter(|w| w.claim_status.is_none()) {
                self.notifier().notify(Notification::ClaimReminder {
                    uid: winner.uid.clone(),
                    week: draw.week,
                    prize_amount: winner.prize_amount,
                });
                sent += 1;
            }
        }

        match self.state.lock() {
            Ok(mut state) => state.last_claim_reminder_day = Some(today),
            Err(_) => error!("scheduler state poisoned"),
        }
        if sent > 0 {
            info!(event = "lucky_claim_reminders", count = sent, "claim reminders sent");
        }
        Ok(sent)
    }
}
