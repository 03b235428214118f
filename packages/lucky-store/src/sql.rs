use std::error::Error as StdError;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lucky_common::{Claim, Collection, Draw, Record, Reward, Subscription, User, WeekId};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::schema::{self, MigrationReport};
use crate::store::Store;

/// Relational store backed by SQLite.
pub struct SqlStore {
    conn: Mutex<Connection>,
}

impl SqlStore {
    /// Open the database named by `url`: `sqlite://path`, `sqlite:path`, a
    /// plain path, or `:memory:`.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        if path.is_empty() {
            return Err(StoreError::InvalidUrl {
                url: url.to_string(),
            });
        }
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            let conn = Connection::open(Path::new(path))?;
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!(path, journal_mode = %mode, "opened sqlite database");
            conn
        };
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self::open(":memory:")?;
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<MigrationReport, StoreError> {
        schema::migrate(&mut *self.lock()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run `f` inside one transaction. Commits when `f` succeeds; the
    /// transaction is rolled back when it is dropped on the error path.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        match f(&tx) {
            Ok(out) => {
                tx.commit()?;
                Ok(out)
            }
            Err(e) => {
                warn!(error = %e, "rolling back transaction");
                Err(e)
            }
        }
    }

    /// Number of rows in a collection's table.
    pub fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", collection.as_str());
        let count: i64 = self.lock()?.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

// ─── Row conversion helpers ───

fn conversion_err<E>(idx: usize, ty: Type, e: E) -> rusqlite::Error
where
    E: StdError + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(e))
}

fn ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, Type::Text, e))
}

fn opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| {
        DateTime::parse_from_rfc3339(&r)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| conversion_err(idx, Type::Text, e))
    })
    .transpose()
}

fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_err(idx, Type::Text, e))
}

fn opt_parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| r.parse().map_err(|e| conversion_err(idx, Type::Text, e)))
        .transpose()
}

fn rfc3339(at: &DateTime<Utc>) -> String {
    at.to_rfc3339()
}

fn opt_rfc3339(at: &Option<DateTime<Utc>>) -> Option<String> {
    at.as_ref().map(rfc3339)
}

/// Per-table mapping used by both the [`Store`] impl and the sync job.
pub(crate) trait SqlRecord: Record + Sized {
    fn select(conn: &Connection, key: &str) -> rusqlite::Result<Option<Self>>;
    fn upsert(&self, conn: &Connection) -> rusqlite::Result<()>;
}

const USER_COLUMNS: &str =
    "uid, email, display_name, referral_code, referred_by, is_admin, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        uid: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        referral_code: row.get(3)?,
        referred_by: row.get(4)?,
        is_admin: row.get(5)?,
        created_at: ts(row, 6)?,
        updated_at: ts(row, 7)?,
    })
}

impl SqlRecord for User {
    fn select(conn: &Connection, key: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE uid = ?1"),
            params![key],
            user_from_row,
        )
        .optional()
    }

    fn upsert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO users (uid, email, display_name, referral_code, referred_by, is_admin, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(uid) DO UPDATE SET
                email = excluded.email,
                display_name = excluded.display_name,
                referral_code = excluded.referral_code,
                referred_by = excluded.referred_by,
                is_admin = excluded.is_admin,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
            params![
                self.uid,
                self.email,
                self.display_name,
                self.referral_code,
                self.referred_by,
                self.is_admin,
                rfc3339(&self.created_at),
                rfc3339(&self.updated_at),
            ],
        )?;
        Ok(())
    }
}

const SUBSCRIPTION_COLUMNS: &str =
    "uid, status, amount, order_id, payment_id, started_at, current_period_end, cancelled_at, updated_at";

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        uid: row.get(0)?,
        status: parsed(row, 1)?,
        amount: row.get(2)?,
        order_id: row.get(3)?,
        payment_id: row.get(4)?,
        started_at: opt_ts(row, 5)?,
        current_period_end: opt_ts(row, 6)?,
        cancelled_at: opt_ts(row, 7)?,
        updated_at: ts(row, 8)?,
    })
}

impl SqlRecord for Subscription {
    fn select(conn: &Connection, key: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE uid = ?1"),
            params![key],
            subscription_from_row,
        )
        .optional()
    }

    fn upsert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO subscriptions (uid, status, amount, order_id, payment_id, started_at, current_period_end, cancelled_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(uid) DO UPDATE SET
                status = excluded.status,
                amount = excluded.amount,
                order_id = excluded.order_id,
                payment_id = excluded.payment_id,
                started_at = excluded.started_at,
                current_period_end = excluded.current_period_end,
                cancelled_at = excluded.cancelled_at,
                updated_at = excluded.updated_at",
            params![
                self.uid,
                self.status.as_str(),
                self.amount,
                self.order_id,
                self.payment_id,
                opt_rfc3339(&self.started_at),
                opt_rfc3339(&self.current_period_end),
                opt_rfc3339(&self.cancelled_at),
                rfc3339(&self.updated_at),
            ],
        )?;
        Ok(())
    }
}

const REWARD_COLUMNS: &str = "id, title, description, amount, week, active, created_at";

fn reward_from_row(row: &Row<'_>) -> rusqlite::Result<Reward> {
    Ok(Reward {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        amount: row.get(3)?,
        week: opt_parsed(row, 4)?,
        active: row.get(5)?,
        created_at: ts(row, 6)?,
    })
}

impl SqlRecord for Reward {
    fn select(conn: &Connection, key: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {REWARD_COLUMNS} FROM rewards WHERE id = ?1"),
            params![key],
            reward_from_row,
        )
        .optional()
    }

    fn upsert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO rewards (id, title, description, amount, week, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                amount = excluded.amount,
                week = excluded.week,
                active = excluded.active,
                created_at = excluded.created_at",
            params![
                self.id,
                self.title,
                self.description,
                self.amount,
                self.week.map(|w| w.to_string()),
                self.active,
                rfc3339(&self.created_at),
            ],
        )?;
        Ok(())
    }
}

const DRAW_COLUMNS: &str = "week, status, winners, total_prize_pool, total_revenue, entrant_count, \
     entrants, entrants_root, randomness, randomness_source, attempts, failure_reason, created_at, completed_at";

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, Type::Text, e))
}

fn to_json_column<T: serde::Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn draw_from_row(row: &Row<'_>) -> rusqlite::Result<Draw> {
    Ok(Draw {
        week: parsed(row, 0)?,
        status: parsed(row, 1)?,
        winners: json_column(row, 2)?,
        total_prize_pool: row.get(3)?,
        total_revenue: row.get(4)?,
        entrant_count: row.get(5)?,
        entrants: json_column(row, 6)?,
        entrants_root: row.get(7)?,
        randomness: row.get(8)?,
        randomness_source: row.get(9)?,
        attempts: row.get(10)?,
        failure_reason: row.get(11)?,
        created_at: ts(row, 12)?,
        completed_at: opt_ts(row, 13)?,
    })
}

impl SqlRecord for Draw {
    fn select(conn: &Connection, key: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {DRAW_COLUMNS} FROM draws WHERE week = ?1"),
            params![key],
            draw_from_row,
        )
        .optional()
    }

    fn upsert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO draws (week, status, winners, total_prize_pool, total_revenue, entrant_count,
                entrants, entrants_root, randomness, randomness_source, attempts, failure_reason,
                created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(week) DO UPDATE SET
                status = excluded.status,
                winners = excluded.winners,
                total_prize_pool = excluded.total_prize_pool,
                total_revenue = excluded.total_revenue,
                entrant_count = excluded.entrant_count,
                entrants = excluded.entrants,
                entrants_root = excluded.entrants_root,
                randomness = excluded.randomness,
                randomness_source = excluded.randomness_source,
                attempts = excluded.attempts,
                failure_reason = excluded.failure_reason,
                created_at = excluded.created_at,
                completed_at = excluded.completed_at",
            params![
                self.week.to_string(),
                self.status.as_str(),
                to_json_column(&self.winners)?,
                self.total_prize_pool,
                self.total_revenue,
                self.entrant_count,
                to_json_column(&self.entrants)?,
                self.entrants_root,
                self.randomness,
                self.randomness_source,
                self.attempts,
                self.failure_reason,
                rfc3339(&self.created_at),
                opt_rfc3339(&self.completed_at),
            ],
        )?;
        Ok(())
    }
}

const CLAIM_COLUMNS: &str =
    "id, uid, week, prize_amount, status, payout_details, admin_note, created_at, updated_at";

fn claim_from_row(row: &Row<'_>) -> rusqlite::Result<Claim> {
    Ok(Claim {
        id: row.get(0)?,
        uid: row.get(1)?,
        week: parsed(row, 2)?,
        prize_amount: row.get(3)?,
        status: parsed(row, 4)?,
        payout_details: row.get(5)?,
        admin_note: row.get(6)?,
        created_at: ts(row, 7)?,
        updated_at: ts(row, 8)?,
    })
}

const CLAIM_INSERT: &str = "INSERT INTO claims (id, uid, week, prize_amount, status, payout_details, admin_note, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

fn write_claim(conn: &Connection, claim: &Claim, on_conflict: &str) -> rusqlite::Result<usize> {
    conn.execute(
        &format!("{CLAIM_INSERT}{on_conflict}"),
        params![
            claim.id,
            claim.uid,
            claim.week.to_string(),
            claim.prize_amount,
            claim.status.as_str(),
            claim.payout_details,
            claim.admin_note,
            rfc3339(&claim.created_at),
            rfc3339(&claim.updated_at),
        ],
    )
}

impl SqlRecord for Claim {
    fn select(conn: &Connection, key: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE id = ?1"),
            params![key],
            claim_from_row,
        )
        .optional()
    }

    fn upsert(&self, conn: &Connection) -> rusqlite::Result<()> {
        write_claim(
            conn,
            self,
            " ON CONFLICT(id) DO UPDATE SET
                uid = excluded.uid,
                week = excluded.week,
                prize_amount = excluded.prize_amount,
                status = excluded.status,
                payout_details = excluded.payout_details,
                admin_note = excluded.admin_note,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
        )?;
        Ok(())
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn collect<T>(
    conn: &Connection,
    sql: &str,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], map)?;
    Ok(rows.collect::<rusqlite::Result<Vec<T>>>()?)
}

impl Store for SqlStore {
    fn get_user(&self, uid: &str) -> Result<Option<User>, StoreError> {
        Ok(User::select(&*self.lock()?, uid)?)
    }

    fn put_user(&self, user: &User) -> Result<(), StoreError> {
        Ok(user.upsert(&*self.lock()?)?)
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        collect(
            &*self.lock()?,
            &format!("SELECT {USER_COLUMNS} FROM users ORDER BY uid"),
            user_from_row,
        )
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE LIMIT 1"),
                params![email],
                user_from_row,
            )
            .optional()?)
    }

    fn find_user_by_referral_code(&self, code: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE referral_code = ?1 LIMIT 1"),
                params![code],
                user_from_row,
            )
            .optional()?)
    }

    fn get_subscription(&self, uid: &str) -> Result<Option<Subscription>, StoreError> {
        Ok(Subscription::select(&*self.lock()?, uid)?)
    }

    fn put_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        Ok(subscription.upsert(&*self.lock()?)?)
    }

    fn list_subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        collect(
            &*self.lock()?,
            &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY uid"),
            subscription_from_row,
        )
    }

    fn get_reward(&self, id: &str) -> Result<Option<Reward>, StoreError> {
        Ok(Reward::select(&*self.lock()?, id)?)
    }

    fn put_reward(&self, reward: &Reward) -> Result<(), StoreError> {
        Ok(reward.upsert(&*self.lock()?)?)
    }

    fn list_rewards(&self) -> Result<Vec<Reward>, StoreError> {
        collect(
            &*self.lock()?,
            &format!("SELECT {REWARD_COLUMNS} FROM rewards ORDER BY created_at DESC, id"),
            reward_from_row,
        )
    }

    fn get_draw(&self, week: &WeekId) -> Result<Option<Draw>, StoreError> {
        Ok(Draw::select(&*self.lock()?, &week.to_string())?)
    }

    fn put_draw(&self, draw: &Draw) -> Result<(), StoreError> {
        Ok(draw.upsert(&*self.lock()?)?)
    }

    fn update_draw(
        &self,
        week: &WeekId,
        update: &mut dyn FnMut(&mut Draw),
    ) -> Result<Option<Draw>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let Some(mut draw) = Draw::select(&tx, &week.to_string())? else {
            return Ok(None);
        };
        update(&mut draw);
        draw.upsert(&tx)?;
        tx.commit()?;
        Ok(Some(draw))
    }

    fn list_draws(&self) -> Result<Vec<Draw>, StoreError> {
        collect(
            &*self.lock()?,
            &format!("SELECT {DRAW_COLUMNS} FROM draws ORDER BY week DESC"),
            draw_from_row,
        )
    }

    fn get_claim(&self, id: &str) -> Result<Option<Claim>, StoreError> {
        Ok(Claim::select(&*self.lock()?, id)?)
    }

    fn insert_claim(&self, claim: &Claim) -> Result<(), StoreError> {
        match write_claim(&*self.lock()?, claim, "") {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(StoreError::Conflict {
                collection: Collection::Claims,
                key: claim.id.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn put_claim(&self, claim: &Claim) -> Result<(), StoreError> {
        Ok(claim.upsert(&*self.lock()?)?)
    }

    fn list_claims(&self) -> Result<Vec<Claim>, StoreError> {
        collect(
            &*self.lock()?,
            &format!("SELECT {CLAIM_COLUMNS} FROM claims ORDER BY created_at DESC, id"),
            claim_from_row,
        )
    }

    fn list_claims_for_user(&self, uid: &str) -> Result<Vec<Claim>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claims WHERE uid = ?1 ORDER BY created_at DESC, id"
        ))?;
        let rows = stmt.query_map(params![uid], claim_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn load_setting(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let raw: Option<String> = self
            .lock()?
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.map(|r| serde_json::from_str(&r)).transpose()?)
    }

    fn save_setting(&self, key: &str, value: &Value, now: DateTime<Utc>) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.lock()?.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, raw, rfc3339(&now)],
        )?;
        Ok(())
    }
}
