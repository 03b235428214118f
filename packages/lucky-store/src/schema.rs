use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::StoreError;

pub const SCHEMA_NAME: &str = "crates.io:lucky-store";
pub const SCHEMA_VERSION: u32 = 1;

const V1: &str = "
CREATE TABLE IF NOT EXISTS users (
    uid TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    display_name TEXT,
    referral_code TEXT NOT NULL,
    referred_by TEXT,
    is_admin INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_email ON users(email COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS idx_users_referral_code ON users(referral_code);

CREATE TABLE IF NOT EXISTS subscriptions (
    uid TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    amount INTEGER NOT NULL,
    order_id TEXT,
    payment_id TEXT,
    started_at TEXT,
    current_period_end TEXT,
    cancelled_at TEXT,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rewards (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    amount INTEGER NOT NULL,
    week TEXT,
    active INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS draws (
    week TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    winners TEXT NOT NULL,
    total_prize_pool INTEGER NOT NULL,
    total_revenue INTEGER NOT NULL,
    entrant_count INTEGER NOT NULL,
    entrants TEXT NOT NULL DEFAULT '[]',
    entrants_root TEXT,
    randomness TEXT,
    randomness_source TEXT,
    attempts INTEGER NOT NULL,
    failure_reason TEXT,
    created_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS claims (
    id TEXT PRIMARY KEY,
    uid TEXT NOT NULL,
    week TEXT NOT NULL,
    prize_amount INTEGER NOT NULL,
    status TEXT NOT NULL,
    payout_details TEXT NOT NULL,
    admin_note TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (uid, week)
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Ordered migrations; entry `i` upgrades the schema to version `i + 1`.
const MIGRATIONS: &[&str] = &[V1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
}

fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()?)
}

/// Create or upgrade the schema. Refuses databases that belong to another
/// schema or were written by a newer version.
pub fn migrate(conn: &mut Connection) -> Result<MigrationReport, StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
    )?;

    if let Some(name) = read_meta(conn, "schema_name")? {
        if name != SCHEMA_NAME {
            return Err(StoreError::SchemaMismatch {
                expected: SCHEMA_NAME.to_string(),
                found: name,
            });
        }
    }

    let from_version = read_meta(conn, "schema_version")?
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0);
    if from_version > SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found: from_version,
            supported: SCHEMA_VERSION,
        });
    }

    let tx = conn.transaction()?;
    for (index, sql) in MIGRATIONS.iter().enumerate().skip(from_version as usize) {
        tx.execute_batch(sql)?;
        info!(version = index + 1, "applied schema migration");
    }
    tx.execute(
        "INSERT INTO meta (key, value) VALUES ('schema_name', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![SCHEMA_NAME],
    )?;
    tx.execute(
        "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![SCHEMA_VERSION.to_string()],
    )?;
    tx.commit()?;

    Ok(MigrationReport {
        from_version,
        to_version: SCHEMA_VERSION,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_fresh_then_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        let first = migrate(&mut conn).unwrap();
        assert_eq!(first.from_version, 0);
        assert_eq!(first.to_version, SCHEMA_VERSION);

        let second = migrate(&mut conn).unwrap();
        assert_eq!(second.from_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_migrate_rejects_foreign_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             INSERT INTO meta VALUES ('schema_name', 'crates.io:something-else');",
        )
        .unwrap();
        let err = migrate(&mut conn).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_migrate_rejects_newer_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             INSERT INTO meta VALUES ('schema_version', '99');",
        )
        .unwrap();
        let err = migrate(&mut conn).unwrap_err();
        assert!(matches!(
            err,
            StoreError::SchemaTooNew {
                found: 99,
                supported: SCHEMA_VERSION
            }
        ));
    }
}
