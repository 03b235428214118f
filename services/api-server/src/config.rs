use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use lucky_drand_beacon::state::DEFAULT_DRAND_URL;
use lucky_subscription_hub::payments::RAZORPAY_API_URL;
use lucky_subscription_hub::state::MAX_PERIOD_DAYS;
use lucky_subscription_hub::HubConfig;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://lucky.db";

/// Variables `lucky start` checks before spawning the server.
pub const REQUIRED_VARS: [&str; 2] = ["RAZORPAY_KEY_ID", "RAZORPAY_KEY_SECRET"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {key}")]
    Missing { key: String },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub firestore_export_dir: Option<PathBuf>,
    pub firebase_project_id: Option<String>,
    pub use_firebase_as_primary: bool,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_api_url: String,
    /// `APP_ENV=development` enables the `x-dev-user-email` header
    pub dev_mode: bool,
    pub admin_emails: Vec<String>,
    pub hub: HubConfig,
    pub drand_url: String,
    pub scheduler_enabled: bool,
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let use_firebase_as_primary = vars.flag("USE_FIREBASE_AS_PRIMARY", false)?;
        let firestore_export_dir = vars.optional("FIRESTORE_EXPORT_DIR").map(PathBuf::from);
        let firebase_project_id = vars.optional("VITE_FIREBASE_PROJECT_ID");
        if use_firebase_as_primary {
            if firestore_export_dir.is_none() {
                return Err(missing("FIRESTORE_EXPORT_DIR"));
            }
            if firebase_project_id.is_none() {
                return Err(missing("VITE_FIREBASE_PROJECT_ID"));
            }
        }

        let defaults = HubConfig::default();
        let hub = HubConfig {
            subscription_amount: vars.parse("SUBSCRIPTION_AMOUNT", defaults.subscription_amount)?,
            period_days: vars.parse("SUBSCRIPTION_PERIOD_DAYS", defaults.period_days)?,
        };
        if hub.subscription_amount == 0 {
            return Err(invalid("SUBSCRIPTION_AMOUNT", "must be positive"));
        }
        if !(1..=MAX_PERIOD_DAYS).contains(&hub.period_days) {
            return Err(invalid(
                "SUBSCRIPTION_PERIOD_DAYS",
                format!("must be between 1 and {MAX_PERIOD_DAYS}"),
            ));
        }

        Ok(Self {
            port: vars.parse("PORT", DEFAULT_PORT)?,
            database_url: vars.or_default("DATABASE_URL", DEFAULT_DATABASE_URL),
            firestore_export_dir,
            firebase_project_id,
            use_firebase_as_primary,
            razorpay_key_id: vars.required("RAZORPAY_KEY_ID")?,
            razorpay_key_secret: vars.required("RAZORPAY_KEY_SECRET")?,
            razorpay_api_url: vars.or_default("RAZORPAY_API_URL", RAZORPAY_API_URL),
            dev_mode: vars
                .optional("APP_ENV")
                .is_some_and(|v| v.eq_ignore_ascii_case("development")),
            admin_emails: vars
                .optional("ADMIN_EMAILS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            hub,
            drand_url: vars.or_default("DRAND_URL", DEFAULT_DRAND_URL),
            scheduler_enabled: vars.flag("SCHEDULER_ENABLED", true)?,
            cors_origin: vars.optional("CORS_ORIGIN"),
        })
    }
}

fn missing(key: &str) -> ConfigError {
    ConfigError::Missing {
        key: key.to_string(),
    }
}

fn invalid(key: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Comma-separated, trimmed, lowercased, empties dropped.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key).ok_or_else(|| missing(key))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + Display,
        T::Err: Display,
    {
        match self.optional(key) {
            None => {
                info!("{key} not set, using default: {default}");
                Ok(default)
            }
            Some(raw) => raw.parse().map_err(|e| {
                warn!("Invalid {key} value: {e}");
                invalid(key, e)
            }),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(key).as_deref() {
            None => Ok(default),
            Some("1" | "true" | "TRUE" | "yes" | "YES") => Ok(true),
            Some("0" | "false" | "FALSE" | "no" | "NO") => Ok(false),
            Some(other) => {
                warn!("Invalid {key} value: {other}");
                Err(invalid(key, format!("expected a boolean, got {other:?}")))
            }
        }
    }
}
