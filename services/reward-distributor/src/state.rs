use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use lucky_store::Store;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::DistributorError;

pub const DRAW_CONFIG: Setting<DrawConfig> = Setting::new("draw_config");
pub const DRAW_SETTINGS: Setting<DrawSettings> = Setting::new("draw_settings");

/// Typed handle on one singleton record in the settings table.
pub struct Setting<T> {
    key: &'static str,
    value: PhantomData<fn() -> T>,
}

impl<T> Setting<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            value: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn may_load(&self, store: &dyn Store) -> Result<Option<T>, DistributorError> {
        store
            .load_setting(self.key)?
            .map(|v| serde_json::from_value(v).map_err(DistributorError::from))
            .transpose()
    }

    /// The stored value, or the default when nothing has been saved yet.
    pub fn load(&self, store: &dyn Store) -> Result<T, DistributorError> {
        Ok(self.may_load(store)?.unwrap_or_default())
    }

    pub fn save(
        &self,
        store: &dyn Store,
        value: &T,
        now: DateTime<Utc>,
    ) -> Result<(), DistributorError> {
        store.save_setting(self.key, &serde_json::to_value(value)?, now)?;
        Ok(())
    }
}

/// Payout split and winner policy.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct DrawConfig {
    /// Share of revenue paid out as prizes
    pub draw_percentage: u8,
    pub profit_percentage: u8,
    pub maintenance_percentage: u8,
    pub winners_per_draw: u32,
    /// Floor for a single prize, in rupees
    pub minimum_reward: u64,
    /// Cool-down between wins for one subscriber
    pub eligibility_days: u32,
    /// Days after a draw during which unclaimed winners are reminded
    pub notification_days: u32,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            draw_percentage: 50,
            profit_percentage: 30,
            maintenance_percentage: 20,
            winners_per_draw: 1,
            minimum_reward: 500,
            eligibility_days: 28,
            notification_days: 7,
        }
    }
}

/// When draws run and how failures are handled.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct DrawSettings {
    pub enabled: bool,
    /// 0 = Sunday .. 6 = Saturday
    pub draw_day: u8,
    /// 0..=23, UTC
    pub draw_hour: u8,
    /// Lead time of the pre-draw reminder
    pub notification_hours: u32,
    pub notification_email: String,
    pub backup_draw_enabled: bool,
    pub max_draw_attempts: u8,
}

impl Default for DrawSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            draw_day: 0,
            draw_hour: 18,
            notification_hours: 24,
            notification_email: String::new(),
            backup_draw_enabled: true,
            max_draw_attempts: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lucky_store::SqlStore;

    #[test]
    fn test_load_defaults_then_saved_value() {
        let store = SqlStore::open_in_memory().unwrap();
        assert_eq!(DRAW_CONFIG.may_load(&store).unwrap(), None);
        assert_eq!(DRAW_CONFIG.load(&store).unwrap(), DrawConfig::default());

        let settings = DrawSettings {
            draw_day: 3,
            notification_email: "ops@example.com".to_string(),
            ..DrawSettings::default()
        };
        DRAW_SETTINGS.save(&store, &settings, Utc::now()).unwrap();
        assert_eq!(DRAW_SETTINGS.load(&store).unwrap(), settings);
    }

    #[test]
    fn test_partial_documents_fill_defaults() {
        let parsed: DrawSettings = serde_json::from_str(r#"{"draw_hour": 9}"#).unwrap();
        assert_eq!(parsed.draw_hour, 9);
        assert_eq!(parsed.max_draw_attempts, 3);
        assert!(parsed.enabled);
    }

    #[test]
    fn test_malformed_setting_is_reported() {
        let store = SqlStore::open_in_memory().unwrap();
        store
            .save_setting("draw_config", &serde_json::json!({"winners_per_draw": "many"}), Utc::now())
            .unwrap();
        assert!(matches!(
            DRAW_CONFIG.load(&store),
            Err(DistributorError::MalformedSetting(_))
        ));
    }
}
