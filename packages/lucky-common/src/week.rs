use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc, Weekday};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeekIdError {
    #[error("invalid week id {value:?}: expected YYYY-WW")]
    Format { value: String },

    #[error("week {week} does not exist in ISO year {year}")]
    OutOfRange { year: i32, week: u32 },
}

/// ISO-8601 week identifier, rendered as `YYYY-WW` (e.g. `2026-07`).
///
/// Every draw is keyed by the week it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeekId {
    year: i32,
    week: u32,
}

impl WeekId {
    pub fn new(year: i32, week: u32) -> Result<Self, WeekIdError> {
        if NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).is_none() {
            return Err(WeekIdError::OutOfRange { year, week });
        }
        Ok(Self { year, week })
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let iso = at.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn week(&self) -> u32 {
        self.week
    }

    /// Monday 00:00 UTC of this week.
    pub fn start(&self) -> DateTime<Utc> {
        let monday = NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
            .unwrap_or(NaiveDate::MIN);
        Utc.from_utc_datetime(&monday.and_hms_opt(0, 0, 0).unwrap_or_default())
    }

    pub fn previous(&self) -> Self {
        Self::from_datetime(self.start() - chrono::Duration::days(7))
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.week)
    }
}

impl FromStr for WeekId {
    type Err = WeekIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_err = || WeekIdError::Format {
            value: s.to_string(),
        };
        let (year, week) = s.split_once('-').ok_or_else(format_err)?;
        if year.len() != 4 || week.len() != 2 {
            return Err(format_err());
        }
        let year: i32 = year.parse().map_err(|_| format_err())?;
        let week: u32 = week.parse().map_err(|_| format_err())?;
        WeekId::new(year, week)
    }
}

impl Serialize for WeekId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WeekId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for WeekId {
    fn schema_name() -> String {
        "WeekId".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}
