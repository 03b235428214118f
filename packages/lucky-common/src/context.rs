use chrono::{DateTime, Utc};

use crate::week::WeekId;

/// Execution environment handed to every operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Env {
    pub now: DateTime<Utc>,
}

impl Env {
    pub fn now() -> Self {
        Self { now: Utc::now() }
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn week(&self) -> WeekId {
        WeekId::from_datetime(self.now)
    }
}

/// The authenticated principal behind a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub uid: String,
    pub email: Option<String>,
    pub is_admin: bool,
}

impl Caller {
    pub fn user(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            is_admin: false,
        }
    }

    pub fn admin(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            is_admin: true,
        }
    }

    /// True when the caller may act on `uid`'s data.
    pub fn can_access(&self, uid: &str) -> bool {
        self.is_admin || self.uid == uid
    }
}
