use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `created_at` of an event, seconds since the epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u32);

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// dates outside the u32 range saturate
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self(datetime.timestamp().clamp(0, u32::MAX as i64) as u32)
    }

    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0 as i64, 0).unwrap_or_default()
    }

    /// calendar day, the way review lists show it
    pub fn date(self) -> String {
        self.to_datetime().format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Timestamp {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::now()
    }
}
