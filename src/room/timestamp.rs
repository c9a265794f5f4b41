use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

/// A point in time as milliseconds since the Unix epoch.
///
/// Deserializes from every shape a stored timestamp shows up in: plain or fractional
/// millis, `{seconds, nanoseconds}` objects (either spelling), and RFC 3339 strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EpochMillis(pub i64);

impl EpochMillis {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// Milliseconds from `earlier` to `self`, negative if `earlier` is in the future
    pub fn millis_since(self, earlier: EpochMillis) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn has_elapsed(self, since: EpochMillis, limit: Duration) -> bool {
        let limit = i64::try_from(limit.as_millis()).unwrap_or(i64::MAX);
        self.millis_since(since) > limit
    }

    pub fn saturating_sub(self, duration: Duration) -> Self {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self(self.0.saturating_sub(millis))
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

impl fmt::Display for EpochMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(datetime) => write!(f, "{}", datetime.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    FractionalMillis(f64),
    Native { seconds: i64, nanoseconds: i64 },
    Serialized { _seconds: i64, _nanoseconds: i64 },
    Text(String),
}

fn from_parts(seconds: i64, nanoseconds: i64) -> EpochMillis {
    EpochMillis(
        seconds
            .saturating_mul(1000)
            .saturating_add(nanoseconds / 1_000_000),
    )
}

impl<'de> Deserialize<'de> for EpochMillis {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Millis(millis) => Ok(EpochMillis(millis)),
            RawTimestamp::FractionalMillis(millis) if millis.is_finite() => {
                Ok(EpochMillis(millis.round() as i64))
            }
            RawTimestamp::FractionalMillis(millis) => Err(de::Error::custom(format!(
                "timestamp is not finite: {}",
                millis
            ))),
            RawTimestamp::Native {
                seconds,
                nanoseconds,
            } => Ok(from_parts(seconds, nanoseconds)),
            RawTimestamp::Serialized {
                _seconds,
                _nanoseconds,
            } => Ok(from_parts(_seconds, _nanoseconds)),
            RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|datetime| EpochMillis(datetime.timestamp_millis()))
                .map_err(|e| de::Error::custom(format!("invalid timestamp '{}': {}", text, e))),
        }
    }
}
