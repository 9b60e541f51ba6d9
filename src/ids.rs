//! Call identifiers.
//!
//! A [`CallId`] is a ULID: it sorts by issue time, so log lines for one call
//! can be correlated by id and calls ordered without a separate timestamp. A
//! transport can propagate a caller's id through the `x-call-id` metadata entry
//! (see [`Call::with_metadata`](crate::context::Call::with_metadata)).

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

/// Identifier of one invocation, carried on the call and in every log line for it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct CallId(Ulid);

/// A metadata value that is not a ULID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCallId {
    value: String,
}

impl fmt::Display for InvalidCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid call id '{}': expected a 26-character ULID", self.value)
    }
}

impl std::error::Error for InvalidCallId {}

impl CallId {
    /// Issue a fresh id stamped with the current time
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Parse an id propagated by the caller. Surrounding whitespace is ignored;
    /// anything that is not a ULID yields `None`.
    #[must_use]
    pub fn from_metadata(value: &str) -> Option<Self> {
        value.trim().parse().ok()
    }

    /// When the id was issued, to millisecond precision
    #[must_use]
    pub fn issued_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.0.timestamp_ms())
    }

    /// The underlying ULID
    #[must_use]
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::generate()
    }
}

impl From<Ulid> for CallId {
    fn from(id: Ulid) -> Self {
        Self(id)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for CallId {
    type Err = InvalidCallId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self).map_err(|_| InvalidCallId {
            value: s.to_string(),
        })
    }
}

impl Serialize for CallId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CallId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propagated_id_is_reused() {
        let id = CallId::generate();
        assert_eq!(CallId::from_metadata(&format!(" {id}\n")), Some(id));
    }

    #[test]
    fn garbage_is_rejected_with_reason() {
        assert_eq!(CallId::from_metadata("not-a-ulid"), None);
        let err = "not-a-ulid".parse::<CallId>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid call id 'not-a-ulid': expected a 26-character ULID"
        );
    }

    #[test]
    fn ids_carry_issue_time() {
        let before = SystemTime::now() - Duration::from_millis(1);
        let id = CallId::generate();
        assert!(id.issued_at() >= before);
        assert!(id.issued_at() <= SystemTime::now());
    }

    #[test]
    fn serializes_as_string() {
        let id = CallId::generate();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
        assert_eq!(serde_json::from_value::<CallId>(json).unwrap(), id);
        assert!(serde_json::from_value::<CallId>(serde_json::json!("nope")).is_err());
    }
}
