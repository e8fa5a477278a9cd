//! Notifications pushed by the lock service.
//!
//! The service stamps every notification with epoch milliseconds. Some
//! deployments send the stamp as a JSON number, others as a numeric string,
//! so decoding accepts both and normalizes to a [`SystemTime`].

use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Outcome code reported by the service.
///
/// The service defines the set of codes; the ones it is known to emit get
/// their own variant and anything else is preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    /// Request succeeded.
    Ok,
    /// Request was refused.
    Fail,
    /// Lock is held elsewhere; the client was queued.
    Wait,
    /// A lock the client waited on was released; retry now.
    Retry,
    /// Any other code.
    Other(String),
}

impl Status {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "OK",
            Self::Fail => "FAIL",
            Self::Wait => "WAIT",
            Self::Retry => "RETRY",
            Self::Other(code) => code,
        }
    }
}

impl From<String> for Status {
    fn from(code: String) -> Self {
        match code.as_str() {
            "OK" => Self::Ok,
            "FAIL" => Self::Fail,
            "WAIT" => Self::Wait,
            "RETRY" => Self::Retry,
            _ => Self::Other(code),
        }
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        match status {
            Status::Other(code) => code,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded service notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// When the service produced the notification.
    pub time: SystemTime,
    /// Outcome code.
    pub status: Status,
    /// Human-readable detail.
    pub message: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTime {
    Integer(u64),
    Float(f64),
    Text(String),
}

#[derive(Deserialize)]
struct WireNotification {
    time: WireTime,
    status: Status,
    message: String,
}

#[derive(Serialize)]
struct OutgoingNotification<'a> {
    time: u64,
    status: &'a str,
    message: &'a str,
}

fn millis_from_float(value: f64) -> Option<u64> {
    if value.is_finite() && value >= 0.0 && value < u64::MAX as f64 {
        Some(value.trunc() as u64)
    } else {
        None
    }
}

impl WireTime {
    fn epoch_millis(&self) -> Result<u64> {
        let millis = match self {
            Self::Integer(millis) => Some(*millis),
            Self::Float(value) => millis_from_float(*value),
            Self::Text(text) => {
                let text = text.trim();
                text.parse::<u64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(millis_from_float))
            },
        };
        millis.ok_or_else(|| ProtocolError::InvalidTime { value: self.to_string() })
    }
}

impl fmt::Display for WireTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value:?}"),
        }
    }
}

impl Notification {
    /// Build a notification stamped `millis` after the Unix epoch.
    pub fn at_epoch_millis(
        millis: u64,
        status: Status,
        message: impl Into<String>,
    ) -> Result<Self> {
        let time = UNIX_EPOCH
            .checked_add(Duration::from_millis(millis))
            .ok_or_else(|| ProtocolError::InvalidTime { value: millis.to_string() })?;
        Ok(Self { time, status, message: message.into() })
    }

    /// Parse a notification frame.
    ///
    /// # Errors
    ///
    /// `Json` if the frame is not a JSON object with `time`, `status` and
    /// `message`; `InvalidTime` if `time` is not a non-negative number.
    pub fn decode(raw: &str) -> Result<Self> {
        let wire: WireNotification = serde_json::from_str(raw)?;
        let millis = wire.time.epoch_millis()?;
        Self::at_epoch_millis(millis, wire.status, wire.message)
    }

    /// Serialize with a numeric `time` field.
    pub fn encode(&self) -> Result<String> {
        let out = OutgoingNotification {
            time: self.epoch_millis(),
            status: self.status.as_str(),
            message: &self.message,
        };
        Ok(serde_json::to_string(&out)?)
    }

    /// Milliseconds since the Unix epoch, saturating at zero for earlier
    /// times.
    pub fn epoch_millis(&self) -> u64 {
        self.time
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn numeric_time() {
        let n = Notification::decode(r#"{"time": 1000, "status":"OK", "message":"locked"}"#)
            .unwrap();
        assert_eq!(n.time, UNIX_EPOCH + Duration::from_millis(1000));
        assert_eq!(n.status, Status::Ok);
        assert_eq!(n.message, "locked");
    }

    #[test]
    fn string_time_matches_numeric_time() {
        let numeric =
            Notification::decode(r#"{"time": 1000, "status":"OK", "message":"locked"}"#).unwrap();
        let text =
            Notification::decode(r#"{"time": "1000", "status":"OK", "message":"locked"}"#).unwrap();
        assert_eq!(numeric, text);
    }

    #[test]
    fn fractional_time_truncates() {
        let n = Notification::decode(r#"{"time": 1000.9, "status":"WAIT", "message":"m"}"#)
            .unwrap();
        assert_eq!(n.epoch_millis(), 1000);

        let n = Notification::decode(r#"{"time": " 42.5 ", "status":"WAIT", "message":"m"}"#)
            .unwrap();
        assert_eq!(n.epoch_millis(), 42);
    }

    #[test]
    fn non_numeric_time_is_rejected() {
        let result = Notification::decode(r#"{"time": "noon", "status":"OK", "message":"m"}"#);
        assert!(matches!(result, Err(ProtocolError::InvalidTime { .. })));

        let result = Notification::decode(r#"{"time": -5, "status":"OK", "message":"m"}"#);
        assert!(matches!(result, Err(ProtocolError::InvalidTime { .. })));
    }

    #[test]
    fn missing_fields_are_rejected() {
        assert!(Notification::decode(r#"{"status":"OK","message":"m"}"#).is_err());
        assert!(Notification::decode(r#"{"time":1,"message":"m"}"#).is_err());
        assert!(Notification::decode(r#"{"time":1,"status":"OK"}"#).is_err());
    }

    #[test]
    fn invalid_syntax_is_rejected() {
        assert!(matches!(Notification::decode("{not json"), Err(ProtocolError::Json(_))));
        assert!(matches!(Notification::decode(""), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn extra_fields_are_ignored() {
        let n = Notification::decode(r#"{"time":7,"status":"RETRY","message":"l","seq":3}"#)
            .unwrap();
        assert_eq!(n.status, Status::Retry);
    }

    #[test]
    fn unknown_status_is_preserved() {
        let n =
            Notification::decode(r#"{"time":7,"status":"EXPIRED","message":"l"}"#).unwrap();
        assert_eq!(n.status, Status::Other("EXPIRED".into()));
        assert_eq!(n.status.to_string(), "EXPIRED");
    }

    #[test]
    fn encode_uses_numeric_time() {
        let n = Notification::at_epoch_millis(1000, Status::Fail, "lock owned by bob").unwrap();
        assert_eq!(
            n.encode().unwrap(),
            r#"{"time":1000,"status":"FAIL","message":"lock owned by bob"}"#
        );
    }

    proptest! {
        #[test]
        fn decode_never_panics(raw in ".{0,64}") {
            let _ = Notification::decode(&raw);
        }

        #[test]
        fn string_and_number_agree(millis in 0u64..=4_102_444_800_000) {
            let numeric = format!(r#"{{"time":{millis},"status":"OK","message":"m"}}"#);
            let text = format!(r#"{{"time":"{millis}","status":"OK","message":"m"}}"#);
            prop_assert_eq!(
                Notification::decode(&numeric).unwrap(),
                Notification::decode(&text).unwrap()
            );
        }
    }
}
