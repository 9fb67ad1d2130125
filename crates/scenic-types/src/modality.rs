//! Answer modalities and typed answer payloads.
//!
//! A [`Modality`] names the shape an answer must come back in; a
//! [`ModalityValue`] is the payload itself, already parsed into that shape.
//! [`ModalityValue::from_json`] is the single place where an oracle's raw
//! JSON answer is coerced into the requested modality, so a response that
//! does not match the request is caught at the boundary rather than leaking
//! downstream as free text.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Modality
// ─────────────────────────────────────────────────────────────────────────────

/// The closed set of answer shapes a query can request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// A list of object node names, e.g. `["yellow_bowl_0"]`.
    Node,
    /// Free-form natural language.
    Text,
    /// True / false.
    Binary,
    /// A single point in time.
    TimePoint,
    /// A start/end pair of timestamps.
    TimeInterval,
    /// A length of time.
    TimeDuration,
    /// A 3-D coordinate `[x, y, z]`.
    Position,
}

impl Modality {
    /// Every modality, in declaration order.
    pub const ALL: [Modality; 7] = [
        Modality::Node,
        Modality::Text,
        Modality::Binary,
        Modality::TimePoint,
        Modality::TimeInterval,
        Modality::TimeDuration,
        Modality::Position,
    ];

    /// The snake_case name used on the wire and in QA datasets.
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Node => "node",
            Modality::Text => "text",
            Modality::Binary => "binary",
            Modality::TimePoint => "time_point",
            Modality::TimeInterval => "time_interval",
            Modality::TimeDuration => "time_duration",
            Modality::Position => "position",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = ModalityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Modality::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ModalityParseError::UnknownModality(s.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failure to interpret a raw answer payload under a requested modality.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModalityParseError {
    #[error("unknown modality '{0}'")]
    UnknownModality(String),
    #[error("answer payload {value} does not fit modality '{modality}'")]
    ShapeMismatch { modality: Modality, value: String },
    #[error("unparseable timestamp '{0}'")]
    BadTimestamp(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// ModalityValue
// ─────────────────────────────────────────────────────────────────────────────

/// A typed answer payload, one variant per [`Modality`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "modality", content = "value", rename_all = "snake_case")]
pub enum ModalityValue {
    /// Object node names answering the query.
    Node(Vec<String>),
    Text(String),
    Binary(bool),
    TimePoint(DateTime<Utc>),
    TimeInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Duration in whole seconds.
    TimeDuration { seconds: u64 },
    Position([f64; 3]),
}

impl ModalityValue {
    /// The modality this payload belongs to.
    pub fn modality(&self) -> Modality {
        match self {
            ModalityValue::Node(_) => Modality::Node,
            ModalityValue::Text(_) => Modality::Text,
            ModalityValue::Binary(_) => Modality::Binary,
            ModalityValue::TimePoint(_) => Modality::TimePoint,
            ModalityValue::TimeInterval { .. } => Modality::TimeInterval,
            ModalityValue::TimeDuration { .. } => Modality::TimeDuration,
            ModalityValue::Position(_) => Modality::Position,
        }
    }

    /// Coerce a raw oracle answer into the requested modality.
    ///
    /// `Ok(None)` means the oracle explicitly declined to answer (JSON
    /// `null` or the literal string `"None"`, which hosted models commonly
    /// emit).  Any payload that cannot be read as the requested shape is a
    /// [`ModalityParseError::ShapeMismatch`].
    pub fn from_json(modality: Modality, raw: &Value) -> Result<Option<Self>, ModalityParseError> {
        if raw.is_null() {
            return Ok(None);
        }
        if let Some(s) = raw.as_str()
            && matches!(s.trim(), "None" | "none" | "null" | "")
        {
            return Ok(None);
        }

        let mismatch = || ModalityParseError::ShapeMismatch {
            modality,
            value: raw.to_string(),
        };

        let value = match modality {
            Modality::Node => {
                let names = match raw {
                    Value::Array(items) => items
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).ok_or_else(mismatch))
                        .collect::<Result<Vec<_>, _>>()?,
                    // A bare name is accepted as a single-element list.
                    Value::String(name) => vec![name.clone()],
                    _ => return Err(mismatch()),
                };
                ModalityValue::Node(names)
            }
            Modality::Text => match raw {
                Value::String(s) => ModalityValue::Text(s.clone()),
                _ => return Err(mismatch()),
            },
            Modality::Binary => match raw {
                Value::Bool(b) => ModalityValue::Binary(*b),
                Value::String(s) => match s.trim() {
                    "True" | "true" => ModalityValue::Binary(true),
                    "False" | "false" => ModalityValue::Binary(false),
                    _ => return Err(mismatch()),
                },
                _ => return Err(mismatch()),
            },
            Modality::TimePoint => {
                let s = raw.as_str().ok_or_else(mismatch)?;
                ModalityValue::TimePoint(parse_timestamp(s)?)
            }
            Modality::TimeInterval => match raw {
                Value::String(s) => {
                    let (start, end) = s.split_once(" - ").ok_or_else(mismatch)?;
                    ModalityValue::TimeInterval {
                        start: parse_timestamp(start)?,
                        end: parse_timestamp(end)?,
                    }
                }
                Value::Object(map) => {
                    let field = |key: &str| -> Result<DateTime<Utc>, ModalityParseError> {
                        let s = map.get(key).and_then(Value::as_str).ok_or_else(mismatch)?;
                        parse_timestamp(s)
                    };
                    ModalityValue::TimeInterval {
                        start: field("start")?,
                        end: field("end")?,
                    }
                }
                _ => return Err(mismatch()),
            },
            Modality::TimeDuration => match raw {
                Value::Number(n) => {
                    let seconds = n.as_f64().filter(|s| *s >= 0.0).ok_or_else(mismatch)?;
                    ModalityValue::TimeDuration {
                        seconds: seconds.round() as u64,
                    }
                }
                Value::String(s) => ModalityValue::TimeDuration {
                    seconds: parse_hms(s).ok_or_else(mismatch)?,
                },
                _ => return Err(mismatch()),
            },
            Modality::Position => {
                let items = raw.as_array().filter(|a| a.len() == 3).ok_or_else(mismatch)?;
                let mut coords = [0.0; 3];
                for (slot, item) in coords.iter_mut().zip(items) {
                    *slot = item.as_f64().ok_or_else(mismatch)?;
                }
                ModalityValue::Position(coords)
            }
        };
        Ok(Some(value))
    }
}

impl fmt::Display for ModalityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModalityValue::Node(names) => {
                write!(f, "[")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{name}\"")?;
                }
                write!(f, "]")
            }
            ModalityValue::Text(s) => f.write_str(s),
            ModalityValue::Binary(true) => f.write_str("True"),
            ModalityValue::Binary(false) => f.write_str("False"),
            ModalityValue::TimePoint(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            ModalityValue::TimeInterval { start, end } => write!(
                f,
                "{} - {}",
                start.format("%Y-%m-%d %H:%M:%S"),
                end.format("%Y-%m-%d %H:%M:%S")
            ),
            ModalityValue::TimeDuration { seconds } => {
                write!(f, "{:02}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
            }
            ModalityValue::Position([x, y, z]) => write!(f, "[{x}, {y}, {z}]"),
        }
    }
}

/// Parse a wire timestamp, mapping failure into the modality error space.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ModalityParseError> {
    crate::time::parse_flexible_timestamp(s)
        .ok_or_else(|| ModalityParseError::BadTimestamp(s.trim().to_string()))
}

/// Parse `hh:mm:ss` into seconds.
fn parse_hms(s: &str) -> Option<u64> {
    let mut parts = s.trim().splitn(3, ':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    if minutes >= 60 || seconds >= 60 {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}
