//! The event value object and its wire representation.
//!
//! An [`Event`] is a notification that something changed, not the change
//! itself. Payloads are limited to flat scalar maps (IDs, flags) because
//! cross-process ordering is not guaranteed; listeners should re-fetch the
//! authoritative state instead of trusting payload contents.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::EventError;

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// A single payload value: string, number, boolean or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl PayloadValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PayloadValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PayloadValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PayloadValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PayloadValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PayloadValue::Null)
    }
}

impl From<&str> for PayloadValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for PayloadValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for PayloadValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PayloadValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for PayloadValue {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

/// Non-finite floats have no JSON form and become `Null`.
impl From<f64> for PayloadValue {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Self::Number).unwrap_or(Self::Null)
    }
}

/// Flat key/value payload attached to an event.
pub type Payload = BTreeMap<String, PayloadValue>;

/// Convert an arbitrary JSON value into a [`Payload`].
///
/// Only objects whose values are all scalars (or null) are accepted.
pub fn payload_from_value(value: Value) -> Result<Payload, EventError> {
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(EventError::invalid(format!(
                "payload must be a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Null => PayloadValue::Null,
                Value::Bool(b) => PayloadValue::Bool(b),
                Value::Number(n) => PayloadValue::Number(n),
                Value::String(s) => PayloadValue::String(s),
                nested => {
                    return Err(EventError::invalid(format!(
                        "payload value for \"{key}\" must be a scalar, got {}",
                        json_kind(&nested)
                    )))
                }
            };
            Ok((key, value))
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Current UTC time in the sortable form used for [`Event::time`],
/// e.g. `2019-04-28T04:48:00.405Z`.
pub fn utc_now() -> String {
    format_time(Utc::now())
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

/// Data transfer object for events, as it travels between processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDto {
    pub name: String,
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A validated event.
///
/// The only mutator is [`Event::set_request_id`]; once the event is
/// [frozen](Event::freeze) it can no longer be changed at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EventDto", into = "EventDto")]
pub struct Event {
    dto: EventDto,
}

impl Event {
    /// Create an event stamped with the current UTC time.
    pub fn new(name: impl Into<String>) -> Result<Self, EventError> {
        Self::from_dto(EventDto {
            name: name.into(),
            time: utc_now(),
            request_id: None,
            payload: None,
        })
    }

    /// Validate a DTO received from elsewhere.
    pub fn from_dto(dto: EventDto) -> Result<Self, EventError> {
        if dto.name.is_empty() {
            return Err(EventError::invalid("event name must be a non-empty string"));
        }
        Ok(Self { dto })
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.dto.payload = Some(payload);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        self.set_request_id(Some(&request_id));
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.dto.time = format_time(time);
        self
    }

    pub fn name(&self) -> &str {
        &self.dto.name
    }

    pub fn time(&self) -> &str {
        &self.dto.time
    }

    pub fn request_id(&self) -> Option<&str> {
        self.dto.request_id.as_deref()
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.dto.payload.as_ref()
    }

    /// Set the correlation id; `None` or an empty string clears it.
    pub fn set_request_id(&mut self, value: Option<&str>) {
        self.dto.request_id = value.filter(|v| !v.is_empty()).map(str::to_owned);
    }

    /// The raw DTO behind this event.
    pub fn value_of(&self) -> &EventDto {
        &self.dto
    }

    pub fn to_dto(&self) -> EventDto {
        self.dto.clone()
    }

    pub fn into_dto(self) -> EventDto {
        self.dto
    }

    /// Make the event permanently read-only.
    pub fn freeze(self) -> FrozenEvent {
        FrozenEvent(Arc::new(self))
    }
}

impl TryFrom<EventDto> for Event {
    type Error = EventError;

    fn try_from(dto: EventDto) -> Result<Self, Self::Error> {
        Self::from_dto(dto)
    }
}

impl From<Event> for EventDto {
    fn from(event: Event) -> Self {
        event.dto
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.dto).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl FromStr for Event {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dto: EventDto = serde_json::from_str(s)?;
        Self::from_dto(dto)
    }
}

/// A shared, read-only event. Cheap to clone; never hands out `&mut Event`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenEvent(Arc<Event>);

impl FrozenEvent {
    /// An independent, mutable copy.
    pub fn to_event(&self) -> Event {
        Event::clone(&self.0)
    }
}

impl Deref for FrozenEvent {
    type Target = Event;

    fn deref(&self) -> &Event {
        &self.0
    }
}

impl From<Event> for FrozenEvent {
    fn from(event: Event) -> Self {
        event.freeze()
    }
}

impl fmt::Display for FrozenEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
