//! Contract of the remote event broker the observer relays through.
//!
//! Field names of every DTO here are part of the wire contract.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EventError, ServiceError};
use crate::event::Event;

/// Opaque handle of a fetch session, issued by [`RemoteEventService::start`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FetchId(pub String);

impl FetchId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FetchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for FetchId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FetchId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// An event as received from the broker, decoded one entry at a time so a
/// malformed entry does not take the rest of its batch down with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireEvent {
    Valid(Event),
    Invalid(Value),
}

impl WireEvent {
    /// The validated event, or the reason the entry was rejected.
    pub fn into_event(self) -> Result<Event, EventError> {
        match self {
            WireEvent::Valid(event) => Ok(event),
            WireEvent::Invalid(value) => match serde_json::from_value::<Event>(value) {
                Ok(event) => Ok(event),
                Err(err) => Err(EventError::Json(err)),
            },
        }
    }
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        WireEvent::Valid(event)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetEventsRequest {
    pub fetch_id: FetchId,
    pub events: Vec<String>,
}

/// Request body shared by `fetchEvents` and `stop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub fetch_id: FetchId,
}

pub type StopRequest = FetchRequest;

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    #[serde(default)]
    pub events: Vec<WireEvent>,
}

/// Response of `start` and `setEvents`: the session and the names it now
/// relays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub fetch_id: FetchId,
    #[serde(default)]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    pub fetch_id: FetchId,
    #[serde(default)]
    pub events: Vec<WireEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResponse {
    pub fetch_id: FetchId,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A broker reachable through long-polling request/response calls.
///
/// Implemented by transport adapters; the observer only ever talks to this
/// trait.
#[async_trait]
pub trait RemoteEventService: Send + Sync {
    /// Forward locally-originated events. Success means the broker accepted
    /// responsibility, not that remote listeners have run.
    async fn trigger(&self, events: Vec<Event>) -> Result<TriggerResponse, ServiceError>;

    /// Open a new fetch session scoped to `events`.
    async fn start(&self, events: Vec<String>) -> Result<SessionResponse, ServiceError>;

    /// Replace the full set of names relayed by an existing session.
    async fn set_events(
        &self,
        fetch_id: &FetchId,
        events: Vec<String>,
    ) -> Result<SessionResponse, ServiceError>;

    /// Long poll for events queued on the session.
    async fn fetch_events(&self, fetch_id: &FetchId) -> Result<FetchResponse, ServiceError>;

    /// Release the session.
    async fn stop(&self, fetch_id: &FetchId) -> Result<StopResponse, ServiceError>;
}
