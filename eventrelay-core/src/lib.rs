//! Core types for eventrelay: the event value object, the remote service contract and errors.
//!
//! Public API surface:
//! - [`event`]: [`Event`], [`FrozenEvent`], [`EventDto`] and payload types
//! - [`service`]: the [`RemoteEventService`] trait and its wire DTOs
//! - [`error`]: [`EventError`], [`ServiceError`]

pub mod error;
pub mod event;
pub mod service;

pub use error::{EventError, ServiceError};
pub use event::{payload_from_value, utc_now, Event, EventDto, FrozenEvent, Payload, PayloadValue};
pub use service::{
    FetchId, FetchRequest, FetchResponse, RemoteEventService, SessionResponse, SetEventsRequest,
    StartRequest, StopRequest, StopResponse, TriggerRequest, TriggerResponse, WireEvent,
};
