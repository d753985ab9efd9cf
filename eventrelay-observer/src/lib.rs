//! Process-local event bus that mirrors its subscriptions to a remote broker.
//!
//! [`EventObserver`] dispatches events to in-process listeners synchronously
//! and, once a [`RemoteEventService`](eventrelay_core::RemoteEventService) is
//! attached, runs a relay task that keeps one broker fetch session in sync
//! with the local subscription set and re-dispatches everything the broker
//! returns.

pub mod config;
mod error;
mod observer;
mod registry;
mod relay;

pub use config::RelayTimings;
pub use error::ObserverError;
pub use observer::{EventNames, EventObserver, Subscription};
pub use registry::Listener;
