use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use serde_json::Value;

use eventrelay_core::{payload_from_value, Event, Payload, RemoteEventService};

use crate::config::RelayTimings;
use crate::error::{invalid, ObserverError};
use crate::registry::{dispatch, Listener, ListenerId, ListenerRegistry};
use crate::relay::{RelayCommand, RelayHandle};

/// One or more event names accepted by [`EventObserver::on`].
pub trait EventNames {
    fn into_names(self) -> Vec<String>;
}

impl EventNames for &str {
    fn into_names(self) -> Vec<String> {
        vec![self.to_owned()]
    }
}

impl EventNames for String {
    fn into_names(self) -> Vec<String> {
        vec![self]
    }
}

impl EventNames for &String {
    fn into_names(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl EventNames for Vec<String> {
    fn into_names(self) -> Vec<String> {
        self
    }
}

impl EventNames for Vec<&str> {
    fn into_names(self) -> Vec<String> {
        self.into_iter().map(str::to_owned).collect()
    }
}

impl EventNames for &[&str] {
    fn into_names(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl EventNames for &[String] {
    fn into_names(self) -> Vec<String> {
        self.to_vec()
    }
}

impl<const N: usize> EventNames for [&str; N] {
    fn into_names(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

/// Process-local event bus with optional relaying through a remote broker.
///
/// Cloning yields another handle to the same bus. Local dispatch never waits
/// on the remote side: listeners registered with [`on`](Self::on) run inside
/// [`trigger`](Self::trigger) before it returns, whether or not a service is
/// attached. Remote failures are logged through `tracing` and retried by the
/// relay; they never surface from this API.
#[derive(Clone)]
pub struct EventObserver {
    shared: Arc<Shared>,
}

struct Shared {
    registry: Arc<Mutex<ListenerRegistry>>,
    relay: Mutex<Option<RelayHandle>>,
    destroyed: AtomicBool,
    timings: RelayTimings,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, ListenerRegistry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn relay(&self) -> MutexGuard<'_, Option<RelayHandle>> {
        self.relay.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, command: RelayCommand) {
        if let Some(relay) = self.relay().as_ref() {
            relay.send(command);
        }
    }
}

impl EventObserver {
    /// A local-only observer with the default relay timings.
    pub fn new() -> Self {
        Self::with_timings(RelayTimings::default())
    }

    pub fn with_timings(timings: RelayTimings) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Arc::new(Mutex::new(ListenerRegistry::default())),
                relay: Mutex::new(None),
                destroyed: AtomicBool::new(false),
                timings,
            }),
        }
    }

    /// An observer relaying through `service`. Must be called inside a tokio
    /// runtime.
    pub fn with_service(service: Arc<dyn RemoteEventService>) -> Result<Self, ObserverError> {
        let observer = Self::new();
        observer.set_service(service)?;
        Ok(observer)
    }

    /// Listen for one or more event names.
    ///
    /// The listener receives the event and its bare payload. Registration is
    /// effective for local dispatch immediately; the remote subscription set
    /// follows asynchronously.
    pub fn on<N, F>(&self, names: N, listener: F) -> Result<Subscription, ObserverError>
    where
        N: EventNames,
        F: Fn(&Event, Option<&Payload>) + Send + Sync + 'static,
    {
        let names = validate_names(names.into_names())?;
        let listener: Listener = Arc::new(listener);
        let id = self.shared.registry().insert(&names, listener);
        self.shared.notify(RelayCommand::Reconcile);
        Ok(Subscription {
            id,
            names,
            shared: Arc::downgrade(&self.shared),
        })
    }

    /// Trigger an event without payload.
    pub fn trigger(&self, name: &str) -> Result<(), ObserverError> {
        self.emit(name, None)
    }

    /// Trigger an event with a payload.
    ///
    /// The payload goes through a JSON round trip, so listeners always get a
    /// private flat copy: non-finite floats become `null`, and anything that
    /// is not an object of scalars is rejected. A payload serializing to
    /// `null` means "no payload".
    pub fn trigger_with<P>(&self, name: &str, payload: &P) -> Result<(), ObserverError>
    where
        P: Serialize + ?Sized,
    {
        let payload = match serde_json::to_value(payload)? {
            Value::Null => None,
            value => Some(payload_from_value(value)?),
        };
        self.emit(name, payload)
    }

    fn emit(&self, name: &str, payload: Option<Payload>) -> Result<(), ObserverError> {
        let mut event = Event::new(name)?;
        if let Some(payload) = payload {
            event = event.with_payload(payload);
        }
        let event = event.freeze();

        dispatch(&self.shared.registry, &event);
        self.shared.notify(RelayCommand::Forward(event));
        Ok(())
    }

    /// Attach or replace the upstream service.
    ///
    /// Replacing abandons the current session without stopping it on the old
    /// service; a fresh session is started against the new one if anything is
    /// subscribed. Ignored once the observer is destroyed.
    pub fn set_service(&self, service: Arc<dyn RemoteEventService>) -> Result<(), ObserverError> {
        let mut relay = self.shared.relay();
        if self.shared.destroyed.load(Ordering::SeqCst) {
            tracing::warn!("ignoring remote service for a destroyed observer");
            return Ok(());
        }

        match relay.as_ref() {
            Some(handle) => handle.send(RelayCommand::SetService(service)),
            None => {
                let runtime = tokio::runtime::Handle::try_current()
                    .map_err(|_| ObserverError::NoRuntime)?;
                *relay = Some(RelayHandle::spawn(
                    &runtime,
                    self.shared.registry.clone(),
                    service,
                    self.shared.timings,
                ));
            }
        }
        Ok(())
    }

    /// Go back to local-only dispatch. The active session is stopped
    /// best-effort; local listeners stay registered.
    pub fn remove_service(&self) {
        let relay = self.shared.relay().take();
        if let Some(relay) = relay {
            drop(relay.shutdown());
        }
    }

    /// Names that currently have at least one listener, sorted.
    pub fn subscribed_names(&self) -> Vec<String> {
        self.shared.registry().active_names()
    }

    /// Remove every listener and stop relaying. Idempotent.
    pub fn destroy(&self) {
        if let Some(relay) = self.detach() {
            drop(relay.shutdown());
        }
    }

    /// [`destroy`](Self::destroy), then wait until the relay has stopped its
    /// session.
    pub async fn shutdown(&self) {
        if let Some(relay) = self.detach() {
            if let Err(err) = relay.shutdown().await {
                tracing::warn!(error = %err, "relay task ended abnormally");
            }
        }
    }

    fn detach(&self) -> Option<RelayHandle> {
        self.shared.destroyed.store(true, Ordering::SeqCst);
        self.shared.registry().clear();
        self.shared.relay().take()
    }
}

impl Default for EventObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventObserver")
            .field("subscribed", &self.subscribed_names())
            .field("relaying", &self.shared.relay().is_some())
            .field("destroyed", &self.shared.destroyed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Handle returned by [`EventObserver::on`].
///
/// Dropping it keeps the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
pub struct Subscription {
    id: ListenerId,
    names: Vec<String>,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Stop delivering events to this listener.
    pub fn unsubscribe(self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let removed = shared.registry().remove(self.id, &self.names);
        if removed {
            shared.notify(RelayCommand::Reconcile);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("names", &self.names)
            .finish()
    }
}

fn validate_names(names: Vec<String>) -> Result<Vec<String>, ObserverError> {
    if names.is_empty() {
        return Err(invalid("at least one event name is required"));
    }
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if name.is_empty() {
            return Err(invalid("event names must be non-empty strings"));
        }
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    Ok(unique)
}
