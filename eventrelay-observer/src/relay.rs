//! Relay task: the single writer of the broker session.
//!
//! The task owns the fetch session, the debounce and poll deadlines, and the
//! in-flight flags. Remote calls run as separate tasks and report back over a
//! completion channel, tagged with the session generation they were issued
//! for; a completion whose generation is no longer current is discarded.
//!
//! Invariants:
//! - at most one `start` or `setEvents` is in flight; changes that arrive
//!   meanwhile set `rescheduled` and collapse into one follow-up;
//! - at most one `fetchEvents` is in flight;
//! - remote failures are logged here and never leave the task.

use std::collections::BTreeSet;
use std::future::{pending, Future};
use std::mem;
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use eventrelay_core::{
    FetchId, FetchResponse, FrozenEvent, RemoteEventService, ServiceError, SessionResponse,
};

use crate::config::RelayTimings;
use crate::registry::{dispatch, ListenerRegistry};

pub(crate) enum RelayCommand {
    /// The local subscription set may have changed.
    Reconcile,
    /// Forward a locally triggered event upstream.
    Forward(FrozenEvent),
    /// Swap the upstream collaborator, abandoning the current session.
    SetService(Arc<dyn RemoteEventService>),
    /// Stop the session and exit.
    Shutdown,
}

enum Completion {
    Started {
        generation: u64,
        result: Result<SessionResponse, ServiceError>,
    },
    EventsSet {
        generation: u64,
        result: Result<SessionResponse, ServiceError>,
    },
    Fetched {
        generation: u64,
        result: Result<FetchResponse, ServiceError>,
    },
}

struct FetchSession {
    fetch_id: FetchId,
    events: Vec<String>,
}

/// Owner-side handle of a running relay task.
pub(crate) struct RelayHandle {
    commands: mpsc::UnboundedSender<RelayCommand>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    pub(crate) fn spawn(
        runtime: &Handle,
        registry: Arc<Mutex<ListenerRegistry>>,
        service: Arc<dyn RemoteEventService>,
        timings: RelayTimings,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (completions, completion_rx) = mpsc::unbounded_channel();
        let relay = Relay {
            registry,
            service,
            timings,
            completions,
            session: None,
            generation: 0,
            start_at: None,
            poll_at: None,
            starting: false,
            setting_events: false,
            fetching: false,
            rescheduled: false,
        };
        let task = runtime.spawn(relay.run(command_rx, completion_rx));
        Self { commands, task }
    }

    pub(crate) fn send(&self, command: RelayCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!("relay task already stopped; command dropped");
        }
    }

    /// Ask the task to stop its session and exit.
    pub(crate) fn shutdown(self) -> JoinHandle<()> {
        self.send(RelayCommand::Shutdown);
        self.task
    }
}

struct Relay {
    registry: Arc<Mutex<ListenerRegistry>>,
    service: Arc<dyn RemoteEventService>,
    timings: RelayTimings,
    completions: mpsc::UnboundedSender<Completion>,
    session: Option<FetchSession>,
    generation: u64,
    start_at: Option<Instant>,
    poll_at: Option<Instant>,
    starting: bool,
    setting_events: bool,
    fetching: bool,
    rescheduled: bool,
}

impl Relay {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<RelayCommand>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        self.reconcile();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(RelayCommand::Reconcile) => self.reconcile(),
                    Some(RelayCommand::Forward(event)) => self.forward(event),
                    Some(RelayCommand::SetService(service)) => self.replace_service(service),
                    Some(RelayCommand::Shutdown) | None => break,
                },
                Some(completion) = completions.recv() => self.complete(completion),
                _ = wait_until(self.start_at) => {
                    self.start_at = None;
                    self.start();
                }
                _ = wait_until(self.poll_at) => {
                    self.poll_at = None;
                    self.poll();
                }
            }
        }

        self.shut_down(completions).await;
    }

    // ── reconciliation ─────────────────────────────────────────────────────

    fn reconcile(&mut self) {
        if self.start_at.is_some() {
            // The pending start reads the name set when it fires.
            self.schedule_start();
            return;
        }
        if self.starting || self.setting_events {
            self.rescheduled = true;
            return;
        }

        let desired = self.desired_names();
        let registered = self.session.as_ref().map(|s| s.events.clone());
        match registered {
            None if desired.is_empty() => {}
            None => self.schedule_start(),
            Some(events) if same_names(&events, &desired) => {}
            Some(_) => self.set_events(desired),
        }
    }

    fn follow_up(&mut self) {
        if mem::take(&mut self.rescheduled) {
            self.reconcile();
        }
    }

    fn schedule_start(&mut self) {
        self.start_at = Some(Instant::now() + self.timings.start_debounce);
    }

    fn start(&mut self) {
        self.poll_at = None;
        self.invalidate_session();
        if let Some(previous) = self.session.take() {
            self.spawn_stop(previous.fetch_id);
        }

        let names = self.desired_names();
        if names.is_empty() {
            tracing::debug!("no active subscriptions; relay idle");
            return;
        }

        tracing::debug!(events = ?names, "starting remote fetch session");
        self.starting = true;
        let service = self.service.clone();
        let generation = self.generation;
        self.spawn_call(async move {
            Completion::Started {
                generation,
                result: service.start(names).await,
            }
        });
    }

    fn set_events(&mut self, names: Vec<String>) {
        let Some(session) = &self.session else {
            return;
        };
        let fetch_id = session.fetch_id.clone();

        tracing::debug!(fetch_id = %fetch_id, events = ?names, "updating remote subscriptions");
        self.setting_events = true;
        let service = self.service.clone();
        let generation = self.generation;
        self.spawn_call(async move {
            Completion::EventsSet {
                generation,
                result: service.set_events(&fetch_id, names).await,
            }
        });
    }

    // ── polling ────────────────────────────────────────────────────────────

    fn poll(&mut self) {
        if self.fetching {
            return;
        }
        let Some(session) = &self.session else {
            return;
        };
        let fetch_id = session.fetch_id.clone();

        self.fetching = true;
        let service = self.service.clone();
        let generation = self.generation;
        self.spawn_call(async move {
            Completion::Fetched {
                generation,
                result: service.fetch_events(&fetch_id).await,
            }
        });
    }

    // ── completions ────────────────────────────────────────────────────────

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Started { generation, result } => self.on_started(generation, result),
            Completion::EventsSet { generation, result } => {
                self.on_events_set(generation, result)
            }
            Completion::Fetched { generation, result } => self.on_fetched(generation, result),
        }
    }

    fn on_started(&mut self, generation: u64, result: Result<SessionResponse, ServiceError>) {
        if generation != self.generation {
            tracing::debug!("discarding result of a superseded start");
            return;
        }
        self.starting = false;

        match result {
            Ok(response) => {
                tracing::info!(
                    fetch_id = %response.fetch_id,
                    events = ?response.events,
                    "remote fetch session started",
                );
                self.session = Some(FetchSession {
                    fetch_id: response.fetch_id,
                    events: response.events,
                });
                self.poll_at = Some(Instant::now());
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to start remote fetch session");
            }
        }
        self.follow_up();
    }

    fn on_events_set(&mut self, generation: u64, result: Result<SessionResponse, ServiceError>) {
        if generation != self.generation {
            tracing::debug!("discarding setEvents result of a superseded session");
            return;
        }
        self.setting_events = false;

        let result = result.and_then(|response| {
            self.expect_session(&response.fetch_id)?;
            Ok(response)
        });
        match result {
            Ok(response) => {
                if let Some(session) = self.session.as_mut() {
                    session.events = response.events;
                }
                self.follow_up();
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "failed to update remote subscriptions; restarting fetch session",
                );
                self.rescheduled = false;
                self.schedule_start();
            }
        }
    }

    fn on_fetched(&mut self, generation: u64, result: Result<FetchResponse, ServiceError>) {
        if generation != self.generation || self.session.is_none() {
            tracing::debug!("discarding events fetched for a superseded session");
            return;
        }
        self.fetching = false;

        let result = result.and_then(|response| {
            self.expect_session(&response.fetch_id)?;
            Ok(response)
        });
        match result {
            Ok(response) => {
                for entry in response.events {
                    match entry.into_event() {
                        Ok(event) => {
                            dispatch(&self.registry, &event);
                        }
                        Err(err) => tracing::warn!(
                            error = %err,
                            "skipping invalid event from remote service",
                        ),
                    }
                }
                self.poll_at = Some(Instant::now() + self.timings.poll_interval);
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch remote events");
                self.poll_at = Some(Instant::now() + self.timings.poll_error_interval);
            }
        }
    }

    fn expect_session(&self, fetch_id: &FetchId) -> Result<(), ServiceError> {
        match &self.session {
            Some(session) if session.fetch_id == *fetch_id => Ok(()),
            Some(session) => Err(ServiceError::Protocol(format!(
                "response for fetchId {fetch_id} does not match session {}",
                session.fetch_id
            ))),
            None => Err(ServiceError::Protocol(format!(
                "response for fetchId {fetch_id} arrived without a session"
            ))),
        }
    }

    // ── forwarding, service swap, shutdown ─────────────────────────────────

    fn forward(&self, event: FrozenEvent) {
        let service = self.service.clone();
        tokio::spawn(async move {
            match service.trigger(vec![event.to_event()]).await {
                Ok(_) => tracing::debug!(event = %event.name(), "event forwarded upstream"),
                Err(err) => tracing::warn!(
                    event = %event.name(),
                    error = %err,
                    "failed to forward event to remote service",
                ),
            }
        });
    }

    /// The previous session is abandoned without a `stop`: the old service
    /// reference is dropped here and nothing can reach it any more.
    fn replace_service(&mut self, service: Arc<dyn RemoteEventService>) {
        tracing::info!("remote event service replaced");
        self.service = service;
        self.session = None;
        self.invalidate_session();
        self.rescheduled = false;
        self.start_at = None;
        self.poll_at = None;

        if !self.desired_names().is_empty() {
            self.schedule_start();
        }
    }

    /// Closing the completion channel first makes a `start` that is still in
    /// flight stop its own session (see `spawn_call`); one that
    /// already reported back is adopted here and stopped below.
    async fn shut_down(mut self, mut completions: mpsc::UnboundedReceiver<Completion>) {
        completions.close();
        while let Ok(completion) = completions.try_recv() {
            if let Completion::Started {
                generation,
                result: Ok(response),
            } = completion
            {
                if generation == self.generation && self.session.is_none() {
                    self.session = Some(FetchSession {
                        fetch_id: response.fetch_id,
                        events: response.events,
                    });
                }
            }
        }

        self.start_at = None;
        self.poll_at = None;
        self.invalidate_session();
        if let Some(session) = self.session.take() {
            stop_quietly(self.service.as_ref(), &session.fetch_id).await;
        }
        tracing::debug!("relay stopped");
    }

    // ── helpers ────────────────────────────────────────────────────────────

    fn invalidate_session(&mut self) {
        self.generation += 1;
        self.starting = false;
        self.setting_events = false;
        self.fetching = false;
    }

    fn desired_names(&self) -> Vec<String> {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .active_names()
    }

    /// A session started after the relay exited is stopped on the spot.
    fn spawn_call<F>(&self, call: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let completions = self.completions.clone();
        let service = self.service.clone();
        tokio::spawn(async move {
            if let Err(unsent) = completions.send(call.await) {
                if let Completion::Started {
                    result: Ok(response),
                    ..
                } = unsent.0
                {
                    stop_quietly(service.as_ref(), &response.fetch_id).await;
                }
            }
        });
    }

    fn spawn_stop(&self, fetch_id: FetchId) {
        let service = self.service.clone();
        tokio::spawn(async move {
            stop_quietly(service.as_ref(), &fetch_id).await;
        });
    }
}

async fn stop_quietly(service: &dyn RemoteEventService, fetch_id: &FetchId) {
    match service.stop(fetch_id).await {
        Ok(_) => tracing::debug!(fetch_id = %fetch_id, "remote fetch session stopped"),
        Err(err) => tracing::warn!(
            fetch_id = %fetch_id,
            error = %err,
            "failed to stop remote fetch session",
        ),
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

fn same_names(registered: &[String], desired: &[String]) -> bool {
    registered.iter().collect::<BTreeSet<_>>() == desired.iter().collect::<BTreeSet<_>>()
}
