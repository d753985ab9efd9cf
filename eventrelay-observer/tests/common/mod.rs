#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use eventrelay_core::{
    Event, FetchId, FetchResponse, Payload, RemoteEventService, ServiceError, SessionResponse,
    StopResponse, TriggerResponse, WireEvent,
};

/// A remote call as seen by the mock broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Trigger(Vec<String>),
    Start(Vec<String>),
    SetEvents(String, Vec<String>),
    Fetch(String),
    Stop(String),
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    next_fetch_id: u64,
    fail_start: bool,
    fail_set_events: bool,
    fail_fetch: bool,
    mismatch_fetch_id: bool,
    start_delay: Duration,
    set_events_delay: Duration,
    fetch_delay: Duration,
    fetch_queue: VecDeque<Vec<WireEvent>>,
}

/// In-memory broker recording every call. Fetch ids are `fetch-1`,
/// `fetch-2`, ... in `start` order.
#[derive(Default)]
pub struct MockService {
    state: Mutex<MockState>,
}

impl MockService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state")
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn starts(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Start(names) => Some(names),
                _ => None,
            })
            .collect()
    }

    pub fn set_events_calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SetEvents(id, names) => Some((id, names)),
                _ => None,
            })
            .collect()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Fetch(_)))
            .count()
    }

    pub fn stops(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Stop(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn triggers(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Trigger(names) => Some(names),
                _ => None,
            })
            .collect()
    }

    pub fn fail_start(&self, fail: bool) {
        self.state().fail_start = fail;
    }

    pub fn fail_set_events(&self, fail: bool) {
        self.state().fail_set_events = fail;
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.state().fail_fetch = fail;
    }

    /// Answer `setEvents` and `fetchEvents` with a fetch id other than the
    /// one asked about.
    pub fn mismatch_fetch_id(&self, mismatch: bool) {
        self.state().mismatch_fetch_id = mismatch;
    }

    pub fn start_delay(&self, delay: Duration) {
        self.state().start_delay = delay;
    }

    pub fn set_events_delay(&self, delay: Duration) {
        self.state().set_events_delay = delay;
    }

    pub fn fetch_delay(&self, delay: Duration) {
        self.state().fetch_delay = delay;
    }

    /// Queue a batch returned by the next successful fetch.
    pub fn queue_events(&self, events: Vec<Event>) {
        self.queue_batch(events.into_iter().map(WireEvent::from).collect());
    }

    /// Queue a raw batch, which may hold entries that are not valid events.
    pub fn queue_batch(&self, batch: Vec<WireEvent>) {
        self.state().fetch_queue.push_back(batch);
    }
}

fn answered(fetch_id: &FetchId, mismatch: bool) -> FetchId {
    if mismatch {
        FetchId(format!("{fetch_id}-other"))
    } else {
        fetch_id.clone()
    }
}

fn rejected(call: &str) -> ServiceError {
    ServiceError::Rejected {
        status: 500,
        body: format!("{call} failed"),
    }
}

#[async_trait]
impl RemoteEventService for MockService {
    async fn trigger(&self, events: Vec<Event>) -> Result<TriggerResponse, ServiceError> {
        let names = events.iter().map(|e| e.name().to_string()).collect();
        self.state().calls.push(Call::Trigger(names));
        Ok(TriggerResponse {
            events: events.into_iter().map(WireEvent::from).collect(),
        })
    }

    async fn start(&self, events: Vec<String>) -> Result<SessionResponse, ServiceError> {
        let (delay, fail) = {
            let mut state = self.state();
            state.calls.push(Call::Start(events.clone()));
            (state.start_delay, state.fail_start)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(rejected("start"));
        }
        let mut state = self.state();
        state.next_fetch_id += 1;
        Ok(SessionResponse {
            fetch_id: FetchId(format!("fetch-{}", state.next_fetch_id)),
            events,
        })
    }

    async fn set_events(
        &self,
        fetch_id: &FetchId,
        events: Vec<String>,
    ) -> Result<SessionResponse, ServiceError> {
        let (delay, fail, answered_id) = {
            let mut state = self.state();
            state
                .calls
                .push(Call::SetEvents(fetch_id.to_string(), events.clone()));
            (
                state.set_events_delay,
                state.fail_set_events,
                answered(fetch_id, state.mismatch_fetch_id),
            )
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(rejected("setEvents"));
        }
        Ok(SessionResponse {
            fetch_id: answered_id,
            events,
        })
    }

    async fn fetch_events(&self, fetch_id: &FetchId) -> Result<FetchResponse, ServiceError> {
        let (delay, fail, answered_id) = {
            let mut state = self.state();
            state.calls.push(Call::Fetch(fetch_id.to_string()));
            (
                state.fetch_delay,
                state.fail_fetch,
                answered(fetch_id, state.mismatch_fetch_id),
            )
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(rejected("fetchEvents"));
        }
        let events = self.state().fetch_queue.pop_front().unwrap_or_default();
        Ok(FetchResponse {
            fetch_id: answered_id,
            events,
        })
    }

    async fn stop(&self, fetch_id: &FetchId) -> Result<StopResponse, ServiceError> {
        self.state().calls.push(Call::Stop(fetch_id.to_string()));
        Ok(StopResponse {
            fetch_id: fetch_id.clone(),
        })
    }
}

/// Listener that records the names of the events it receives.
pub fn recorder() -> (
    Arc<Mutex<Vec<Event>>>,
    impl Fn(&Event, Option<&Payload>) + Send + Sync + 'static,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener = move |event: &Event, _: Option<&Payload>| {
        sink.lock().expect("recorder").push(event.clone());
    };
    (seen, listener)
}

pub fn noop(_: &Event, _: Option<&Payload>) {}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
