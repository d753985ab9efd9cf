use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use eventrelay_core::{
    Event, FetchId, FetchRequest, FetchResponse, RemoteEventService, ServiceError,
    SessionResponse, SetEventsRequest, StartRequest, StopRequest, StopResponse, TriggerRequest,
    TriggerResponse,
};

use crate::client::SocketHttpClient;
use crate::config::REQUEST_TIMEOUT;

pub const TRIGGER_ROUTE: &str = "/trigger";
pub const START_ROUTE: &str = "/start";
pub const SET_EVENTS_ROUTE: &str = "/setEvents";
pub const FETCH_EVENTS_ROUTE: &str = "/fetchEvents";
pub const STOP_ROUTE: &str = "/stop";

/// [`RemoteEventService`] backed by a broker listening on a Unix socket.
#[derive(Debug, Clone)]
pub struct SocketEventService {
    client: SocketHttpClient,
    timeout: Option<Duration>,
}

impl SocketEventService {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            client: SocketHttpClient::new(socket),
            timeout: Some(REQUEST_TIMEOUT),
        }
    }

    /// Deadline for every call except `fetchEvents`; `None` disables it.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn client(&self) -> &SocketHttpClient {
        &self.client
    }
}

#[async_trait]
impl RemoteEventService for SocketEventService {
    async fn trigger(&self, events: Vec<Event>) -> Result<TriggerResponse, ServiceError> {
        let request = TriggerRequest { events };
        Ok(self
            .client
            .post_json(TRIGGER_ROUTE, &request, self.timeout)
            .await?)
    }

    async fn start(&self, events: Vec<String>) -> Result<SessionResponse, ServiceError> {
        let request = StartRequest { events };
        Ok(self
            .client
            .post_json(START_ROUTE, &request, self.timeout)
            .await?)
    }

    async fn set_events(
        &self,
        fetch_id: &FetchId,
        events: Vec<String>,
    ) -> Result<SessionResponse, ServiceError> {
        let request = SetEventsRequest {
            fetch_id: fetch_id.clone(),
            events,
        };
        Ok(self
            .client
            .post_json(SET_EVENTS_ROUTE, &request, self.timeout)
            .await?)
    }

    async fn fetch_events(&self, fetch_id: &FetchId) -> Result<FetchResponse, ServiceError> {
        let request = FetchRequest {
            fetch_id: fetch_id.clone(),
        };
        Ok(self
            .client
            .post_json(FETCH_EVENTS_ROUTE, &request, None)
            .await?)
    }

    async fn stop(&self, fetch_id: &FetchId) -> Result<StopResponse, ServiceError> {
        let request = StopRequest {
            fetch_id: fetch_id.clone(),
        };
        Ok(self
            .client
            .post_json(STOP_ROUTE, &request, self.timeout)
            .await?)
    }
}
