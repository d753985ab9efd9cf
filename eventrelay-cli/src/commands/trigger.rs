//! `eventrelay trigger`: forward events to the broker.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::Value;

use eventrelay_core::{payload_from_value, Event, RemoteEventService};
use eventrelay_socket::SocketEventService;

use super::print_events;

/// Arguments for `eventrelay trigger`.
#[derive(Args, Debug)]
pub struct TriggerArgs {
    /// Event names to trigger.
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,

    /// JSON object payload; the n-th payload belongs to the n-th name.
    #[arg(long = "payload", value_name = "JSON")]
    pub payloads: Vec<String>,

    /// Correlation id stamped on every event.
    #[arg(long)]
    pub request_id: Option<String>,
}

impl TriggerArgs {
    pub async fn run(self, service: &SocketEventService) -> Result<()> {
        let events = self.build_events()?;
        let response = service
            .trigger(events)
            .await
            .context("failed to trigger events")?;

        print_events(response.events);
        Ok(())
    }

    fn build_events(&self) -> Result<Vec<Event>> {
        if self.payloads.len() > self.names.len() {
            bail!(
                "{} payloads given for {} event names",
                self.payloads.len(),
                self.names.len()
            );
        }

        self.names
            .iter()
            .enumerate()
            .map(|(index, name)| -> Result<Event> {
                let mut event = Event::new(name.as_str())?;
                if let Some(raw) = self.payloads.get(index) {
                    let value: Value = serde_json::from_str(raw)
                        .with_context(|| format!("payload for '{name}' is not valid JSON"))?;
                    let payload = payload_from_value(value)
                        .with_context(|| format!("payload for '{name}' is not a flat object"))?;
                    event = event.with_payload(payload);
                }
                if let Some(request_id) = &self.request_id {
                    event = event.with_request_id(request_id.as_str());
                }
                Ok(event)
            })
            .collect()
    }
}
