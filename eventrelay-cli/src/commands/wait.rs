//! `eventrelay wait`: one long poll on a fresh session.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use eventrelay_core::{RemoteEventService, WireEvent};
use eventrelay_socket::SocketEventService;

use super::print_events;

/// Arguments for `eventrelay wait`.
#[derive(Args, Debug)]
pub struct WaitArgs {
    /// Event names to wait for.
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,

    /// Give up after this many seconds and print nothing.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl WaitArgs {
    pub async fn run(self, service: &SocketEventService) -> Result<()> {
        let session = service
            .start(self.names)
            .await
            .context("failed to start fetch session")?;
        tracing::debug!(fetch_id = %session.fetch_id, events = ?session.events, "session started");

        let fetched = match self.timeout {
            Some(secs) => {
                tokio::time::timeout(
                    Duration::from_secs(secs),
                    service.fetch_events(&session.fetch_id),
                )
                .await
            }
            None => Ok(service.fetch_events(&session.fetch_id).await),
        };

        if let Err(err) = service.stop(&session.fetch_id).await {
            tracing::warn!(fetch_id = %session.fetch_id, error = %err, "failed to stop fetch session");
        }

        let entries: Vec<WireEvent> = match fetched {
            Ok(result) => result.context("failed to fetch events")?.events,
            Err(_) => {
                tracing::info!("no events before timeout");
                Vec::new()
            }
        };
        print_events(entries);
        Ok(())
    }
}
