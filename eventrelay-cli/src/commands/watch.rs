//! `eventrelay watch`: run an observer against the broker and print what it
//! relays.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::mpsc;

use eventrelay_core::{Event, Payload};
use eventrelay_observer::EventObserver;
use eventrelay_socket::SocketEventService;

/// Arguments for `eventrelay watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Event names to subscribe to.
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,

    /// Exit after printing this many events.
    #[arg(long, value_name = "N")]
    pub count: Option<usize>,
}

impl WatchArgs {
    pub async fn run(self, service: SocketEventService) -> Result<()> {
        let observer = EventObserver::with_service(Arc::new(service))
            .context("failed to attach the event service")?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        observer
            .on(self.names, move |event: &Event, _: Option<&Payload>| {
                let _ = tx.send(event.clone());
            })
            .context("failed to subscribe")?;

        let mut printed = 0usize;
        loop {
            tokio::select! {
                received = rx.recv() => {
                    let Some(event) = received else { break };
                    println!("{event}");
                    printed += 1;
                    if self.count.is_some_and(|limit| printed >= limit) {
                        break;
                    }
                }
                signal = tokio::signal::ctrl_c() => {
                    signal.context("ctrl-c handler failed")?;
                    tracing::info!("received ctrl-c, stopping");
                    break;
                }
            }
        }

        observer.shutdown().await;
        Ok(())
    }
}
