use eventrelay_core::WireEvent;

pub mod trigger;
pub mod wait;
pub mod watch;

/// Print broker events as JSON lines, skipping entries that fail validation.
pub(crate) fn print_events(entries: Vec<WireEvent>) {
    for entry in entries {
        match entry.into_event() {
            Ok(event) => println!("{event}"),
            Err(err) => tracing::warn!(error = %err, "skipping invalid event from broker"),
        }
    }
}
