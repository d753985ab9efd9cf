use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the broker socket.
pub const SOCKET_ENV: &str = "EVENTRELAY_SOCKET";

/// Per-request deadline for the short calls. Long polls have none; the
/// broker decides when `fetchEvents` returns.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn socket_from_env() -> Option<PathBuf> {
    std::env::var_os(SOCKET_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
