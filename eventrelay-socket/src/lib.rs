//! Unix socket transport for the event broker.
//!
//! Each [`RemoteEventService`](eventrelay_core::RemoteEventService) call is one
//! `POST` with a JSON body over a fresh HTTP/1.1 connection.

pub mod client;
pub mod config;
mod error;
pub mod service;

pub use client::SocketHttpClient;
pub use config::{socket_from_env, SOCKET_ENV};
pub use error::SocketError;
pub use service::SocketEventService;
