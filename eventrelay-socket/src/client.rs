//! Minimal HTTP/1.1 client speaking JSON over a Unix domain socket.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST};
use http::{Method, Request};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::UnixStream;

use crate::error::{io_err, SocketError};

/// One connection per request; nothing is pooled.
#[derive(Debug, Clone)]
pub struct SocketHttpClient {
    socket: PathBuf,
}

impl SocketHttpClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// POST `body` as JSON to `route` and decode the JSON answer.
    ///
    /// Any status outside 200..400 is a [`SocketError::Status`] carrying the
    /// response text. With `timeout` set, the whole exchange must finish in
    /// time or fail with [`SocketError::Timeout`].
    pub async fn post_json<Req, Resp>(
        &self,
        route: &'static str,
        body: &Req,
        timeout: Option<Duration>,
    ) -> Result<Resp, SocketError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let exchange = self.exchange(route, serde_json::to_vec(body)?);
        let (status, bytes) = match timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| SocketError::Timeout { route })??,
            None => exchange.await?,
        };

        if !(200..400).contains(&status) {
            return Err(SocketError::Status {
                route,
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        if bytes.is_empty() {
            return Ok(serde_json::from_slice(b"{}")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn exchange(
        &self,
        route: &'static str,
        body: Vec<u8>,
    ) -> Result<(u16, Bytes), SocketError> {
        let stream = self.connect().await?;
        let (mut sender, connection) = http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::debug!(error = %err, "event service connection closed with error");
            }
        });

        let request = Request::builder()
            .method(Method::POST)
            .uri(route)
            .header(HOST, "localhost")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))?;

        tracing::trace!(route, socket = %self.socket.display(), "sending request");
        let response = sender.send_request(request).await?;
        let status = response.status().as_u16();
        let bytes = response.into_body().collect().await?.to_bytes();
        Ok((status, bytes))
    }

    async fn connect(&self) -> Result<UnixStream, SocketError> {
        UnixStream::connect(&self.socket).await.map_err(|err| {
            if matches!(
                err.kind(),
                ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset
            ) {
                SocketError::ServiceNotRunning {
                    socket: self.socket.clone(),
                }
            } else {
                io_err(&self.socket, err)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_socket_reports_service_not_running() {
        let dir = TempDir::new().expect("tempdir");
        let client = SocketHttpClient::new(dir.path().join("absent.sock"));

        let err = client
            .post_json::<_, serde_json::Value>("/trigger", &serde_json::json!({}), None)
            .await
            .expect_err("no listener");
        assert!(
            matches!(err, SocketError::ServiceNotRunning { .. }),
            "unexpected error: {err}"
        );
    }
}
