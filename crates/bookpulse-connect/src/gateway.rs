//! Gateway traits: the seams between the transports and the outside world
//!
//! The Stream Transport and Polling Fallback workers talk to the remote
//! authority exclusively through [`StatusGateway`], and learn about
//! credentials exclusively through [`TokenProvider`]. Tests substitute fakes;
//! production wires in [`HttpGateway`].

use crate::error::ConnectError;
use crate::wire::{SseDecoder, StatusRecord};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Raw event-frame payloads from an open event-source connection
pub type EventFrames = Pin<Box<dyn Stream<Item = Result<String, ConnectError>> + Send>>;

/// Supplies the current bearer token; may report "no token" at any time
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Remote authority for booking statuses: one streaming subscription endpoint
/// and one synchronous point lookup.
#[async_trait]
pub trait StatusGateway: Send + Sync {
    /// Open the authenticated, long-lived event connection.
    ///
    /// The returned stream yields one raw envelope payload per event frame.
    /// Envelope decoding is the caller's job (done once, at the transport
    /// boundary).
    async fn open_event_stream(&self, token: &str) -> Result<EventFrames, ConnectError>;

    /// Look up one entity's current status.
    async fn fetch_status(&self, id: i64) -> Result<StatusRecord, ConnectError>;
}

/// reqwest-backed gateway for the upstream HTTP API.
///
/// The bearer token rides in a query parameter on the stream handshake, since
/// the upstream event-source transport does not accept custom headers. Point
/// queries send it as a normal `Authorization` header.
pub struct HttpGateway {
    client: reqwest::Client,
    events_url: String,
    status_url: String,
    tokens: Arc<dyn TokenProvider>,
    request_timeout: Duration,
}

impl HttpGateway {
    /// Build a gateway for the given endpoints.
    ///
    /// No client-wide timeout is set: it would sever the long-lived event
    /// stream. Point queries apply `request_timeout` per request instead.
    pub fn new(
        events_url: impl Into<String>,
        status_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        request_timeout: Duration,
    ) -> Result<Self, ConnectError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            events_url: events_url.into(),
            status_url: status_url.into(),
            tokens,
            request_timeout,
        })
    }
}

#[async_trait]
impl StatusGateway for HttpGateway {
    async fn open_event_stream(&self, token: &str) -> Result<EventFrames, ConnectError> {
        debug!(url = %self.events_url, "opening event-source connection");
        let response = self
            .client
            .get(&self.events_url)
            .query(&[("token", token)])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectError::Rejected {
                status: status.as_u16(),
            });
        }

        let mut decoder = SseDecoder::new();
        let frames = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => Ok(decoder.push(&bytes)),
                Err(e) => Err(ConnectError::Http(e)),
            })
            .flat_map(|res| match res {
                Ok(payloads) => stream::iter(payloads.into_iter().map(Ok).collect::<Vec<_>>()),
                Err(e) => stream::iter(vec![Err(e)]),
            });
        Ok(Box::pin(frames))
    }

    async fn fetch_status(&self, id: i64) -> Result<StatusRecord, ConnectError> {
        let url = format!("{}/{}", self.status_url.trim_end_matches('/'), id);
        let mut request = self.client.get(&url).timeout(self.request_timeout);
        if let Some(token) = self.tokens.bearer_token() {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.json::<StatusRecord>().await?)
    }
}
