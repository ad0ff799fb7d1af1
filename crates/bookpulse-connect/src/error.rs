//! Error types for the bookpulse-connect crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("no bearer token available")]
    MissingToken,

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("event source rejected the handshake (HTTP {status})")]
    Rejected { status: u16 },

    #[error("malformed event envelope: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("server-signaled fault: {0}")]
    Server(String),

    #[error("event stream closed by the server")]
    StreamClosed,

    #[error("status query timed out")]
    Timeout,
}
