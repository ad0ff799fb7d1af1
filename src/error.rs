//! Error types for Bookpulse

use bookpulse_connect::ConnectError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Connect(#[from] ConnectError),
}
