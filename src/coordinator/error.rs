//! Request failure taxonomy.

use thiserror::Error;

use super::transport::TransportError;
use crate::multipart::ParseError;

/// Why a navigation request failed.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The destination could not be resolved against the configured base.
    #[error("invalid request url {url:?}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// The response stream contained a malformed record.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The transport reported a failure or timed out.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
