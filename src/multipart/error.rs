//! Parse failure type for response streams.

use thiserror::Error;

/// A record in the response stream was not syntactically valid.
///
/// Carries the raw text of the offending record so the coordinator can log
/// it and abort the in-flight transport with a useful diagnostic.
#[derive(Debug, Error)]
#[error("malformed response record: {text:?}")]
pub struct ParseError {
    text: String,
    #[source]
    source: serde_json::Error,
}

impl ParseError {
    pub(crate) fn new(text: &str, source: serde_json::Error) -> Self {
        Self {
            text: text.to_owned(),
            source,
        }
    }

    /// The raw text of the record that failed to decode.
    #[must_use]
    pub fn record_text(&self) -> &str { &self.text }
}
