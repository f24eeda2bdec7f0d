//! Navigation response stream parsing.
//!
//! Responses arrive either as one JSON value (a record or an array of
//! records) or as a multipart stream framed by textual tokens, each
//! followed by a CRLF: [`BEGIN`], [`DELIMITER`] and [`END`]. The multipart
//! scanner tolerates chunk boundaries anywhere, including mid-token: it
//! emits every complete record it can find and carries the unconsumed
//! remainder as `extra` for the next chunk.
//!
//! [`StreamParser`] is the stateful wrapper the request coordinator feeds
//! chunk by chunk; [`parse`] is the underlying single-shot scan.

mod error;

use serde_json::Value;

pub use self::error::ParseError;
use crate::fragment::Fragment;

/// Opening token of a multipart response stream.
pub const BEGIN: &str = "[\r\n";
/// Separator between records in a multipart response stream.
pub const DELIMITER: &str = ",\r\n";
/// Closing token of a multipart response stream.
pub const END: &str = "]\r\n";

/// Synthetic suffix appended in last-ditch mode.
///
/// A stream that terminates mid-token with a trailing `,` or `]` becomes a
/// parsable delimiter or end token once a CRLF follows it.
const LAST_DITCH_SUFFIX: &str = "\r\n";

/// Outcome of one parse call: decoded records plus unconsumed trailing
/// text, retained for the next chunk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseResult {
    /// Records decoded by this call, in stream order.
    pub parts: Vec<Fragment>,
    /// Unconsumed trailing buffer content.
    pub extra: String,
}

/// Parse a response buffer.
///
/// In single mode (`multipart = false`) the whole buffer must decode as one
/// record or an array of records; anything else fails and `extra` is always
/// empty. In multipart mode the buffer is scanned for framing tokens and
/// merely-incomplete input is never an error. `last_ditch` appends one
/// synthetic CRLF before scanning so an almost-well-formed suffix can be
/// recovered; the suffix is stripped back out of `extra` if unconsumed.
///
/// # Errors
///
/// Returns [`ParseError`] when a record between tokens (or the whole buffer
/// in single mode) is not syntactically valid. The error carries the raw
/// offending text.
pub fn parse(text: &str, multipart: bool, last_ditch: bool) -> Result<ParseResult, ParseError> {
    if multipart {
        parse_multipart(text, last_ditch)
    } else {
        parse_single(text)
    }
}

fn parse_single(text: &str) -> Result<ParseResult, ParseError> {
    let value: Value =
        serde_json::from_str(text).map_err(|source| ParseError::new(text, source))?;
    let parts = match value {
        Value::Array(items) => items.into_iter().map(Fragment::new).collect(),
        other => vec![Fragment::new(other)],
    };
    Ok(ParseResult {
        parts,
        extra: String::new(),
    })
}

fn parse_multipart(text: &str, last_ditch: bool) -> Result<ParseResult, ParseError> {
    let padded;
    let text = if last_ditch {
        padded = format!("{text}{LAST_DITCH_SUFFIX}");
        padded.as_str()
    } else {
        text
    };

    let mut pieces: Vec<&str> = Vec::new();
    // An absent BEGIN is tolerated: the opening token may have been
    // consumed by an earlier chunk.
    let mut index = text.find(BEGIN).map_or(0, |at| at + BEGIN.len());
    while let Some(offset) = text[index..].find(DELIMITER) {
        let piece = text[index..index + offset].trim();
        index += offset + DELIMITER.len();
        if !piece.is_empty() {
            pieces.push(piece);
        }
    }
    if let Some(offset) = text[index..].find(END) {
        let piece = text[index..index + offset].trim();
        index += offset + END.len();
        if !piece.is_empty() {
            pieces.push(piece);
        }
    }

    let mut extra = &text[index..];
    if last_ditch {
        extra = extra.strip_suffix(LAST_DITCH_SUFFIX).unwrap_or(extra);
    }

    let mut parts = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let value: Value =
            serde_json::from_str(piece).map_err(|source| ParseError::new(piece, source))?;
        parts.push(Fragment::new(value));
    }
    Ok(ParseResult {
        parts,
        extra: extra.to_owned(),
    })
}

/// Stateful multipart scanner that carries `extra` across chunks.
///
/// Each [`push_chunk`](StreamParser::push_chunk) call prepends the retained
/// remainder to the incoming chunk, so records split across chunk
/// boundaries decode exactly once.
#[derive(Debug, Default)]
pub struct StreamParser {
    extra: String,
}

impl StreamParser {
    /// Create a parser with no retained remainder.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// The currently-retained unconsumed text.
    #[must_use]
    pub fn extra(&self) -> &str { &self.extra }

    /// Feed one chunk, returning any records it completed.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when a completed record fails to decode. The
    /// buffer is retained unchanged so the caller can inspect it.
    pub fn push_chunk(&mut self, chunk: &str) -> Result<Vec<Fragment>, ParseError> {
        let mut buffer = std::mem::take(&mut self.extra);
        buffer.push_str(chunk);
        match parse(&buffer, true, false) {
            Ok(result) => {
                self.extra = result.extra;
                Ok(result.parts)
            }
            Err(err) => {
                self.extra = buffer;
                Err(err)
            }
        }
    }

    /// Re-scan the retained remainder once in last-ditch mode, consuming it
    /// on success.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the recovered suffix fails to decode; the
    /// remainder is retained unchanged.
    pub fn finish(&mut self) -> Result<Vec<Fragment>, ParseError> {
        let buffer = std::mem::take(&mut self.extra);
        match parse(&buffer, true, true) {
            Ok(result) => {
                self.extra = result.extra;
                Ok(result.parts)
            }
            Err(err) => {
                self.extra = buffer;
                Err(err)
            }
        }
    }
}
