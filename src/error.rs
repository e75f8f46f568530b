//! Error types for body consumption.
//!
//! Range problems are not errors at this layer; they are encoded as the
//! status code of the constructed response. Only stream-level failures and
//! JSON handling surface through these types.

use thiserror::Error;

/// Failure while draining or decoding a response body.
///
/// Cloneable on purpose: the first drain's outcome is memoized and handed
/// out verbatim to every later caller, because the underlying stream cannot
/// be read a second time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BodyError {
    /// The one-shot body stream was already taken by an earlier drain.
    #[error("body stream already consumed")]
    AlreadyConsumed,
    /// I/O failure while reading the stream.
    #[error("failed to read body: {0}")]
    Read(String),
    /// The drained bytes are not valid UTF-8.
    #[error("body is not valid UTF-8: {0}")]
    Decode(String),
}

/// Failure while interpreting a body as JSON.
#[derive(Debug, Error)]
pub enum JsonError {
    /// The body could not be drained or decoded in the first place.
    #[error(transparent)]
    Body(#[from] BodyError),
    /// The body text is not valid JSON.
    #[error("invalid JSON body: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure reported by a [`FormDataParser`](crate::form::FormDataParser)
/// implementation.
#[derive(Debug, Error)]
pub enum FormDataError {
    /// The body could not be drained or decoded.
    #[error(transparent)]
    Body(#[from] BodyError),
    /// The payload does not follow the advertised form encoding.
    #[error("malformed form payload: {0}")]
    Malformed(String),
    /// The Content-Type is not one the parser understands.
    #[error("unsupported form media type: {0}")]
    UnsupportedMediaType(String),
}
