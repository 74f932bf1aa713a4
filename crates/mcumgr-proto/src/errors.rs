//! Error types for the wire-format layer.

use thiserror::Error;

/// Errors raised while encoding or decoding a frame.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Header or CBOR structure could not be parsed.
    #[error("malformed frame: {reason}")]
    MalformedFrame {
        /// What specifically failed to parse.
        reason: String,
    },

    /// CBOR encoding of the payload failed (e.g. a non-representable value).
    #[error("cbor encode failed: {0}")]
    EncodeFailed(String),
}

/// Result alias for the wire-format layer.
pub type Result<T> = std::result::Result<T, CodecError>;
