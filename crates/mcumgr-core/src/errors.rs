//! Error taxonomy for the router, group operations, and transfer engines.
//!
//! Each layer owns one `thiserror`-derived enum; lower-layer errors thread
//! upward through `#[from]` conversions rather than being stringified and
//! re-wrapped, following the layering in [`mcumgr_proto::errors`].

use thiserror::Error;

/// Errors from the transport boundary: link failures surface here and fail
/// every pending request (§4.B, §4.C).
#[derive(Error, Debug)]
pub enum TransportError {
    /// The underlying send/receive primitive failed.
    #[error("transport failed: {0}")]
    Io(String),

    /// The transport was closed (locally or by the peer) while in use.
    #[error("transport closed")]
    Closed,
}

/// Errors from the request router (§4.C, §7).
#[derive(Error, Debug)]
pub enum RouterError {
    /// Header or CBOR decode failure on a received frame.
    #[error(transparent)]
    MalformedFrame(#[from] mcumgr_proto::CodecError),

    /// No response matched the pending entry before its deadline.
    #[error("request timed out")]
    Timeout,

    /// The transport failed or was closed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The client was shut down while this request was still pending.
    #[error("client closed")]
    Closed,

    /// All 256 sequence slots are in use; no room for another request.
    #[error("pending-request table is full (256 concurrent requests)")]
    Overloaded,
}

/// The device-reported numeric result code carried by `rc` (§3, §7).
///
/// Named per the standard MCUmgr status codes so operators see `ENOENT`
/// rather than a bare `5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceErrorCode(pub i64);

impl std::fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self.0 {
            0 => "EOK",
            1 => "EUNKNOWN",
            2 => "ENOMEM",
            3 => "EINVAL",
            4 => "ETIMEOUT",
            5 => "ENOENT",
            6 => "EBADSTATE",
            7 => "EMSGSIZE",
            8 => "ENOTSUP",
            9 => "ECORRUPT",
            10 => "EBUSY",
            11 => "EACCESSDENIED",
            12 => "UNSUPPORTED_TOO_OLD",
            13 => "UNSUPPORTED_TOO_NEW",
            rc if rc >= 256 => return write!(f, "EPERUSER({rc})"),
            rc => return write!(f, "UNKNOWN({rc})"),
        };
        write!(f, "{name}")
    }
}

/// Errors surfaced by the public client (§7).
#[derive(Error, Debug)]
pub enum ClientError {
    /// The router failed to correlate or deliver the response.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// The response was structurally valid CBOR but missing a field this
    /// operation requires, or had the wrong type for it.
    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),

    /// The device responded with a non-zero `rc`.
    #[error("device returned error {0}")]
    Device(DeviceErrorCode),

    /// Dynamic chunk sizing (§4.G) produced a non-positive data budget.
    #[error("no room left for payload data after header and CBOR overhead")]
    BufferTooSmall,

    /// The downloader received more bytes than the device advertised (§4.H).
    #[error("received {received} bytes but device advertised length {advertised}")]
    Overrun {
        /// Bytes received so far, including the chunk that overran.
        received: u64,
        /// The `len` the device advertised in its first response.
        advertised: u64,
    },
}

impl From<mcumgr_proto::CodecError> for ClientError {
    fn from(err: mcumgr_proto::CodecError) -> Self {
        Self::Router(RouterError::MalformedFrame(err))
    }
}

/// Result alias for client-facing operations.
pub type Result<T> = std::result::Result<T, ClientError>;
