//! Wire format for the MCU Manager (MCUmgr) management protocol.
//!
//! This crate is the codec layer only (§4.A): the 8-byte SMP header, the
//! [`Frame`] container, and CBOR payload-map helpers. It performs no I/O and
//! pulls in no async runtime, so a packaging tool that only needs to read
//! image files can depend on [`mcumgr_image`](../mcumgr_image/index.html)
//! without dragging in `tokio`.

pub mod errors;
pub mod frame;
pub mod header;
pub mod message;
pub mod value;

pub use errors::{CodecError, Result};
pub use frame::Frame;
pub use header::{FrameHeader, Op, group};
pub use message::{Message, decode, encode};
