//! The 8-byte SMP frame header.
//!
//! Layout on the wire (big-endian multi-byte fields):
//! `op(1) | flags(1) | length(2) | group(2) | sequence(1) | id(1)`.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::{CodecError, Result};

/// SMP operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    /// Read request.
    Read = 0,
    /// Read response.
    ReadResponse = 1,
    /// Write request.
    Write = 2,
    /// Write response.
    WriteResponse = 3,
}

impl Op {
    /// Decode a raw op byte, if it names one of the four known values.
    #[must_use]
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Read),
            1 => Some(Self::ReadResponse),
            2 => Some(Self::Write),
            3 => Some(Self::WriteResponse),
            _ => None,
        }
    }

    /// True if this op is a request (as opposed to a response).
    #[must_use]
    pub fn is_request(self) -> bool {
        matches!(self, Self::Read | Self::Write)
    }
}

/// Management group numbers used by this client.
pub mod group {
    /// OS group (echo, reset, buffer params).
    pub const OS: u16 = 0;
    /// Image group (image state, upload, erase).
    pub const IMAGE: u16 = 1;
    /// Filesystem group.
    pub const FS: u16 = 8;
}

/// Raw 8-byte SMP header.
///
/// Multi-byte fields are stored as big-endian byte arrays rather than native
/// integers so the struct can be read directly off the wire with
/// [`zerocopy`] without a host-endian mismatch.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct FrameHeader {
    op: u8,
    flags: u8,
    length: [u8; 2],
    group: [u8; 2],
    sequence: u8,
    id: u8,
}

impl FrameHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 8;

    /// Build a header from typed fields, computing `length` from the payload.
    ///
    /// # Panics
    ///
    /// Panics if `payload_len` does not fit in `u16`. Callers are expected to
    /// have already validated the payload against the protocol's chunking
    /// budget, which keeps frames far below 64 KiB.
    #[must_use]
    pub fn new(op: Op, flags: u8, group: u16, sequence: u8, id: u8, payload_len: u16) -> Self {
        Self {
            op: op as u8,
            flags,
            length: payload_len.to_be_bytes(),
            group: group.to_be_bytes(),
            sequence,
            id,
        }
    }

    /// Parse a header from the first [`Self::SIZE`] bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedFrame`] if fewer than [`Self::SIZE`]
    /// bytes are available, or if the op byte does not name a known [`Op`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(CodecError::MalformedFrame {
                reason: format!("header needs {} bytes, got {}", Self::SIZE, bytes.len()),
            });
        }

        let header = Self::read_from_bytes(&bytes[..Self::SIZE]).map_err(|_| {
            CodecError::MalformedFrame { reason: "header layout mismatch".to_string() }
        })?;

        if Op::from_u8(header.op).is_none() {
            return Err(CodecError::MalformedFrame {
                reason: format!("unknown op byte {:#04x}", header.op),
            });
        }

        Ok(header)
    }

    /// Serialize to the 8-byte wire form.
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// The op byte, decoded. `None` only if the header was constructed
    /// without going through [`Self::from_bytes`] or [`Self::new`].
    #[must_use]
    pub fn op(&self) -> Option<Op> {
        Op::from_u8(self.op)
    }

    /// Flags byte, currently unused by this client beyond pass-through.
    #[must_use]
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Declared payload length.
    #[must_use]
    pub fn length(&self) -> u16 {
        u16::from_be_bytes(self.length)
    }

    /// Management group.
    #[must_use]
    pub fn group(&self) -> u16 {
        u16::from_be_bytes(self.group)
    }

    /// Request sequence number.
    #[must_use]
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Command id within the group.
    #[must_use]
    pub fn id(&self) -> u8 {
        self.id
    }

    /// The `(group, id, sequence)` key used for request/response correlation.
    #[must_use]
    pub fn correlation_key(&self) -> (u16, u8, u8) {
        (self.group(), self.id(), self.sequence())
    }
}
