//! [`Frame`]: the 8-byte header plus its CBOR-encoded payload.

use bytes::{BufMut, Bytes};

use crate::{
    errors::{CodecError, Result},
    header::FrameHeader,
};

/// A complete SMP frame: header plus already-CBOR-encoded payload bytes.
///
/// This is a pure data holder. Payload maps are built and read through
/// [`crate::value`] before a `Frame` is constructed; `Frame` itself never
/// parses CBOR, so routing (matching `(group, id, sequence)`) never requires
/// touching the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The 8-byte header.
    pub header: FrameHeader,
    /// Canonical-CBOR-encoded payload map.
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame, setting the header's `length` field to match `payload`.
    ///
    /// # Panics
    ///
    /// Panics if `payload.len()` does not fit in `u16`. The windowed
    /// uploader's dynamic chunk sizing (`BufferTooSmall`) keeps every
    /// payload this library constructs well under that bound.
    #[must_use]
    pub fn new(mut header: FrameHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        #[allow(clippy::expect_used)]
        let len = u16::try_from(payload.len())
            .expect("invariant: SMP payloads stay under 64 KiB (chunk budget enforced upstream)");
        header = FrameHeader::new(
            header.op().unwrap_or(crate::header::Op::Write),
            header.flags(),
            header.group(),
            header.sequence(),
            header.id(),
            len,
        );
        Self { header, payload }
    }

    /// Write `[header][payload]` to `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        debug_assert_eq!(self.payload.len(), self.header.length() as usize);
        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.payload);
        Ok(())
    }

    /// Parse `[header][payload]` from `bytes`.
    ///
    /// # Errors
    ///
    /// [`CodecError::MalformedFrame`] if the header is invalid, or if the
    /// byte count doesn't exactly match the header's declared `length`
    /// (§4.A: short reads and trailing garbage are both rejected, never
    /// silently truncated).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::from_bytes(bytes)?;
        let payload_len = header.length() as usize;
        let total = FrameHeader::SIZE + payload_len;

        if bytes.len() != total {
            return Err(CodecError::MalformedFrame {
                reason: format!(
                    "declared length {payload_len} but {} bytes of payload present",
                    bytes.len().saturating_sub(FrameHeader::SIZE)
                ),
            });
        }

        let payload = Bytes::copy_from_slice(&bytes[FrameHeader::SIZE..total]);
        Ok(Self { header, payload })
    }
}
