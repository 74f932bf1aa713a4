//! [`Message`]: a typed view over a [`Frame`] with a parsed CBOR payload.

use ciborium::Value;

use crate::{
    errors::{CodecError, Result},
    frame::Frame,
    header::{FrameHeader, Op},
};

/// A decoded (or about-to-be-encoded) SMP message: header fields plus a CBOR
/// map payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Request or response op.
    pub op: Op,
    /// Header flags, currently unused.
    pub flags: u8,
    /// Management group.
    pub group: u16,
    /// Sequence number (set by [`encode`] if left as a placeholder by the
    /// caller; routers overwrite it before sending).
    pub sequence: u8,
    /// Command id within the group.
    pub id: u8,
    /// Parsed payload map.
    pub payload: Value,
}

impl Message {
    /// The `(group, id, sequence)` correlation key.
    #[must_use]
    pub fn correlation_key(&self) -> (u16, u8, u8) {
        (self.group, self.id, self.sequence)
    }
}

/// Encode a [`Message`] into a complete wire frame.
///
/// The header's `length` is set to the exact CBOR payload byte count
/// (§4.A); canonical CBOR ordering is not required, only determinism on our
/// side, which [`ciborium`] already gives us.
pub fn encode(msg: &Message) -> Result<Vec<u8>> {
    let mut payload_bytes = Vec::new();
    ciborium::into_writer(&msg.payload, &mut payload_bytes)
        .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;

    let header = FrameHeader::new(
        msg.op,
        msg.flags,
        msg.group,
        msg.sequence,
        msg.id,
        u16::try_from(payload_bytes.len())
            .map_err(|_| CodecError::EncodeFailed("payload exceeds 64 KiB".to_string()))?,
    );
    let frame = Frame::new(header, payload_bytes);

    let mut wire = Vec::new();
    frame.encode(&mut wire)?;
    Ok(wire)
}

/// Decode a complete wire frame into a [`Message`].
///
/// # Errors
///
/// [`CodecError::MalformedFrame`] if the header or CBOR payload cannot be
/// parsed, or if the declared length does not match the CBOR tail.
pub fn decode(bytes: &[u8]) -> Result<Message> {
    let frame = Frame::decode(bytes)?;

    let op = frame
        .header
        .op()
        .ok_or_else(|| CodecError::MalformedFrame { reason: "unknown op byte".to_string() })?;

    let payload: Value = ciborium::from_reader(frame.payload.as_ref())
        .map_err(|e| CodecError::MalformedFrame { reason: format!("cbor decode failed: {e}") })?;

    Ok(Message {
        op,
        flags: frame.header.flags(),
        group: frame.header.group(),
        sequence: frame.header.sequence(),
        id: frame.header.id(),
        payload,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::value;

    fn arbitrary_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<u32>().prop_map(|v| Value::from(u64::from(v))),
            ".*".prop_map(Value::Text),
            proptest::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        ];
        leaf.prop_map(|v| v)
    }

    fn arbitrary_payload() -> impl Strategy<Value = Value> {
        proptest::collection::vec(("[a-z]{1,8}", arbitrary_value()), 0..6).prop_map(value::map)
    }

    proptest! {
        #[test]
        fn message_round_trip(
            op_idx in 0u8..4,
            group in any::<u16>(),
            sequence in any::<u8>(),
            id in any::<u8>(),
            payload in arbitrary_payload(),
        ) {
            #[allow(clippy::unwrap_used)]
            let op = crate::header::Op::from_u8(op_idx).unwrap();
            let msg = Message { op, flags: 0, group, sequence, id, payload };

            let wire = encode(&msg).expect("encode");
            let parsed = decode(&wire).expect("decode");

            prop_assert_eq!(parsed.op, msg.op);
            prop_assert_eq!(parsed.group, msg.group);
            prop_assert_eq!(parsed.sequence, msg.sequence);
            prop_assert_eq!(parsed.id, msg.id);
            prop_assert_eq!(parsed.payload, msg.payload);
        }
    }

    #[test]
    fn decode_rejects_bad_length() {
        let msg = Message { op: Op::Write, flags: 0, group: 0, sequence: 0, id: 0, payload: value::map([]) };
        let mut wire = encode(&msg).expect("encode");
        wire.truncate(wire.len() - 1);
        assert!(matches!(decode(&wire), Err(CodecError::MalformedFrame { .. })));
    }
}
