//! MCUboot TLV trailer (§3): one or more TLV areas following the image
//! body, each holding signature/hash entries as `type, length, value`
//! triples.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::ImageError;

/// Unprotected TLV area magic (§3, glossary).
pub const TLV_MAGIC_UNPROTECTED: u16 = 0x6907;
/// Protected TLV area magic (§3).
pub const TLV_MAGIC_PROTECTED: u16 = 0x6908;

/// TLV type naming the SHA-256 hash of the image (§3).
pub const TLV_TYPE_SHA256: u8 = 0x10;

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug, Clone, Copy)]
#[repr(C)]
struct RawAreaHeader {
    magic: [u8; 2],
    length: [u8; 2],
}

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug, Clone, Copy)]
#[repr(C)]
struct RawEntryHeader {
    ty: u8,
    reserved: u8,
    length: [u8; 2],
}

/// Whether a TLV area is protected (covered by the image signature) or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvAreaKind {
    /// Unprotected area; required to hold the image hash (§3).
    Unprotected,
    /// Protected area; signed alongside the image body.
    Protected,
}

/// One decoded `type, length, value` entry from a TLV area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvEntry {
    /// Which area this entry came from.
    pub area: TlvAreaKind,
    /// Entry type (e.g. [`TLV_TYPE_SHA256`]).
    pub ty: u8,
    /// Entry value bytes.
    pub value: Vec<u8>,
}

/// Parse every TLV area starting at `bytes[0]`, concatenating areas until
/// the buffer is exhausted (§3, §4.I).
///
/// # Errors
///
/// [`ImageError::FormatError`] if an area's declared length runs past the
/// end of `bytes`, or if neither area carries the required [`TLV_TYPE_SHA256`]
/// entry in its unprotected area.
pub fn parse_tlv_areas(bytes: &[u8]) -> Result<Vec<TlvEntry>, ImageError> {
    let mut entries = Vec::new();
    let mut offset = 0usize;
    let mut saw_unprotected = false;

    while offset + 4 <= bytes.len() {
        let area_header = RawAreaHeader::ref_from_bytes(&bytes[offset..offset + 4])
            .map_err(|_| ImageError::FormatError("malformed TLV area header".into()))?;
        let magic = u16::from_le_bytes(area_header.magic);
        let area_len = u16::from_le_bytes(area_header.length) as usize;

        let kind = match magic {
            TLV_MAGIC_UNPROTECTED => TlvAreaKind::Unprotected,
            TLV_MAGIC_PROTECTED => TlvAreaKind::Protected,
            other => {
                return Err(ImageError::FormatError(format!("unknown TLV area magic {other:#06x}")));
            },
        };
        if kind == TlvAreaKind::Unprotected {
            saw_unprotected = true;
        }

        if area_len < 4 || offset + area_len > bytes.len() {
            return Err(ImageError::FormatError(format!(
                "TLV area length {area_len} runs past end of buffer (offset {offset}, buffer {})",
                bytes.len()
            )));
        }

        let area_end = offset + area_len;
        let mut cursor = offset + 4;
        while cursor + 4 <= area_end {
            let entry_header = RawEntryHeader::ref_from_bytes(&bytes[cursor..cursor + 4])
                .map_err(|_| ImageError::FormatError("malformed TLV entry header".into()))?;
            let value_len = u16::from_le_bytes(entry_header.length) as usize;
            let value_start = cursor + 4;
            let value_end = value_start + value_len;
            if value_end > area_end {
                return Err(ImageError::FormatError(format!(
                    "TLV entry type {} length {value_len} runs past area end",
                    entry_header.ty
                )));
            }

            entries.push(TlvEntry {
                area: kind,
                ty: entry_header.ty,
                value: bytes[value_start..value_end].to_vec(),
            });
            cursor = value_end;
        }

        offset = area_end;
    }

    if !saw_unprotected {
        return Err(ImageError::FormatError("no unprotected TLV area present".into()));
    }

    Ok(entries)
}

/// Find the 32-byte SHA-256 hash entry in the unprotected area (§3 invariant).
///
/// # Errors
///
/// [`ImageError::FormatError`] if no such entry exists, or its value is not
/// exactly 32 bytes.
pub fn find_image_hash(entries: &[TlvEntry]) -> Result<[u8; 32], ImageError> {
    let entry = entries
        .iter()
        .find(|e| e.area == TlvAreaKind::Unprotected && e.ty == TLV_TYPE_SHA256)
        .ok_or_else(|| ImageError::FormatError("no unprotected SHA-256 TLV entry (type 0x10)".into()))?;

    <[u8; 32]>::try_from(entry.value.as_slice())
        .map_err(|_| ImageError::FormatError(format!("hash TLV value is {} bytes, expected 32", entry.value.len())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn build_area(magic: u16, entries: &[(u8, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (ty, value) in entries {
            body.push(*ty);
            body.push(0);
            body.extend_from_slice(&(value.len() as u16).to_le_bytes());
            body.extend_from_slice(value);
        }
        let total_len = (4 + body.len()) as u16;
        let mut out = Vec::new();
        out.extend_from_slice(&magic.to_le_bytes());
        out.extend_from_slice(&total_len.to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn finds_hash_in_unprotected_area() {
        let hash = [0xAAu8; 32];
        let bytes = build_area(TLV_MAGIC_UNPROTECTED, &[(TLV_TYPE_SHA256, &hash)]);
        let entries = parse_tlv_areas(&bytes).unwrap();
        assert_eq!(find_image_hash(&entries).unwrap(), hash);
    }

    #[test]
    fn concatenated_areas_are_both_parsed() {
        let hash = [0x11u8; 32];
        let mut bytes = build_area(TLV_MAGIC_PROTECTED, &[(0x20, b"sig-placeholder-bytes")]);
        bytes.extend(build_area(TLV_MAGIC_UNPROTECTED, &[(TLV_TYPE_SHA256, &hash)]));
        let entries = parse_tlv_areas(&bytes).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(find_image_hash(&entries).unwrap(), hash);
    }

    #[test]
    fn missing_unprotected_area_fails() {
        let bytes = build_area(TLV_MAGIC_PROTECTED, &[(0x20, b"sig")]);
        assert!(parse_tlv_areas(&bytes).is_err());
    }

    #[test]
    fn missing_hash_entry_fails() {
        let bytes = build_area(TLV_MAGIC_UNPROTECTED, &[(0x30, b"not-a-hash")]);
        let entries = parse_tlv_areas(&bytes).unwrap();
        assert!(find_image_hash(&entries).is_err());
    }
}
