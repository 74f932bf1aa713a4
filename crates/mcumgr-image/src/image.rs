//! Whole-image decode: header + TLV trailer (§4.I `decode_image`).

use crate::{
    ImageError,
    header::ImageHeader,
    tlv::{TlvEntry, find_image_hash, parse_tlv_areas},
};

/// A fully decoded MCUboot image file.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// The 32-byte image header.
    pub header: ImageHeader,
    /// Every TLV entry found across all trailer areas.
    pub tlv: Vec<TlvEntry>,
    /// The signed image body (header excluded, TLV trailer excluded).
    pub content: Vec<u8>,
    /// The SHA-256 hash carried in the unprotected TLV trailer (§3 invariant).
    pub hash: [u8; 32],
}

/// Decode a complete MCUboot image file: header, then the TLV trailer
/// starting at `header_size + image_size` (§3, §4.I).
///
/// # Errors
///
/// [`ImageError::FormatError`] if the magic doesn't match, the file is
/// truncated before the declared TLV trailer, or no unprotected TLV entry
/// of type `0x10` (32-byte SHA-256) is present.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, ImageError> {
    let header = ImageHeader::parse(bytes)?;
    let trailer_start = header.header_size as usize + header.image_size as usize;

    if trailer_start > bytes.len() {
        return Err(ImageError::FormatError(format!(
            "TLV trailer starts at {trailer_start} but image is only {} bytes",
            bytes.len()
        )));
    }

    let content_start = header.header_size as usize;
    if content_start > trailer_start {
        return Err(ImageError::FormatError("header_size exceeds TLV trailer offset".into()));
    }
    let content = bytes[content_start..trailer_start].to_vec();

    let tlv = parse_tlv_areas(&bytes[trailer_start..])?;
    let hash = find_image_hash(&tlv)?;

    Ok(DecodedImage { header, tlv, content, hash })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::header::IMAGE_MAGIC;

    fn build_image(body: &[u8], hash: [u8; 32]) -> Vec<u8> {
        let header_size = ImageHeader::SIZE as u16;
        let mut bytes = vec![0u8; header_size as usize];
        bytes[0..4].copy_from_slice(&IMAGE_MAGIC.to_le_bytes());
        bytes[8..10].copy_from_slice(&header_size.to_le_bytes());
        bytes[12..16].copy_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(body);

        let mut tlv_body = Vec::new();
        tlv_body.push(0x10u8);
        tlv_body.push(0);
        tlv_body.extend_from_slice(&32u16.to_le_bytes());
        tlv_body.extend_from_slice(&hash);
        let total_len = (4 + tlv_body.len()) as u16;
        bytes.extend_from_slice(&0x6907u16.to_le_bytes());
        bytes.extend_from_slice(&total_len.to_le_bytes());
        bytes.extend_from_slice(&tlv_body);

        bytes
    }

    #[test]
    fn decodes_hash_from_valid_image() {
        let hash = [0xAAu8; 32];
        let bytes = build_image(b"firmware body bytes", hash);
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded.hash, hash);
        assert_eq!(decoded.content, b"firmware body bytes");
    }

    #[test]
    fn rejects_truncated_trailer() {
        let hash = [0x22u8; 32];
        let mut bytes = build_image(b"abc", hash);
        bytes.truncate(bytes.len() - 10);
        assert!(decode_image(&bytes).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = build_image(b"abc", [1u8; 32]);
        bytes[0] = 0;
        assert!(decode_image(&bytes).is_err());
    }
}
