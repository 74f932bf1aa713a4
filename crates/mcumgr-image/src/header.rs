//! MCUboot image header (§3): 32 bytes, little-endian.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// MCUboot image header magic (§3, glossary).
pub const IMAGE_MAGIC: u32 = 0x96F3_B83D;

/// Raw little-endian on-wire layout of the 32-byte MCUboot header.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug, Clone, Copy)]
#[repr(C)]
struct RawHeader {
    magic: [u8; 4],
    load_addr: [u8; 4],
    header_size: [u8; 2],
    reserved: [u8; 2],
    image_size: [u8; 4],
    flags: [u8; 4],
    version_major: u8,
    version_minor: u8,
    version_revision: [u8; 2],
    version_build: [u8; 4],
    trailing_reserved: [u8; 4],
}

/// The image version as set by the signing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Revision.
    pub revision: u16,
    /// Build number.
    pub build: u32,
}

/// A parsed MCUboot image header (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    /// Flash load address.
    pub load_addr: u32,
    /// Size of this header in bytes; the TLV trailer begins at
    /// `header_size + image_size`.
    pub header_size: u16,
    /// Size of the signed image body, excluding header and TLV trailer.
    pub image_size: u32,
    /// Header flags bitfield.
    pub flags: u32,
    /// Signing-tool version.
    pub version: ImageVersion,
}

impl ImageHeader {
    /// Size of the on-wire header in bytes.
    pub const SIZE: usize = std::mem::size_of::<RawHeader>();

    /// Parse the header from the start of an image file.
    ///
    /// # Errors
    ///
    /// [`super::ImageError::FormatError`] if the buffer is too short or the
    /// magic doesn't match.
    pub fn parse(bytes: &[u8]) -> Result<Self, super::ImageError> {
        if bytes.len() < Self::SIZE {
            return Err(super::ImageError::FormatError(format!(
                "image header truncated: need {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            )));
        }

        let raw = RawHeader::ref_from_bytes(&bytes[..Self::SIZE])
            .map_err(|_| super::ImageError::FormatError("malformed header layout".into()))?;

        let magic = u32::from_le_bytes(raw.magic);
        if magic != IMAGE_MAGIC {
            return Err(super::ImageError::FormatError(format!(
                "bad image magic: expected {IMAGE_MAGIC:#010x}, got {magic:#010x}"
            )));
        }

        Ok(Self {
            load_addr: u32::from_le_bytes(raw.load_addr),
            header_size: u16::from_le_bytes(raw.header_size),
            image_size: u32::from_le_bytes(raw.image_size),
            flags: u32::from_le_bytes(raw.flags),
            version: ImageVersion {
                major: raw.version_major,
                minor: raw.version_minor,
                revision: u16::from_le_bytes(raw.version_revision),
                build: u32::from_le_bytes(raw.version_build),
            },
        })
    }
}
