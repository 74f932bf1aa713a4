//! MCUboot image header/TLV decoder and ZIP DFU package reader (§4.I).
//!
//! Standalone from [`mcumgr_core`]: a packaging tool that only needs to
//! inspect image files or `.zip` packages can depend on this crate without
//! pulling in `tokio` or the async client.

pub mod errors;
pub mod header;
pub mod image;
pub mod manifest;
pub mod tlv;
pub mod zip;

pub use errors::{ImageError, Result};
pub use header::{ImageHeader, ImageVersion};
pub use image::{DecodedImage, decode_image};
pub use manifest::{FirmwareRevisions, Manifest, ManifestFile, RevisionInfo};
pub use tlv::{TlvAreaKind, TlvEntry};
pub use zip::{ZipImage, decode_zip};
