//! Error type for the image and ZIP-package decoder (§4.I, §7).

use thiserror::Error;

/// Errors raised while decoding an MCUboot image or a ZIP DFU package.
#[derive(Error, Debug)]
pub enum ImageError {
    /// Header, TLV, or manifest structure did not match the expected shape.
    #[error("image format error: {0}")]
    FormatError(String),

    /// The ZIP archive itself could not be read.
    #[error("zip archive error: {0}")]
    Zip(String),

    /// `manifest.json` was present but not valid JSON, or didn't match the
    /// expected schema.
    #[error("manifest parse error: {0}")]
    Manifest(String),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, ImageError>;
