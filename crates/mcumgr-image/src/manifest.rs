//! `manifest.json` schema for a ZIP DFU package (§3).

use serde::Deserialize;

/// Firmware revision pair carried in the manifest's `firmware` object.
#[derive(Debug, Clone, Deserialize)]
pub struct FirmwareRevisions {
    /// Zephyr tree revision the package was built against, if any.
    pub zephyr: Option<RevisionInfo>,
    /// nRF Connect SDK revision the package was built against, if any.
    pub nrf: Option<RevisionInfo>,
}

/// A single `{revision}` object inside [`FirmwareRevisions`].
#[derive(Debug, Clone, Deserialize)]
pub struct RevisionInfo {
    /// Revision string (commit hash, tag, or free-form label).
    pub revision: String,
}

/// One entry in the manifest's `files` array (§3).
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestFile {
    /// Image kind as labeled by the packaging tool (e.g. `"application"`).
    #[serde(rename = "type")]
    pub file_type: String,
    /// Target board identifier.
    pub board: Option<String>,
    /// Target SoC identifier.
    pub soc: Option<String>,
    /// Flash load address.
    pub load_address: Option<u32>,
    /// Image index, encoded as a decimal string in the manifest.
    pub image_index: String,
    /// Primary slot index for this image.
    pub slot_index_primary: Option<u32>,
    /// Secondary slot index for this image.
    pub slot_index_secondary: Option<u32>,
    /// MCUboot's own version string, if the packaging tool recorded one.
    #[serde(rename = "version_MCUBOOT")]
    pub version_mcuboot: Option<String>,
    /// Size of the binary in bytes, as recorded by the packaging tool.
    pub size: u64,
    /// Archive member name of the binary.
    pub file: String,
    /// Build-tool modification time, free-form.
    pub modtime: Option<String>,
    /// Application version string.
    pub version: Option<String>,
}

/// Top-level `manifest.json` schema (§3).
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Manifest schema version.
    #[serde(rename = "format-version")]
    pub format_version: u32,
    /// Package build timestamp, free-form.
    pub time: Option<u64>,
    /// Package name.
    pub name: String,
    /// Firmware revision metadata.
    pub firmware: Option<FirmwareRevisions>,
    /// One entry per image binary in the package.
    pub files: Vec<ManifestFile>,
}
