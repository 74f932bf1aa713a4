//! ZIP DFU package decode (§3, §4.I `decode_zip`): read `manifest.json` and
//! decode every binary it names as an MCUboot image.

use std::io::{Cursor, Read};

use sha2::{Digest, Sha256};
use zip::ZipArchive;

use crate::{
    ImageError,
    image::{DecodedImage, decode_image},
    manifest::{Manifest, ManifestFile},
};

/// One image extracted from a ZIP DFU package, decoded and matched up with
/// its manifest metadata (§3).
#[derive(Debug, Clone)]
pub struct ZipImage {
    /// The decoded MCUboot image (header, TLV entries, body, hash).
    pub image: DecodedImage,
    /// The package's `name` field (shared across every image in the package).
    pub name: String,
    /// This image's `image_index`, parsed from the manifest's string field.
    pub index: u32,
    /// SHA-256 of the complete binary file, as uploaded in the `sha` field
    /// of an image-upload request — distinct from `image.hash`, which is
    /// the TLV-trailer hash of the image body alone (§3).
    pub sha: [u8; 32],
    /// The manifest's metadata for this file entry.
    pub file: ManifestFile,
}

/// Decode every image named in a ZIP DFU package's `manifest.json` (§4.I).
///
/// # Errors
///
/// [`ImageError::Zip`] if the archive can't be opened or a named member is
/// missing; [`ImageError::Manifest`] if `manifest.json` is absent or not
/// valid JSON; [`ImageError::FormatError`] if a named binary fails to
/// decode as an MCUboot image.
pub fn decode_zip(bytes: &[u8]) -> Result<Vec<ZipImage>, ImageError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| ImageError::Zip(e.to_string()))?;

    let manifest: Manifest = {
        let mut manifest_file = archive
            .by_name("manifest.json")
            .map_err(|e| ImageError::Manifest(format!("manifest.json not found: {e}")))?;
        let mut text = String::new();
        manifest_file
            .read_to_string(&mut text)
            .map_err(|e| ImageError::Manifest(format!("could not read manifest.json: {e}")))?;
        serde_json::from_str(&text).map_err(|e| ImageError::Manifest(e.to_string()))?
    };

    let mut images = Vec::with_capacity(manifest.files.len());
    for file in manifest.files {
        let mut binary_file = archive
            .by_name(&file.file)
            .map_err(|e| ImageError::Zip(format!("member `{}` not found: {e}", file.file)))?;
        let mut binary = Vec::new();
        binary_file
            .read_to_end(&mut binary)
            .map_err(|e| ImageError::Zip(format!("could not read `{}`: {e}", file.file)))?;
        drop(binary_file);

        let image = decode_image(&binary)?;
        let sha: [u8; 32] = Sha256::digest(&binary).into();
        let index: u32 = file
            .image_index
            .parse()
            .map_err(|_| ImageError::Manifest(format!("image_index `{}` is not an integer", file.image_index)))?;

        images.push(ZipImage { image, name: manifest.name.clone(), index, sha, file });
    }

    Ok(images)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use zip::{ZipWriter, write::SimpleFileOptions};

    use super::*;
    use crate::header::IMAGE_MAGIC;
    use crate::header::ImageHeader;

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

    fn build_package(image_bytes: &[u8]) -> Vec<u8> {
        let manifest = serde_json::json!({
            "format-version": 1,
            "time": 1_700_000_000,
            "name": "demo-package",
            "firmware": { "zephyr": { "revision": "abc123" }, "nrf": null },
            "files": [{
                "type": "application",
                "board": "nrf52840dk",
                "soc": "nrf52840",
                "load_address": 0,
                "image_index": "0",
                "slot_index_primary": 1,
                "slot_index_secondary": 2,
                "version_MCUBOOT": null,
                "size": image_bytes.len(),
                "file": "app.bin",
                "modtime": null,
                "version": "1.0.0",
            }],
        });

        let mut buf = Vec::new();
        {
            let mut writer = ZipWriter::new(Cursor::new(&mut buf));
            let options = SimpleFileOptions::default();
            writer.start_file("manifest.json", options).unwrap();
            writer.write_all(manifest.to_string().as_bytes()).unwrap();
            writer.start_file("app.bin", options).unwrap();
            writer.write_all(image_bytes).unwrap();
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn decodes_single_image_package() {
        let hash = [0x5Au8; 32];
        let image_bytes = build_image(b"application body", hash);
        let package = build_package(&image_bytes);

        let images = decode_zip(&package).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].name, "demo-package");
        assert_eq!(images[0].index, 0);
        assert_eq!(images[0].image.hash, hash);
        assert_eq!(images[0].sha.len(), 32);
        assert_eq!(images[0].file.board.as_deref(), Some("nrf52840dk"));
    }

    #[test]
    fn missing_manifest_is_rejected() {
        let mut buf = Vec::new();
        {
            let mut writer = ZipWriter::new(Cursor::new(&mut buf));
            writer.start_file("app.bin", SimpleFileOptions::default()).unwrap();
            writer.write_all(b"not a manifest package").unwrap();
            writer.finish().unwrap();
        }
        assert!(matches!(decode_zip(&buf), Err(ImageError::Manifest(_))));
    }
}
