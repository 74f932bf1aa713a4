//! Image group operations (§4.E, group = 1).

use std::time::Duration;

use ciborium::Value;
use mcumgr_proto::{Message, Op, group, value};

use crate::{
    client::Client,
    errors::{ClientError, Result},
    os_ops::check_device_error,
    uploader::{ChunkBuilder, upload},
};

/// State of one firmware image slot (§3), as returned by
/// [`Client::read_image_state`] and [`Client::set_pending_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageState {
    /// Image number; defaults to 0 when the device omits it.
    pub image: u32,
    /// Slot number within the image.
    pub slot: u32,
    /// Version string as set by the image-signing tool.
    pub version: String,
    /// SHA-256 of the image header and body (the MCUboot TLV hash, not the
    /// hash of the whole file).
    pub hash: Option<[u8; 32]>,
    /// True if the image's bootable flag is set.
    pub bootable: bool,
    /// True if the image is staged for the next swap.
    pub pending: bool,
    /// True if the image has been confirmed.
    pub confirmed: bool,
    /// True if the image is the currently running application.
    pub active: bool,
    /// True if the image stays in the primary slot across the next boot.
    pub permanent: bool,
}

/// Response to `readImageState` / `setPendingImage` (§4.E).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageStateResponse {
    /// Device-reported split-image status.
    pub split_status: i64,
    /// One entry per known image slot.
    pub images: Vec<ImageState>,
}

/// One slot's geometry, as returned by [`Client::slot_info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfoSlot {
    /// Slot number within the image.
    pub slot: u32,
    /// Size of the slot in bytes.
    pub size: u64,
    /// Image id external tools should use to upload to this slot.
    pub upload_image_id: Option<u32>,
}

/// One image's slot collection, as returned by [`Client::slot_info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfoImage {
    /// The image number.
    pub image: u32,
    /// Slots available for this image.
    pub slots: Vec<SlotInfoSlot>,
    /// Maximum uploadable size for this image number.
    pub max_image_size: Option<u64>,
}

fn parse_image_state(value: &Value) -> Result<ImageState> {
    Ok(ImageState {
        image: value::get_u64_opt(value, "image").unwrap_or(0) as u32,
        slot: value::get_u64(value, "slot").map_err(|e| ClientError::UnexpectedPayload(e.to_string()))? as u32,
        version: value::get_str(value, "version").map_err(|e| ClientError::UnexpectedPayload(e.to_string()))?,
        hash: value::get_bytes_opt(value, "hash").and_then(|b| <[u8; 32]>::try_from(b).ok()),
        bootable: value::get_bool_or(value, "bootable", false),
        pending: value::get_bool_or(value, "pending", false),
        confirmed: value::get_bool_or(value, "confirmed", false),
        active: value::get_bool_or(value, "active", false),
        permanent: value::get_bool_or(value, "permanent", false),
    })
}

fn parse_image_state_response(payload: &Value) -> Result<ImageStateResponse> {
    let images_value =
        value::get_array(payload, "images").map_err(|e| ClientError::UnexpectedPayload(e.to_string()))?;
    let images = images_value.iter().map(parse_image_state).collect::<Result<Vec<_>>>()?;
    let split_status = value::get_i64_opt(payload, "splitStatus").unwrap_or(0);
    Ok(ImageStateResponse { split_status, images })
}

impl Client {
    /// Read the state of every known image slot.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn read_image_state(&self, timeout: impl Into<Option<Duration>>) -> Result<ImageStateResponse> {
        let request = Message {
            op: Op::Read,
            flags: 0,
            group: group::IMAGE,
            sequence: 0,
            id: 0,
            payload: value::map([]),
        };
        let response = self.execute(request, timeout).await?;
        check_device_error(&response.payload)?;
        parse_image_state_response(&response.payload)
    }

    /// Mark the image identified by `hash` as pending (or, if `hash` is
    /// empty, the currently booted image), optionally confirming it
    /// immediately (§4.E).
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn set_pending_image(
        &self,
        hash: &[u8],
        confirm: bool,
        timeout: impl Into<Option<Duration>>,
    ) -> Result<ImageStateResponse> {
        let mut fields = vec![("confirm", Value::Bool(confirm))];
        if !hash.is_empty() {
            fields.push(("hash", Value::Bytes(hash.to_vec())));
        }

        let request = Message {
            op: Op::Write,
            flags: 0,
            group: group::IMAGE,
            sequence: 0,
            id: 0,
            payload: value::map(fields),
        };
        let response = self.execute(request, timeout).await?;
        check_device_error(&response.payload)?;
        parse_image_state_response(&response.payload)
    }

    /// Confirm the currently booted image. Equivalent to
    /// `set_pending_image(&[], true, timeout)`.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn confirm_image_state(&self, timeout: impl Into<Option<Duration>>) -> Result<ImageStateResponse> {
        self.set_pending_image(&[], true, timeout).await
    }

    /// Erase the inactive image slot.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn erase(&self, timeout: impl Into<Option<Duration>>) -> Result<()> {
        let request = Message {
            op: Op::Write,
            flags: 0,
            group: group::IMAGE,
            sequence: 0,
            id: 5,
            payload: value::map([]),
        };
        let response = self.execute(request, timeout).await?;
        check_device_error(&response.payload)
    }

    /// Query per-image slot geometry.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn slot_info(&self, timeout: impl Into<Option<Duration>>) -> Result<Vec<SlotInfoImage>> {
        let request = Message {
            op: Op::Read,
            flags: 0,
            group: group::IMAGE,
            sequence: 0,
            id: 6,
            payload: value::map([]),
        };
        let response = self.execute(request, timeout).await?;
        check_device_error(&response.payload)?;

        let images_value = value::get_array(&response.payload, "images")
            .map_err(|e| ClientError::UnexpectedPayload(e.to_string()))?;

        images_value
            .iter()
            .map(|image_value| {
                let slots_value = value::get_array(image_value, "slots")
                    .map_err(|e| ClientError::UnexpectedPayload(e.to_string()))?;
                let slots = slots_value
                    .iter()
                    .map(|slot_value| {
                        Ok(SlotInfoSlot {
                            slot: value::get_u64(slot_value, "slot")
                                .map_err(|e| ClientError::UnexpectedPayload(e.to_string()))?
                                as u32,
                            size: value::get_u64(slot_value, "size")
                                .map_err(|e| ClientError::UnexpectedPayload(e.to_string()))?,
                            upload_image_id: value::get_u64_opt(slot_value, "upload_image_id")
                                .map(|v| v as u32),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(SlotInfoImage {
                    image: value::get_u64_opt(image_value, "image").unwrap_or(0) as u32,
                    slots,
                    max_image_size: value::get_u64_opt(image_value, "max_image_size"),
                })
            })
            .collect()
    }

    /// Upload a firmware image using the shared windowed-chunking engine
    /// (§4.G), reporting progress via `on_progress` if given.
    ///
    /// `hash` is the target image's MCUboot TLV hash (§3), distinct from
    /// `sha` (the whole-file SHA-256 sent on the wire as the chunk `sha`
    /// field, §4.E); it is accepted here so callers have it on hand for
    /// [`Self::set_pending_image`] after the transfer completes, but the
    /// upload itself transfers every byte unconditionally — callers decide
    /// for themselves, via [`Self::read_image_state`], whether a transfer is
    /// worth starting.
    ///
    /// `chunk_budget`, `window`, and `timeout` each fall back to the
    /// matching [`crate::config::ClientConfig`] default when `None` (§6).
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    #[allow(clippy::too_many_arguments)]
    pub async fn upload_image(
        &self,
        image: u32,
        data: &[u8],
        _hash: &[u8],
        sha: &[u8],
        chunk_budget: impl Into<Option<usize>>,
        window: impl Into<Option<usize>>,
        timeout: impl Into<Option<Duration>>,
        on_progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<()> {
        let builder = ImageUploadBuilder { image, sha: sha.to_vec(), total_len: data.len() as u64 };
        upload(self, &builder, data, chunk_budget, window, timeout, on_progress).await
    }
}

/// Builds image-group upload payloads (§4.E, §4.G, §9's "shared chunking
/// engine" parameterization).
struct ImageUploadBuilder {
    image: u32,
    sha: Vec<u8>,
    total_len: u64,
}

impl ChunkBuilder for ImageUploadBuilder {
    fn group(&self) -> u16 {
        group::IMAGE
    }

    fn id(&self) -> u8 {
        1
    }

    fn first_chunk(&self, data: &[u8]) -> Value {
        value::map([
            ("image", Value::from(u64::from(self.image))),
            ("len", Value::from(self.total_len)),
            ("off", Value::from(0u64)),
            ("sha", Value::Bytes(self.sha.clone())),
            ("data", Value::Bytes(data.to_vec())),
        ])
    }

    fn next_chunk(&self, off: u64, data: &[u8]) -> Value {
        value::map([("off", Value::from(off)), ("data", Value::Bytes(data.to_vec()))])
    }
}
