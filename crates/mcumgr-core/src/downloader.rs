//! The resumable sequential downloader (§4.H): a single in-flight read at a
//! time (window = 1), driven by the cumulative byte count against the
//! length the device advertises on the first chunk.

use std::time::Duration;

use mcumgr_proto::{Message, Op, group, value};

use crate::{
    client::Client,
    errors::{ClientError, Result},
    fs_ops::DownloadSink,
    os_ops::check_device_error,
};

/// Download `device_path` into `sink` one chunk at a time.
///
/// The first chunk's response carries `len`, the file's total size; every
/// later chunk is appended until the running total reaches it. A single
/// chunk timing out fails the whole download (§4.H point 3: no retry).
/// `timeout` of `None` falls back to
/// [`crate::config::ClientConfig::default_timeout`] (§6).
///
/// # Errors
///
/// [`ClientError::Overrun`] if the device ever sends more bytes than it
/// advertised; otherwise see [`ClientError`].
pub async fn download(
    client: &Client,
    device_path: &str,
    sink: &mut dyn DownloadSink,
    timeout: impl Into<Option<Duration>>,
    mut on_progress: Option<&mut dyn FnMut(f64)>,
) -> Result<()> {
    let timeout = timeout.into().unwrap_or(client.config.default_timeout);
    let mut offset: u64 = 0;
    let mut advertised_len: Option<u64> = None;

    loop {
        let request = Message {
            op: Op::Read,
            flags: 0,
            group: group::FS,
            sequence: 0,
            id: 0,
            payload: value::map([
                ("name", ciborium::Value::Text(device_path.to_string())),
                ("off", ciborium::Value::from(offset)),
            ]),
        };

        let response = client.execute(request, timeout).await?;
        check_device_error(&response.payload)?;

        let chunk = value::get_bytes(&response.payload, "data")
            .map_err(|e| ClientError::UnexpectedPayload(e.to_string()))?;

        if offset == 0 {
            let len = value::get_u64(&response.payload, "len")
                .map_err(|e| ClientError::UnexpectedPayload(e.to_string()))?;
            advertised_len = Some(len);
        }

        let len = advertised_len.unwrap_or(0);
        let received = offset + chunk.len() as u64;
        if received > len {
            return Err(ClientError::Overrun { received, advertised: len });
        }

        sink.extend(&chunk);
        offset = received;

        if let Some(cb) = on_progress.as_deref_mut() {
            let fraction = if len == 0 { 1.0 } else { offset as f64 / len as f64 };
            cb(fraction.min(1.0));
        }

        if offset >= len {
            return Ok(());
        }
    }
}
