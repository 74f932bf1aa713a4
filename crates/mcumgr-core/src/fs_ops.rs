//! Filesystem group operations (§4.F, group = 8, id = 0).

use std::time::Duration;

use ciborium::Value;
use mcumgr_proto::{group, value};

use crate::{
    client::Client,
    downloader::download,
    errors::Result,
    uploader::{ChunkBuilder, upload},
};

/// Anything that can accept downloaded bytes as they arrive (§4.H).
///
/// Out-of-scope (§1) file I/O primitives live outside this crate; callers
/// hand us a sink (an in-memory `Vec<u8>`, a wrapped file handle, whatever
/// fits their host environment) rather than a path.
pub trait DownloadSink: Send {
    /// Append a chunk of downloaded data.
    fn extend(&mut self, chunk: &[u8]);
}

impl DownloadSink for Vec<u8> {
    fn extend(&mut self, chunk: &[u8]) {
        self.extend_from_slice(chunk);
    }
}

impl Client {
    /// Download `device_path` into `sink`, chunked sequentially (§4.H).
    ///
    /// `timeout` falls back to [`crate::config::ClientConfig::default_timeout`]
    /// when `None` (§6).
    ///
    /// # Errors
    ///
    /// [`crate::errors::ClientError::Overrun`] if the device sends more
    /// bytes than it originally advertised; otherwise see
    /// [`crate::errors::ClientError`].
    pub async fn download_file(
        &self,
        device_path: &str,
        sink: &mut dyn DownloadSink,
        timeout: impl Into<Option<Duration>>,
        on_progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<()> {
        download(self, device_path, sink, timeout, on_progress).await
    }

    /// Upload `data` to `device_path` using the shared windowed-chunking
    /// engine (§4.G).
    ///
    /// `chunk_budget`, `window`, and `timeout` each fall back to the
    /// matching [`crate::config::ClientConfig`] default when `None` (§6).
    ///
    /// # Errors
    ///
    /// See [`crate::errors::ClientError`].
    pub async fn upload_data(
        &self,
        device_path: &str,
        data: &[u8],
        chunk_budget: impl Into<Option<usize>>,
        window: impl Into<Option<usize>>,
        timeout: impl Into<Option<Duration>>,
        on_progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<()> {
        let builder = FsUploadBuilder { name: device_path.to_string(), total_len: data.len() as u64 };
        upload(self, &builder, data, chunk_budget, window, timeout, on_progress).await
    }
}

/// Builds filesystem-group upload payloads (§4.F, §4.G).
struct FsUploadBuilder {
    name: String,
    total_len: u64,
}

impl ChunkBuilder for FsUploadBuilder {
    fn group(&self) -> u16 {
        group::FS
    }

    fn id(&self) -> u8 {
        0
    }

    fn first_chunk(&self, data: &[u8]) -> Value {
        value::map([
            ("name", Value::Text(self.name.clone())),
            ("len", Value::from(self.total_len)),
            ("off", Value::from(0u64)),
            ("data", Value::Bytes(data.to_vec())),
        ])
    }

    fn next_chunk(&self, off: u64, data: &[u8]) -> Value {
        value::map([
            ("name", Value::Text(self.name.clone())),
            ("off", Value::from(off)),
            ("data", Value::Bytes(data.to_vec())),
        ])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mcumgr_harness::SyntheticDevice;

    use super::*;

    #[tokio::test]
    async fn upload_data_completes_full_file() {
        let data = vec![3u8; 500];
        let (device, transport) = SyntheticDevice::new();
        device
            .on(group::FS, 0, |req| {
                let off = value::get_u64(req, "off").unwrap_or(0);
                let chunk_len = value::get_bytes(req, "data").map(|d| d.len() as u64).unwrap_or(0);
                value::map([("off", Value::from(off + chunk_len))])
            })
            .await;

        let client = Client::open(Box::new(transport));
        client
            .upload_data("/lfs/a.bin", &data, 128, 2, Duration::from_secs(1), None)
            .await
            .unwrap();
        client.close().await;
    }
}
