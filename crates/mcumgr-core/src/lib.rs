//! Async client for the MCU Manager (MCUmgr) management protocol (§1).
//!
//! Builds on [`mcumgr_proto`] for the wire format and adds the transport
//! contract, the request router, and the OS/image/filesystem group
//! operations, including the shared windowed-upload engine and the
//! resumable sequential downloader.

pub mod client;
pub mod config;
pub mod errors;
pub mod router;
pub mod transport;

mod downloader;
mod fs_ops;
mod image_ops;
mod os_ops;
mod uploader;

pub use client::Client;
pub use config::{BufferParams, ClientConfig};
pub use errors::{ClientError, DeviceErrorCode, Result, RouterError, TransportError};
pub use fs_ops::DownloadSink;
pub use image_ops::{ImageState, ImageStateResponse, SlotInfoImage, SlotInfoSlot};
pub use uploader::ChunkBuilder;
