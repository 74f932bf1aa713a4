//! Construction-time defaults (§6), grouped instead of scattered through
//! call sites as magic numbers.

use std::time::Duration;

/// Default per-request timeout and chunking parameters.
#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    /// Per-request timeout used when a caller doesn't specify one.
    pub default_timeout: Duration,
    /// Default sliding-window size for uploads.
    pub default_window: usize,
    /// Default MCUmgr buffer size assumed before `params()` succeeds.
    pub default_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
            default_window: 1,
            default_buffer_size: 20,
        }
    }
}

/// Buffer parameters reported by (or assumed for) the device (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferParams {
    /// Maximum MCUmgr buffer size in bytes.
    pub buf_size: u64,
    /// Number of buffers the device can queue.
    pub buf_count: u64,
}

impl Default for BufferParams {
    /// The fallback a caller should use when `params()` fails (§4.D).
    fn default() -> Self {
        Self { buf_size: 20, buf_count: 1 }
    }
}
