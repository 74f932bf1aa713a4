//! The windowed uploader (§4.G): a sliding-window chunking engine shared by
//! image upload and filesystem upload, parameterized over the payload
//! builder per §9's design note.

use std::{collections::VecDeque, time::Duration};

use ciborium::Value;
use futures::stream::{FuturesUnordered, StreamExt};
use mcumgr_proto::{FrameHeader, Message, Op, value};

use crate::{client::Client, errors::ClientError, os_ops::check_device_error};

/// Builds the request payload for one upload chunk.
///
/// Implemented once per group (image, filesystem); the uploader itself
/// knows nothing about which fields a first chunk carries versus a
/// continuation chunk.
pub trait ChunkBuilder {
    /// The management group this upload targets.
    fn group(&self) -> u16;
    /// The command id within that group.
    fn id(&self) -> u8;
    /// Build the first chunk's payload (carries `off: 0` plus any
    /// first-chunk-only metadata).
    fn first_chunk(&self, data: &[u8]) -> Value;
    /// Build a continuation chunk's payload at offset `off`.
    fn next_chunk(&self, off: u64, data: &[u8]) -> Value;
}

/// One in-flight chunk: `[offset, end)` within `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    offset: u64,
    end: u64,
}

/// Compute the maximum data-slice size for a chunk at `offset`, given the
/// CBOR overhead of every other field that chunk's payload carries (§4.G's
/// dynamic payload sizing).
fn data_budget(
    builder: &dyn ChunkBuilder,
    offset: u64,
    max_buffer: usize,
) -> Result<usize, ClientError> {
    let probe =
        if offset == 0 { builder.first_chunk(&[]) } else { builder.next_chunk(offset, &[]) };

    let mut probe_bytes = Vec::new();
    ciborium::into_writer(&probe, &mut probe_bytes)
        .map_err(|e| ClientError::UnexpectedPayload(e.to_string()))?;

    let overhead = probe_bytes.len();
    let budget = max_buffer
        .checked_sub(FrameHeader::SIZE)
        .and_then(|b| b.checked_sub(overhead))
        .and_then(|b| b.checked_sub(2)); // map-framing slack (§4.G)

    match budget {
        Some(b) if b > 0 => Ok(b),
        _ => Err(ClientError::BufferTooSmall),
    }
}

fn build_message(builder: &dyn ChunkBuilder, offset: u64, slice: &[u8]) -> Message {
    let payload =
        if offset == 0 { builder.first_chunk(slice) } else { builder.next_chunk(offset, slice) };
    Message { op: Op::Write, flags: 0, group: builder.group(), sequence: 0, id: builder.id(), payload }
}

async fn send_chunk(
    client: &Client,
    builder: &dyn ChunkBuilder,
    offset: u64,
    slice: &[u8],
    timeout: Duration,
) -> Result<(u64, u64), ClientError> {
    let end = offset + slice.len() as u64;
    let message = build_message(builder, offset, slice);
    let response = client.execute(message, timeout).await?;
    check_device_error(&response.payload)?;
    let next_offset = value::get_u64(&response.payload, "off")
        .map_err(|e| ClientError::UnexpectedPayload(e.to_string()))?;
    Ok((end, next_offset))
}

/// Run the windowed upload of `data` against `builder`, returning once the
/// device has acknowledged every byte.
///
/// `max_buffer`, `window`, and `timeout` of `None` fall back to
/// [`crate::config::ClientConfig`]'s `default_buffer_size`, `default_window`,
/// and `default_timeout` respectively (§6).
///
/// # Errors
///
/// [`ClientError::BufferTooSmall`] if the chunk budget computes to zero or
/// less; otherwise any [`ClientError`] surfaced by a chunk's `execute`
/// aborts the whole transfer (§4.G point 4).
pub async fn upload(
    client: &Client,
    builder: &dyn ChunkBuilder,
    data: &[u8],
    max_buffer: impl Into<Option<usize>>,
    window: impl Into<Option<usize>>,
    timeout: impl Into<Option<Duration>>,
    mut on_progress: Option<&mut dyn FnMut(f64)>,
) -> Result<(), ClientError> {
    let max_buffer = max_buffer.into().unwrap_or(client.config.default_buffer_size);
    let window = window.into().unwrap_or(client.config.default_window).max(1);
    let timeout = timeout.into().unwrap_or(client.config.default_timeout);
    let total = data.len() as u64;

    let mut pending: VecDeque<InFlight> = VecDeque::new();
    let mut resume: u64 = 0;
    let mut in_flight = FuturesUnordered::new();

    while pending.len() < window && resume < total {
        let budget = data_budget(builder, resume, max_buffer)?;
        let end = (resume + budget as u64).min(total);
        let slice = &data[resume as usize..end as usize];
        in_flight.push(send_chunk(client, builder, resume, slice, timeout));
        pending.push_back(InFlight { offset: resume, end });
        resume = end;
    }

    if pending.is_empty() && total == 0 {
        if let Some(cb) = on_progress.as_deref_mut() {
            cb(1.0);
        }
        return Ok(());
    }

    while let Some(result) = in_flight.next().await {
        let (acked_end, next_offset) = result?;

        let Some(idx) = pending.iter().position(|c| c.end == acked_end) else {
            continue; // chunk already abandoned
        };

        for _ in 0..=idx {
            pending.pop_front();
        }

        while let Some(front) = pending.front() {
            if front.offset == next_offset {
                break;
            }
            pending.pop_front();
        }

        resume = pending.back().map_or(next_offset, |c| c.end);

        while pending.len() < window && resume < total {
            let budget = data_budget(builder, resume, max_buffer)?;
            let end = (resume + budget as u64).min(total);
            let slice = &data[resume as usize..end as usize];
            in_flight.push(send_chunk(client, builder, resume, slice, timeout));
            pending.push_back(InFlight { offset: resume, end });
            resume = end;
        }

        if let Some(cb) = on_progress.as_deref_mut() {
            let fraction = next_offset as f64 / total.max(1) as f64;
            cb(fraction.min(1.0));
        }

        if next_offset == total && pending.is_empty() {
            return Ok(());
        }
    }

    Ok(())
}
