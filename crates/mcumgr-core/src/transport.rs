//! The transport capability contract (§4.B).
//!
//! A transport is polymorphic over `{send_frame, receive_frames, close}`. It
//! MUST NOT fragment or reassemble: one [`Transport::send_frame`] call puts
//! exactly one management frame on the wire, and each [`Transport::recv_frame`]
//! call yields exactly one complete frame. MTU-layer fragmentation (BLE
//! characteristic writes, serial chunking) is the transport's own concern,
//! invisible at this interface.

use async_trait::async_trait;

use crate::errors::TransportError;

/// A frame-oriented transport: BLE characteristic, serial link, or an
/// in-memory test double.
///
/// Implementations are driven by a single task (the router's receive loop
/// calls [`Self::recv_frame`] in a tight loop; `execute` calls
/// [`Self::send_frame`] under the router's write serialization, §5).
#[async_trait]
pub trait Transport: Send {
    /// Send one complete frame.
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Receive the next complete frame, or `Ok(None)` if the peer closed the
    /// link gracefully.
    async fn recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Release any underlying resources. Idempotent.
    async fn close(&mut self);
}

/// A transport built on an `AsyncRead + AsyncWrite` byte stream (serial
/// links), framing each message with its own 8-byte SMP header so reads
/// know exactly how many payload bytes follow.
pub mod stream {
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    use super::{Transport, TransportError};
    use async_trait::async_trait;
    use mcumgr_proto::FrameHeader;

    /// Frame-at-a-time transport over a raw byte stream.
    pub struct StreamTransport<S> {
        stream: S,
    }

    impl<S> StreamTransport<S> {
        /// Wrap an existing duplex byte stream (serial port, pipe, TCP socket
        /// used in integration tests).
        pub fn new(stream: S) -> Self {
            Self { stream }
        }
    }

    #[async_trait]
    impl<S: AsyncRead + AsyncWrite + Unpin + Send> Transport for StreamTransport<S> {
        async fn send_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
            self.stream.write_all(frame).await.map_err(|e| TransportError::Io(e.to_string()))?;
            self.stream.flush().await.map_err(|e| TransportError::Io(e.to_string()))?;
            Ok(())
        }

        async fn recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
            let mut header_buf = [0u8; FrameHeader::SIZE];
            match self.stream.read_exact(&mut header_buf).await {
                Ok(_) => {},
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(TransportError::Io(e.to_string())),
            }

            let header = FrameHeader::from_bytes(&header_buf)
                .map_err(|e| TransportError::Io(format!("invalid header: {e}")))?;

            let mut frame = header_buf.to_vec();
            let payload_len = header.length() as usize;
            if payload_len > 0 {
                let mut payload = vec![0u8; payload_len];
                self.stream
                    .read_exact(&mut payload)
                    .await
                    .map_err(|e| TransportError::Io(format!("payload read failed: {e}")))?;
                frame.extend_from_slice(&payload);
            }

            Ok(Some(frame))
        }

        async fn close(&mut self) {
            let _ = self.stream.shutdown().await;
        }
    }
}
