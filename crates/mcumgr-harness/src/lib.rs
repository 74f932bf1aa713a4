//! An in-memory [`Transport`] plus a scriptable synthetic device, so the
//! router, group operations, and transfer engines can be exercised without
//! real hardware (§8: concrete scenarios S1, S2, S4, S5, S6, S7).
//!
//! Unlike the teacher's network-wide deterministic simulator, there is
//! exactly one connection here and no multi-node scheduling to model, so a
//! single in-process mock transport is enough; no simulated-network runtime
//! dependency is pulled in.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use ciborium::Value;
use mcumgr_core::{errors::TransportError, transport::Transport};
use mcumgr_proto::{Message, Op, decode, encode, header::FrameHeader};
use tokio::sync::{Mutex, mpsc};

/// What a registered handler does with one request payload.
pub enum Reply {
    /// Respond with this payload map.
    Value(Value),
    /// Drop the request silently (simulates a lost frame / device hang).
    Drop,
}

type Handler = Box<dyn FnMut(&Value) -> Reply + Send>;

struct Handlers {
    by_key: HashMap<(u16, u8), Handler>,
}

/// A scriptable stand-in for a real MCUmgr device.
///
/// Register a handler per `(group, id)`; each inbound request for that key
/// invokes the handler with the decoded payload and sends back whatever
/// [`Reply`] it returns.
#[derive(Clone)]
pub struct SyntheticDevice {
    handlers: Arc<Mutex<Handlers>>,
    log: Arc<Mutex<Vec<Message>>>,
}

impl SyntheticDevice {
    /// Create a device and its paired client-side transport.
    #[must_use]
    pub fn new() -> (Self, InMemoryTransport) {
        let handlers = Arc::new(Mutex::new(Handlers { by_key: HashMap::new() }));
        let log = Arc::new(Mutex::new(Vec::new()));
        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();

        let device = Self { handlers: Arc::clone(&handlers), log: Arc::clone(&log) };
        let transport = InMemoryTransport {
            handlers,
            log,
            to_client: to_client_tx,
            from_device: to_client_rx,
            closed: false,
        };
        (device, transport)
    }

    /// Every fully-decoded request this device has received so far, in
    /// arrival order. Lets property tests inspect header fields (sequence,
    /// op) that a `(group, id) -> Reply` handler alone can't see.
    pub async fn requests(&self) -> Vec<Message> {
        self.log.lock().await.clone()
    }

    /// Register a handler that always replies with a value built from the
    /// request payload.
    pub async fn on(&self, group: u16, id: u8, mut f: impl FnMut(&Value) -> Value + Send + 'static) {
        self.handlers.lock().await.by_key.insert((group, id), Box::new(move |req| Reply::Value(f(req))));
    }

    /// Register a handler with full control over whether to reply at all
    /// (used to simulate a dropped/never-answered request, §8 S7).
    pub async fn on_reply(&self, group: u16, id: u8, f: impl FnMut(&Value) -> Reply + Send + 'static) {
        self.handlers.lock().await.by_key.insert((group, id), Box::new(f));
    }
}

impl Default for SyntheticDevice {
    fn default() -> Self {
        Self::new().0
    }
}

/// The client-facing half of [`SyntheticDevice`]: implements [`Transport`].
pub struct InMemoryTransport {
    handlers: Arc<Mutex<Handlers>>,
    log: Arc<Mutex<Vec<Message>>>,
    to_client: mpsc::UnboundedSender<Vec<u8>>,
    from_device: mpsc::UnboundedReceiver<Vec<u8>>,
    closed: bool,
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let request =
            decode(frame).map_err(|e| TransportError::Io(format!("bad request frame: {e}")))?;
        self.log.lock().await.push(request.clone());

        let key = (request.group, request.id);
        let reply = {
            let mut handlers = self.handlers.lock().await;
            handlers.by_key.get_mut(&key).map(|h| h(&request.payload))
        };

        let Some(Reply::Value(payload)) = reply else {
            return Ok(());
        };

        let response_op = match request.op {
            Op::Read => Op::ReadResponse,
            Op::Write => Op::WriteResponse,
            already_response => already_response,
        };

        let response = mcumgr_proto::Message {
            op: response_op,
            flags: 0,
            group: request.group,
            sequence: request.sequence,
            id: request.id,
            payload,
        };

        let wire = encode(&response).map_err(|e| TransportError::Io(e.to_string()))?;
        let _ = self.to_client.send(wire);
        Ok(())
    }

    async fn recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.from_device.recv().await)
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Minimum bytes needed to hold a header plus `payload_len` bytes; used by
/// tests that need to reason about the 8-byte header overhead directly.
#[must_use]
pub fn frame_overhead() -> usize {
    FrameHeader::SIZE
}
