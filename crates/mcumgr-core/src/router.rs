//! The request router (§4.C): correlates responses to pending requests by
//! `(group, id, sequence)` and enforces per-request timeouts.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use mcumgr_proto::{Message, decode, encode};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::{
    errors::{RouterError, TransportError},
    transport::Transport,
};

type PendingKey = (u16, u8, u8);
type PendingSender = oneshot::Sender<Result<Message, RouterError>>;

struct RouterState {
    next_seq: u8,
    pending: HashMap<PendingKey, PendingSender>,
}

/// Removes `key` from the pending table when dropped, unless [`disarm`] was
/// called first (§4.C, §5: cancelling a caller's wait must not leak its
/// pending-table entry).
///
/// `execute` holds one of these across the whole request. On the success
/// and closed-channel paths `dispatch`/`fail_all` have already removed the
/// entry, so `execute` disarms the guard before returning; on every other
/// path (timeout, send failure, or the future simply being dropped by a
/// cancelling caller) the guard's `Drop` does the removal.
///
/// [`disarm`]: PendingGuard::disarm
struct PendingGuard {
    state: Arc<StdMutex<RouterState>>,
    key: PendingKey,
    armed: bool,
}

impl PendingGuard {
    #[must_use]
    fn new(state: Arc<StdMutex<RouterState>>, key: PendingKey) -> Self {
        Self { state, key, armed: true }
    }

    /// Disarm the guard: the entry has already been removed by whoever
    /// matched or drained it, so `Drop` must not touch the table again.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Ok(mut state) = self.state.lock() {
                state.pending.remove(&self.key);
            }
        }
    }
}

impl RouterState {
    /// Allocate the next free sequence number, scanning past any sequence
    /// currently held by a pending entry (§4.C).
    fn allocate_sequence(&mut self) -> Option<u8> {
        if self.pending.len() >= 256 {
            return None;
        }

        let in_use: std::collections::HashSet<u8> =
            self.pending.keys().map(|(_, _, seq)| *seq).collect();

        let start = self.next_seq;
        let mut candidate = start;
        loop {
            if !in_use.contains(&candidate) {
                self.next_seq = candidate.wrapping_add(1);
                return Some(candidate);
            }
            candidate = candidate.wrapping_add(1);
            if candidate == start {
                return None;
            }
        }
    }
}

/// Async request/response engine sitting on top of a [`Transport`].
///
/// Owns the pending-request table and sequence counter (§4.C, §5). A
/// background task exclusively owns the transport, multiplexing outgoing
/// writes and the receive loop so the router itself never blocks on I/O.
pub struct Router {
    outgoing: mpsc::Sender<Vec<u8>>,
    state: Arc<StdMutex<RouterState>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Router {
    /// Start the router's background I/O task over `transport`.
    #[must_use]
    pub fn new(transport: Box<dyn Transport>) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(32);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let state = Arc::new(StdMutex::new(RouterState { next_seq: 0, pending: HashMap::new() }));

        let task = tokio::spawn(run_io_loop(transport, outgoing_rx, shutdown_rx, Arc::clone(&state)));

        Self {
            outgoing: outgoing_tx,
            state,
            shutdown: Mutex::new(Some(shutdown_tx)),
            task: Mutex::new(Some(task)),
        }
    }

    /// Send `msg` (overwriting its sequence) and await the matching response,
    /// or fail with [`RouterError::Timeout`] after `timeout` elapses.
    ///
    /// # Errors
    ///
    /// See [`RouterError`].
    pub async fn execute(&self, mut msg: Message, timeout: Duration) -> Result<Message, RouterError> {
        let (tx, rx) = oneshot::channel();
        let key;
        {
            let mut state = self.state.lock().expect("router state mutex poisoned");
            let seq = state.allocate_sequence().ok_or(RouterError::Overloaded)?;
            msg.sequence = seq;
            key = msg.correlation_key();
            state.pending.insert(key, tx);
        }
        // Armed for the rest of this call: dropping `guard` (on early return,
        // on timeout, or because a cancelling caller drops this whole future)
        // removes the table entry. Disarmed only where dispatch/fail_all have
        // already removed it themselves.
        let guard = PendingGuard::new(Arc::clone(&self.state), key);

        let wire = encode(&msg)?;
        if self.outgoing.send(wire).await.is_err() {
            return Err(RouterError::Closed);
        }

        tokio::select! {
            result = rx => {
                guard.disarm();
                match result {
                    Ok(response) => response,
                    Err(_) => Err(RouterError::Closed),
                }
            }
            () = tokio::time::sleep(timeout) => {
                tracing::debug!(group = key.0, id = key.1, sequence = key.2, "request timed out");
                Err(RouterError::Timeout)
            }
        }
    }

    /// Shut down the router: fails every pending request with
    /// [`RouterError::Closed`] and stops the background I/O task.
    ///
    /// Idempotent: calling `close` on an already-closed router is a no-op.
    pub async fn close(&self) {
        if let Some(tx) = self.shutdown.lock().await.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }
}

async fn run_io_loop(
    mut transport: Box<dyn Transport>,
    mut outgoing: mpsc::Receiver<Vec<u8>>,
    mut shutdown: oneshot::Receiver<()>,
    state: Arc<StdMutex<RouterState>>,
) {
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                tracing::debug!("router shutting down");
                fail_all(&state, RouterError::Closed);
                break;
            }

            frame = outgoing.recv() => {
                match frame {
                    Some(bytes) => {
                        if let Err(e) = transport.send_frame(&bytes).await {
                            tracing::error!(error = %e, "transport send failed");
                            fail_all(&state, RouterError::Transport(e));
                            break;
                        }
                    },
                    None => break,
                }
            }

            received = transport.recv_frame() => {
                match received {
                    Ok(Some(bytes)) => dispatch(&state, &bytes),
                    Ok(None) => {
                        tracing::warn!("transport closed by peer");
                        fail_all(&state, RouterError::Transport(TransportError::Closed));
                        break;
                    },
                    Err(e) => {
                        tracing::error!(error = %e, "transport receive failed");
                        fail_all(&state, RouterError::Transport(e));
                        break;
                    },
                }
            }
        }
    }

    transport.close().await;
}

fn dispatch(state: &Arc<StdMutex<RouterState>>, bytes: &[u8]) {
    let message = match decode(bytes) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "discarding malformed frame");
            return;
        },
    };

    let key = message.correlation_key();
    let mut state = state.lock().expect("router state mutex poisoned");
    if let Some(sender) = state.pending.remove(&key) {
        let _ = sender.send(Ok(message));
    } else {
        tracing::debug!(group = key.0, id = key.1, sequence = key.2, "unmatched frame discarded");
    }
}

fn fail_all(state: &Arc<StdMutex<RouterState>>, make_err: RouterError) {
    let mut state = state.lock().expect("router state mutex poisoned");
    for (_, sender) in state.pending.drain() {
        let err = match &make_err {
            RouterError::Transport(TransportError::Closed) => {
                RouterError::Transport(TransportError::Closed)
            },
            RouterError::Transport(TransportError::Io(s)) => {
                RouterError::Transport(TransportError::Io(s.clone()))
            },
            RouterError::Closed => RouterError::Closed,
            RouterError::Timeout => RouterError::Timeout,
            RouterError::Overloaded => RouterError::Overloaded,
            RouterError::MalformedFrame(_) => RouterError::Closed,
        };
        let _ = sender.send(Err(err));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mcumgr_harness::SyntheticDevice;
    use mcumgr_proto::{Op, group, value};

    use super::*;

    fn echo_request(text: &str) -> Message {
        Message {
            op: Op::Write,
            flags: 0,
            group: group::OS,
            sequence: 0,
            id: 0,
            payload: value::map([("d", ciborium::Value::Text(text.to_string()))]),
        }
    }

    #[tokio::test]
    async fn matches_response_by_group_id_sequence() {
        let (device, transport) = SyntheticDevice::new();
        device
            .on(group::OS, 0, |req| {
                let d = mcumgr_proto::value::get_str(req, "d").unwrap_or_default();
                mcumgr_proto::value::map([("r", ciborium::Value::Text(d))])
            })
            .await;

        let router = Router::new(Box::new(transport));
        let response =
            router.execute(echo_request("hello"), Duration::from_millis(200)).await.unwrap();
        assert_eq!(mcumgr_proto::value::get_str(&response.payload, "r").unwrap(), "hello");
        router.close().await;
    }

    #[tokio::test]
    async fn timeout_clears_pending_entry() {
        let (_device, transport) = SyntheticDevice::new();
        let router = Router::new(Box::new(transport));

        let result = router.execute(echo_request("hello"), Duration::from_millis(10)).await;
        assert!(matches!(result, Err(RouterError::Timeout)));

        let state = router.state.lock().expect("router state mutex poisoned");
        assert!(state.pending.is_empty());
        drop(state);
        router.close().await;
    }

    /// Cancelling the caller's future mid-flight (rather than letting it run
    /// to a timeout or a response) must still clear the pending-table entry,
    /// otherwise a window>1 upload whose `FuturesUnordered` gets dropped on
    /// another chunk's error leaks one entry per still-in-flight chunk.
    #[tokio::test]
    async fn dropping_the_execute_future_clears_its_pending_entry() {
        let (_device, transport) = SyntheticDevice::new();
        let router = Router::new(Box::new(transport));

        {
            let call = router.execute(echo_request("never answered"), Duration::from_secs(5));
            tokio::pin!(call);
            // Poll once so the request is registered and on the wire, then
            // drop the future before it resolves.
            let _ = futures::poll!(&mut call);
        }

        let state = router.state.lock().expect("router state mutex poisoned");
        assert!(state.pending.is_empty());
        drop(state);
        router.close().await;
    }

    #[tokio::test]
    async fn close_fails_pending_requests() {
        let (_device, transport) = SyntheticDevice::new();
        let router = Arc::new(Router::new(Box::new(transport)));
        let r2 = Arc::clone(&router);

        let handle =
            tokio::spawn(async move { r2.execute(echo_request("hi"), Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        router.close().await;

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(RouterError::Closed)));
    }
}
