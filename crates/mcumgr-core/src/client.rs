//! The public client surface (§6): `open`, `execute`, and the group-op and
//! transfer convenience methods implemented in sibling modules.

use std::time::Duration;

use mcumgr_proto::Message;

use crate::{config::ClientConfig, errors::ClientError, router::Router, transport::Transport};

/// An open connection to a device, speaking SMP over whatever [`Transport`]
/// it was opened with.
///
/// `Client` is the only type callers construct directly; OS, image, and
/// filesystem operations are inherent methods on it (§4.D–F), the way the
/// reference client exposes every group-specific command straight off the
/// connection type rather than behind per-group sub-objects.
pub struct Client {
    pub(crate) router: Router,
    pub(crate) config: ClientConfig,
}

impl Client {
    /// Open a client over `transport` with default configuration.
    #[must_use]
    pub fn open(transport: Box<dyn Transport>) -> Self {
        Self::open_with_config(transport, ClientConfig::default())
    }

    /// Open a client over `transport` with explicit configuration.
    #[must_use]
    pub fn open_with_config(transport: Box<dyn Transport>, config: ClientConfig) -> Self {
        Self { router: Router::new(transport), config }
    }

    /// Shut down the client: fails every pending request and stops the
    /// background I/O task. Idempotent (§4.C).
    pub async fn close(&self) {
        self.router.close().await;
    }

    /// Send `msg` and await the correlated response (§4.C).
    ///
    /// `timeout` accepts a bare [`Duration`] or `None`; `None` falls back to
    /// [`ClientConfig::default_timeout`] (§6) — this is the one place that
    /// default is actually read, so every op built on top of `execute`
    /// inherits it for free.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn execute(
        &self,
        msg: Message,
        timeout: impl Into<Option<Duration>>,
    ) -> Result<Message, ClientError> {
        let timeout = timeout.into().unwrap_or(self.config.default_timeout);
        Ok(self.router.execute(msg, timeout).await?)
    }

    /// The configuration this client was opened with.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        self.config
    }
}
