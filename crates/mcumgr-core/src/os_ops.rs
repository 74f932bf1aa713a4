//! OS group operations (§4.D): `echo`, `reset`, `params`.

use std::time::Duration;

use mcumgr_proto::{Message, Op, group, value};

use crate::{
    client::Client,
    config::BufferParams,
    errors::{ClientError, Result},
};

impl Client {
    /// Echo `text` off the device; returns the device's echoed string.
    ///
    /// # Errors
    ///
    /// [`ClientError::UnexpectedPayload`] if the response lacks `r`; see
    /// [`ClientError`] for transport/timeout/device failures.
    pub async fn echo(&self, text: &str, timeout: impl Into<Option<Duration>>) -> Result<String> {
        let request = Message {
            op: Op::Write,
            flags: 0,
            group: group::OS,
            sequence: 0,
            id: 0,
            payload: value::map([("d", ciborium::Value::Text(text.to_string()))]),
        };

        let response = self.execute(request, timeout).await?;
        check_device_error(&response.payload)?;
        value::get_str(&response.payload, "r")
            .map_err(|e| ClientError::UnexpectedPayload(e.to_string()))
    }

    /// Reset the device. A [`ClientError::Router`] transport failure while
    /// awaiting the response is expected (§4.D, §7): the device typically
    /// disconnects before it can reply.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn reset(&self, timeout: impl Into<Option<Duration>>) -> Result<()> {
        let request = Message {
            op: Op::Write,
            flags: 0,
            group: group::OS,
            sequence: 0,
            id: 5,
            payload: value::map([]),
        };

        let response = self.execute(request, timeout).await?;
        check_device_error(&response.payload)
    }

    /// Query the device's buffer parameters.
    ///
    /// Many devices don't implement this command; callers should fall back
    /// to [`BufferParams::default`] on error (§4.D).
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn params(&self, timeout: impl Into<Option<Duration>>) -> Result<BufferParams> {
        let request = Message {
            op: Op::Read,
            flags: 0,
            group: group::OS,
            sequence: 0,
            id: 6,
            payload: value::map([]),
        };

        let response = self.execute(request, timeout).await?;
        check_device_error(&response.payload)?;

        let buf_size = value::get_u64(&response.payload, "buf_size")
            .map_err(|e| ClientError::UnexpectedPayload(e.to_string()))?;
        let buf_count = value::get_u64(&response.payload, "buf_count")
            .map_err(|e| ClientError::UnexpectedPayload(e.to_string()))?;

        Ok(BufferParams { buf_size, buf_count })
    }

    /// [`Self::params`], falling back to [`BufferParams::default`] on any
    /// error, per the caller convention named in §4.D.
    pub async fn params_or_default(&self, timeout: impl Into<Option<Duration>>) -> BufferParams {
        self.params(timeout).await.unwrap_or_default()
    }
}

/// Check a response payload's `rc` field, failing with
/// [`ClientError::Device`] if it is present and non-zero (§3, §7).
pub(crate) fn check_device_error(payload: &ciborium::Value) -> Result<()> {
    match value::get_i64_opt(payload, "rc") {
        None | Some(0) => Ok(()),
        Some(rc) => Err(ClientError::Device(crate::errors::DeviceErrorCode(rc))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mcumgr_harness::SyntheticDevice;

    use super::*;

    #[tokio::test]
    async fn echo_returns_device_string() {
        let (device, transport) = SyntheticDevice::new();
        device
            .on(group::OS, 0, |req| {
                let d = value::get_str(req, "d").unwrap_or_default();
                value::map([("r", ciborium::Value::Text(d))])
            })
            .await;

        let client = Client::open(Box::new(transport));
        let reply = client.echo("hello", Duration::from_millis(200)).await.unwrap();
        assert_eq!(reply, "hello");
        client.close().await;
    }

    #[tokio::test]
    async fn params_surfaces_device_error() {
        let (device, transport) = SyntheticDevice::new();
        device.on(group::OS, 6, |_req| value::map([("rc", ciborium::Value::from(8u64))])).await;

        let client = Client::open(Box::new(transport));
        let result = client.params(Duration::from_millis(200)).await;
        assert!(matches!(result, Err(ClientError::Device(code)) if code.0 == 8));

        let fallback = client.params_or_default(Duration::from_millis(200)).await;
        assert_eq!(fallback, BufferParams::default());
        client.close().await;
    }

    #[tokio::test]
    async fn none_timeout_falls_back_to_client_config_default() {
        use crate::config::ClientConfig;

        let (device, transport) = SyntheticDevice::new();
        device
            .on(group::OS, 0, |req| {
                let d = value::get_str(req, "d").unwrap_or_default();
                value::map([("r", ciborium::Value::Text(d))])
            })
            .await;

        let config = ClientConfig { default_timeout: Duration::from_millis(50), ..ClientConfig::default() };
        let client = Client::open_with_config(Box::new(transport), config);
        let reply = client.echo("hi", None).await.unwrap();
        assert_eq!(reply, "hi");
        client.close().await;
    }
}
