//! Device discovery.
//!
//! Acquisition cannot start without a device, so discovery retries at a
//! fixed delay until exactly one authorized device is reachable. The only
//! way out of the loop, other than success, is the cancellation token.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::constants::{ADB_STATE_DEVICE, ADB_STATE_OFFLINE, ADB_STATE_UNAUTHORIZED};
use crate::device::bridge::{DeviceBridge, DeviceEntry, DeviceHandle};

/// Reasons a discovery attempt did not yield a device
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no device attached")]
    NoDevice,
    #[error("device {0} is not authorized, confirm the USB debugging prompt on the device")]
    Unauthorized(String),
    #[error("device {0} is offline")]
    Offline(String),
    #[error("device {serial} is in state '{state}'")]
    Unavailable { serial: String, state: String },
    #[error("{0} devices attached, select one by serial")]
    MultipleDevices(usize),
    #[error("device {0} is not attached")]
    SerialNotFound(String),
    #[error("unable to query device state: {0:#}")]
    Transport(anyhow::Error),
    #[error("device discovery was cancelled")]
    Cancelled,
}

/// Finds the device to acquire
pub struct DeviceDiscovery {
    bridge: Arc<dyn DeviceBridge>,
    serial: Option<String>,
    retry_delay: Duration,
}

impl DeviceDiscovery {
    pub fn new(bridge: Arc<dyn DeviceBridge>, retry_delay: Duration) -> Self {
        Self {
            bridge,
            serial: None,
            retry_delay,
        }
    }

    /// Only accept the device with this serial
    pub fn with_serial(mut self, serial: Option<String>) -> Self {
        self.serial = serial;
        self
    }

    /// Single discovery attempt
    pub async fn acquire(&self) -> Result<DeviceHandle, DiscoveryError> {
        let entries = self.bridge.devices().await.map_err(DiscoveryError::Transport)?;
        debug!("Bridge reported {} attached device(s)", entries.len());
        select_device(&entries, self.serial.as_deref())
    }

    /// Retry `acquire` at the fixed delay until a device is available or the
    /// token is cancelled
    pub async fn wait_for_device(&self, cancel: &CancellationToken) -> Result<DeviceHandle, DiscoveryError> {
        let mut attempts: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(DiscoveryError::Cancelled);
            }

            attempts += 1;
            match self.acquire().await {
                Ok(device) => {
                    info!("Found device {} after {} attempt(s)", device, attempts);
                    return Ok(device);
                }
                Err(e) => {
                    warn!(
                        "Unable to get device state ({}). Please make sure it is connected and authorized. Trying again in {:?}...",
                        e, self.retry_delay
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(DiscoveryError::Cancelled),
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }
    }
}

/// Pick the acquisition target from the bridge's device list
pub fn select_device(entries: &[DeviceEntry], serial: Option<&str>) -> Result<DeviceHandle, DiscoveryError> {
    let entry = match serial {
        Some(wanted) => entries
            .iter()
            .find(|e| e.serial == wanted)
            .ok_or_else(|| DiscoveryError::SerialNotFound(wanted.to_string()))?,
        None => match entries {
            [] => return Err(DiscoveryError::NoDevice),
            [only] => only,
            many => return Err(DiscoveryError::MultipleDevices(many.len())),
        },
    };

    match entry.state.as_str() {
        ADB_STATE_DEVICE => Ok(DeviceHandle::new(entry.serial.clone())),
        ADB_STATE_UNAUTHORIZED => Err(DiscoveryError::Unauthorized(entry.serial.clone())),
        ADB_STATE_OFFLINE => Err(DiscoveryError::Offline(entry.serial.clone())),
        other => Err(DiscoveryError::Unavailable {
            serial: entry.serial.clone(),
            state: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::bridge::MockDeviceBridge;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entry(serial: &str, state: &str) -> DeviceEntry {
        DeviceEntry::new(serial, state)
    }

    #[test]
    fn test_select_single_authorized_device() {
        let handle = select_device(&[entry("R58M123ABC", "device")], None).unwrap();
        assert_eq!(handle.serial(), "R58M123ABC");
    }

    #[test]
    fn test_select_rejects_missing_and_unauthorized() {
        assert!(matches!(select_device(&[], None), Err(DiscoveryError::NoDevice)));
        assert!(matches!(
            select_device(&[entry("abc", "unauthorized")], None),
            Err(DiscoveryError::Unauthorized(_))
        ));
        assert!(matches!(
            select_device(&[entry("abc", "offline")], None),
            Err(DiscoveryError::Offline(_))
        ));
        assert!(matches!(
            select_device(&[entry("abc", "recovery")], None),
            Err(DiscoveryError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_select_multiple_devices_needs_serial() {
        let entries = vec![entry("one", "device"), entry("two", "device")];
        assert!(matches!(
            select_device(&entries, None),
            Err(DiscoveryError::MultipleDevices(2))
        ));

        let handle = select_device(&entries, Some("two")).unwrap();
        assert_eq!(handle.serial(), "two");

        assert!(matches!(
            select_device(&entries, Some("three")),
            Err(DiscoveryError::SerialNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_wait_for_device_retries_until_available() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut bridge = MockDeviceBridge::new();
        bridge.expect_devices().returning(move || {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(vec![]),
                1 => Err(anyhow!("adb server version mismatch")),
                2 => Ok(vec![entry("abc", "unauthorized")]),
                _ => Ok(vec![entry("abc", "device")]),
            }
        });

        let discovery = DeviceDiscovery::new(Arc::new(bridge), Duration::from_millis(5));
        let handle = discovery.wait_for_device(&CancellationToken::new()).await.unwrap();

        assert_eq!(handle.serial(), "abc");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_wait_for_device_stops_on_cancellation() {
        let mut bridge = MockDeviceBridge::new();
        bridge.expect_devices().returning(|| Ok(vec![]));

        let discovery = DeviceDiscovery::new(Arc::new(bridge), Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = discovery.wait_for_device(&cancel).await;

        assert!(matches!(result, Err(DiscoveryError::Cancelled)));
        // Cancelled mid-sleep, not after the full retry delay
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_wait_for_device_already_cancelled() {
        let mut bridge = MockDeviceBridge::new();
        bridge.expect_devices().times(0);

        let discovery = DeviceDiscovery::new(Arc::new(bridge), Duration::from_millis(5));
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(
            discovery.wait_for_device(&cancel).await,
            Err(DiscoveryError::Cancelled)
        ));
    }
}
