use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;

use crate::device::bridge::{DeviceBridge, DeviceHandle};
use crate::models::DeviceInfo;

lazy_static! {
    /// `[ro.product.model]: [Pixel 7]`
    static ref GETPROP_LINE: Regex = Regex::new(r"^\[([^\]]+)\]:\s*\[(.*)\]\s*$").unwrap();
}

/// Parse `getprop` output into a property map
pub fn parse_getprop(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| GETPROP_LINE.captures(line.trim()))
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// Read the identity of the device being acquired
pub async fn read_device_info(bridge: &dyn DeviceBridge, device: &DeviceHandle) -> Result<DeviceInfo> {
    let stdout = bridge
        .shell(device, "getprop")
        .await
        .context("Failed to query device properties")?
        .into_stdout("getprop")?;

    let props = parse_getprop(&String::from_utf8_lossy(&stdout));
    if props.is_empty() {
        bail!("Device {} returned no properties", device);
    }

    let get = |key: &str| props.get(key).filter(|v| !v.is_empty()).cloned();

    Ok(DeviceInfo {
        serial: get("ro.serialno").unwrap_or_else(|| device.serial().to_string()),
        model: get("ro.product.model"),
        manufacturer: get("ro.product.manufacturer"),
        android_version: get("ro.build.version.release"),
        sdk_version: get("ro.build.version.sdk"),
        build_fingerprint: get("ro.build.fingerprint"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::bridge::{CommandOutput, MockDeviceBridge};

    const GETPROP: &str = "[ro.build.fingerprint]: [google/panther/panther:14/UQ1A/1234:user/release-keys]\n\
                           [ro.build.version.release]: [14]\n\
                           [ro.build.version.sdk]: [34]\n\
                           [ro.product.manufacturer]: [Google]\n\
                           [ro.product.model]: [Pixel 7]\n\
                           [ro.serialno]: [28031FDH2001AB]\n\
                           [persist.sys.empty]: []\n\
                           garbage line\n";

    #[test]
    fn test_parse_getprop() {
        let props = parse_getprop(GETPROP);
        assert_eq!(props.len(), 7);
        assert_eq!(props["ro.product.model"], "Pixel 7");
        assert_eq!(props["persist.sys.empty"], "");
    }

    #[tokio::test]
    async fn test_read_device_info() {
        let mut bridge = MockDeviceBridge::new();
        bridge
            .expect_shell()
            .withf(|_, command| command == "getprop")
            .returning(|_, _| Ok(CommandOutput::ok(GETPROP)));

        let info = read_device_info(&bridge, &DeviceHandle::new("28031FDH2001AB")).await.unwrap();
        assert_eq!(info.serial, "28031FDH2001AB");
        assert_eq!(info.model.as_deref(), Some("Pixel 7"));
        assert_eq!(info.manufacturer.as_deref(), Some("Google"));
        assert_eq!(info.android_version.as_deref(), Some("14"));
        assert_eq!(info.sdk_version.as_deref(), Some("34"));
    }

    #[tokio::test]
    async fn test_read_device_info_fails_without_properties() {
        let mut bridge = MockDeviceBridge::new();
        bridge.expect_shell().returning(|_, _| Ok(CommandOutput::ok("")));

        let result = read_device_info(&bridge, &DeviceHandle::new("abc")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_read_device_info_propagates_command_failure() {
        let mut bridge = MockDeviceBridge::new();
        bridge
            .expect_shell()
            .returning(|_, _| Ok(CommandOutput::failed("error: device unauthorized")));

        let err = read_device_info(&bridge, &DeviceHandle::new("abc")).await.unwrap_err();
        assert!(err.to_string().contains("device unauthorized"));
    }
}
