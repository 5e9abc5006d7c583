//! Device access.
//!
//! Everything the acquisition knows about the device goes through the
//! [`DeviceBridge`] trait. [`AdbBridge`] is the production implementation,
//! driving the Android Debug Bridge executable; tests substitute their own.

/// Bridge trait and the types it exchanges
pub mod bridge;

/// `adb` executable backed bridge
pub mod adb;

/// Retry-until-ready device discovery
pub mod discovery;

/// Device identity metadata
pub mod identity;

pub use adb::AdbBridge;
pub use bridge::{CommandOutput, DeviceBridge, DeviceEntry, DeviceHandle};
pub use discovery::{DeviceDiscovery, DiscoveryError};
pub use identity::read_device_info;
