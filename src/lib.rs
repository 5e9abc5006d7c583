//! # android_collector
//!
//! Forensic acquisition of Android devices over the Android Debug Bridge.
//!
//! ## Overview
//!
//! android_collector drives one connected device through a fixed pipeline of
//! evidence collection steps (backup, installed applications, properties,
//! settings, processes, environment, services, logcat, system logs, dumpsys,
//! file listing and the temporary folder), then hashes everything it
//! collected and optionally seals the result for the examiner.
//!
//! ## Guarantees
//!
//! - **Failure isolation**: a failing step is recorded and the pipeline moves on
//! - **Hash then seal**: the manifest covers every file before anything is encrypted
//! - **One workspace per session**: named after the session UUID, never reused
//! - **Plaintext is never lost**: a failed seal leaves the workspace untouched
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use android_collector::acquisition::Acquisition;
//! use android_collector::config::AcquisitionConfig;
//! use android_collector::device::AdbBridge;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AcquisitionConfig::default();
//! let bridge = Arc::new(AdbBridge::new(&config.adb_path));
//!
//! let report = Acquisition::new(config, bridge)
//!     .run(&CancellationToken::new())
//!     .await?;
//!
//! println!("Session {} ended as {:?}", report.session_id, report.status);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`config`]: YAML configuration and acquisition step definitions
//! - [`device`]: Device bridge, discovery and identity
//! - [`session`]: Session lifecycle, workspace and step journal
//! - [`collectors`]: One evidence collector per acquisition step
//! - [`pipeline`]: The ordered step list and its runner
//! - [`storage`]: Sealing of finalized workspaces
//! - [`acquisition`]: End-to-end runs and their reports
//! - [`utils`]: Hashing, manifests, compression and the session record
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models shared across the acquisition
pub mod models;

/// Evidence collectors for every acquisition step
pub mod collectors;

/// Utility functions for hashing, manifests and compression
pub mod utils;

/// Configuration management and step definitions
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Device access through adb
pub mod device;

/// Acquisition session lifecycle
pub mod session;

/// Acquisition pipeline
pub mod pipeline;

/// Sealed storage of finalized workspaces
pub mod storage;

/// End-to-end acquisition runs
pub mod acquisition;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
