//! Utility functions for acquisition bundles.
//!
//! ## Components
//!
//! - **Hashing**: streaming SHA-256 of files and buffers
//! - **Manifest**: the workspace integrity manifest and its verification
//! - **Compression**: multi-threaded ZIP archive creation
//! - **Summary**: the session record kept with the evidence
//!
//! ### Hashing a Workspace
//!
//! ```no_run
//! use android_collector::utils::manifest::Finalizer;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let manifest = Finalizer::hash_files(Path::new("acquisitions/5f0c6d1e-..."))?;
//! println!("{} file(s), bundle digest {}", manifest.len(), manifest.digest());
//! # Ok(())
//! # }
//! ```

/// Session record generation
pub mod summary;

/// ZIP archive creation
pub mod compress;

/// Cryptographic hash calculation utilities
pub mod hash;

/// Workspace integrity manifest
pub mod manifest;
