//! Sealing of finalized workspaces.
//!
//! A [`SecureStorage`] turns a frozen workspace into a single sealed file.
//! Sealing is the last step of a run and never touches the workspace when
//! it fails, so the plaintext evidence is always recoverable.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

pub mod envelope;

pub use envelope::{open_sealed_archive, EnvelopeStorage};

/// Sealed form of a finalized workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SealedArchive {
    pub path: PathBuf,
    /// Whether the plaintext workspace is still on disk
    pub plaintext_retained: bool,
    /// SHA-256 of the sealed file
    pub sha256: String,
}

/// Archives and encrypts a finalized workspace
#[cfg_attr(test, mockall::automock)]
pub trait SecureStorage: Send + Sync {
    fn store(&self, workspace: &Path) -> Result<SealedArchive>;
}

/// What happened to the bundle after finalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SealOutcome {
    Sealed(SealedArchive),
    /// No key configured, the bundle stays in plaintext
    NotRequested,
    /// Sealing was attempted and failed, the plaintext is intact
    Failed(String),
}

impl SealOutcome {
    pub fn is_sealed(&self) -> bool {
        matches!(self, SealOutcome::Sealed(_))
    }

    pub fn archive(&self) -> Option<&SealedArchive> {
        match self {
            SealOutcome::Sealed(archive) => Some(archive),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SealOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for SealOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SealOutcome::Sealed(archive) => write!(f, "sealed into {}", archive.path.display()),
            SealOutcome::NotRequested => write!(f, "not sealed (no public key configured)"),
            SealOutcome::Failed(reason) => write!(f, "sealing failed: {}", reason),
        }
    }
}
