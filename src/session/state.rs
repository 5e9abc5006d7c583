use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of an acquisition session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Initialized,
    Running,
    Finalized,
    Sealed,
    Failed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        matches!(
            (self, next),
            (Created, Initialized)
                | (Initialized, Running)
                | (Running, Finalized)
                | (Finalized, Sealed)
                | (Created, Failed)
                | (Initialized, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Sealed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Initialized => "initialized",
            SessionState::Running => "running",
            SessionState::Finalized => "finalized",
            SessionState::Sealed => "sealed",
            SessionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition { from: SessionState, to: SessionState },
    #[error("session is {0}, artifacts can only be written while running")]
    ArtifactsFrozen(SessionState),
    #[error("artifact path {} escapes the workspace", .0.display())]
    PathEscapesWorkspace(PathBuf),
    #[error("failed to create workspace {}", .path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open step journal")]
    Journal(#[source] io::Error),
    #[error("failed to read device identity: {0:#}")]
    DeviceIdentity(anyhow::Error),
}
