//! Acquisition session lifecycle and its on-disk workspace

pub mod acquisition_session;
pub mod journal;
pub mod state;
pub mod workspace;

pub use acquisition_session::AcquisitionSession;
pub use journal::StepJournal;
pub use state::{SessionError, SessionState};
pub use workspace::Workspace;
