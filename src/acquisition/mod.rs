//! End-to-end acquisition runs and their reports

pub mod report;
pub mod run;

pub use report::{AcquisitionReport, RunStatus};
pub use run::{Acquisition, AcquisitionError};
