use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::models::StepResult;

/// Append-only journal of step outcomes, one JSON document per line.
/// Each entry is flushed to disk before the next step starts so the record
/// survives the process being killed mid-run.
#[derive(Debug)]
pub struct StepJournal {
    file: File,
}

impl StepJournal {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    pub fn append(&mut self, result: &StepResult) -> io::Result<()> {
        let line = serde_json::to_string(result)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(self.file, "{}", line)?;
        self.file.sync_data()
    }
}
