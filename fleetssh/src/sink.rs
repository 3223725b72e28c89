//! Persistence of job results.
//!
//! The dispatcher hands every [`JobResult`] to a [`ResultSink`] as soon as
//! it arrives. Sink errors abort the run.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use log::debug;

use crate::error::SinkError;
use crate::result::JobResult;

/// Destination for job results.
pub trait ResultSink {
    /// Persist one result.
    fn write(&mut self, result: &JobResult) -> Result<(), SinkError>;
}

/// Collect results in memory.
impl ResultSink for Vec<JobResult> {
    fn write(&mut self, result: &JobResult) -> Result<(), SinkError> {
        self.push(result.clone());
        Ok(())
    }
}

impl<S: ResultSink + ?Sized> ResultSink for &mut S {
    fn write(&mut self, result: &JobResult) -> Result<(), SinkError> {
        (**self).write(result)
    }
}

/// Writes one JSON document per line, flushing after each record.
///
/// Records are written in arrival order; nothing is retained in memory.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    records: usize,
}

impl JsonLinesSink<File> {
    /// Open `path` for appending, creating it if needed.
    pub fn append(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        debug!("Appending results to {}", path.display());
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, records: 0 }
    }

    /// Records written so far.
    pub fn records(&self) -> usize {
        self.records
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for JsonLinesSink<W> {
    fn write(&mut self, result: &JobResult) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(result)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        self.records += 1;
        Ok(())
    }
}
