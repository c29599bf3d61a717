// src/telemetry.rs
//
// JSONL event stream. One JSON object per line, flushed on every write
// so a hard power cut on the vehicle loses at most the current line.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct EventLog {
    file: File,
    path: PathBuf,
    events_written: u64,
}

impl EventLog {
    pub fn create(output_dir: &Path, file_name: &str) -> Result<Self> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output dir {}", output_dir.display()))?;
        let path = output_dir.join(file_name);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create event log {}", path.display()))?;
        info!("💾 Events will be written to: {}", path.display());

        Ok(Self {
            file,
            path,
            events_written: 0,
        })
    }

    pub fn append(&mut self, event: &serde_json::Value) -> Result<()> {
        writeln!(self.file, "{}", event)?;
        self.file.flush()?;
        self.events_written += 1;
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.events_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
