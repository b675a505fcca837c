//! Append-only sync journal with file-based persistence.
//!
//! Each batch run gets its own directory holding a newline-delimited JSON
//! (JSONL) log of universe state changes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::domain::{JournalEvent, RunSummary};

/// File-based journal for one run
#[derive(Debug, Clone)]
pub struct SyncJournal {
    run_id: Uuid,

    /// Directory containing the run
    run_dir: PathBuf,

    /// Path to the journal.jsonl file
    journal_path: PathBuf,
}

impl SyncJournal {
    /// Create or open the journal for a run under `runs_dir`
    pub async fn open(runs_dir: &Path, run_id: Uuid) -> Result<Self> {
        let run_dir = runs_dir.join(run_id.to_string());

        fs::create_dir_all(&run_dir)
            .await
            .with_context(|| format!("Failed to create run directory: {}", run_dir.display()))?;

        Ok(Self {
            run_id,
            journal_path: run_dir.join("journal.jsonl"),
            run_dir,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    /// Append an event to the log
    pub async fn append(&self, event: &JournalEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open journal file: {}",
                    self.journal_path.display()
                )
            })?;

        let json = serde_json::to_string(event).context("Failed to serialize journal event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write journal event")?;
        file.flush().await.context("Failed to flush journal event")?;

        Ok(())
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<JournalEvent>> {
        if !self.journal_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.journal_path).await.with_context(|| {
            format!(
                "Failed to open journal file: {}",
                self.journal_path.display()
            )
        })?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: JournalEvent = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse journal event: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    /// Reconstruct the run summary from the log
    pub async fn summary(&self) -> Result<Option<RunSummary>> {
        let events = self.replay().await?;
        Ok(RunSummary::from_events(&events))
    }

    /// List all run IDs under `runs_dir`
    pub async fn list_runs(runs_dir: &Path) -> Result<Vec<Uuid>> {
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        let mut entries = fs::read_dir(runs_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(uuid) = Uuid::parse_str(name) {
                        runs.push(uuid);
                    }
                }
            }
        }

        Ok(runs)
    }
}
