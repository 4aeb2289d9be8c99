//! Per-file outcome record for one batch.
//!
//! Entries are appended in processing order and never modified afterwards.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Where the local copy ended up after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum ArchiveStatus {
    Archived(PathBuf),
    /// The remote copy exists; only the local move failed.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TransferOutcome {
    Success {
        remote_path: String,
        overwritten: bool,
        archive: ArchiveStatus,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
    },
}

/// Coarse status, as shown in a results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Success,
    Skipped,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Success => "Success",
            Status::Skipped => "Skipped",
            Status::Failed => "Failed",
        };
        f.write_str(s)
    }
}

impl TransferOutcome {
    pub fn status(&self) -> Status {
        match self {
            TransferOutcome::Success { .. } => Status::Success,
            TransferOutcome::Skipped { .. } => Status::Skipped,
            TransferOutcome::Failed { .. } => Status::Failed,
        }
    }

    pub fn message(&self) -> String {
        match self {
            TransferOutcome::Success { overwritten, archive, .. } => {
                let verb = if *overwritten { "Uploaded (overwritten)" } else { "Uploaded" };
                match archive {
                    ArchiveStatus::Archived(_) => verb.to_string(),
                    ArchiveStatus::Failed(e) => format!("{}; archive failed: {}", verb, e),
                }
            }
            TransferOutcome::Skipped { reason } => reason.clone(),
            TransferOutcome::Failed { error } => error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub file_name: String,
    #[serde(flatten)]
    pub outcome: TransferOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Successes whose local archive step failed.
    pub archive_failures: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct TransferLedger {
    entries: Vec<LedgerEntry>,
}

impl TransferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, file_name: impl Into<String>, outcome: TransferOutcome) {
        self.entries.push(LedgerEntry { file_name: file_name.into(), outcome });
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> LedgerSummary {
        self.entries.iter().fold(LedgerSummary::default(), |mut s, e| {
            match &e.outcome {
                TransferOutcome::Success { archive, .. } => {
                    s.succeeded += 1;
                    if matches!(archive, ArchiveStatus::Failed(_)) {
                        s.archive_failures += 1;
                    }
                }
                TransferOutcome::Skipped { .. } => s.skipped += 1,
                TransferOutcome::Failed { .. } => s.failed += 1,
            }
            s
        })
    }
}

impl<'a> IntoIterator for &'a TransferLedger {
    type Item = &'a LedgerEntry;
    type IntoIter = std::slice::Iter<'a, LedgerEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
