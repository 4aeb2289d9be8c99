use std::fmt;
use tracing::Level;

/// Tracing target the binary routes to the audit log file.
pub const AUDIT_TARGET: &str = "audit";

/// Significant batch events, one line each in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    Preparing { file: String },
    Uploaded { file: String, remote_path: String, overwritten: bool },
    ArchiveFailed { file: String, error: String },
    Skipped { file: String, reason: String },
    Failed { file: String, error: String },
    Cancelled { processed: usize, total: usize },
    SessionComplete { files: usize },
}

impl AuditEvent {
    pub fn level(&self) -> Level {
        match self {
            AuditEvent::Failed { .. } => Level::ERROR,
            AuditEvent::ArchiveFailed { .. } | AuditEvent::Cancelled { .. } => Level::WARN,
            _ => Level::INFO,
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEvent::Preparing { file } => write!(f, "Preparing to upload: {}", file),
            AuditEvent::Uploaded { file, remote_path, overwritten } => write!(
                f,
                "Uploaded: {} | Remote Path: {} | Overwritten: {}",
                file, remote_path, overwritten
            ),
            AuditEvent::ArchiveFailed { file, error } => {
                write!(f, "Uploaded but not archived: {} | Error: {}", file, error)
            }
            AuditEvent::Skipped { file, reason } => write!(f, "Skipped: {} ({})", file, reason),
            AuditEvent::Failed { file, error } => write!(f, "Failed to upload: {} | Error: {}", file, error),
            AuditEvent::Cancelled { processed, total } => {
                write!(f, "Upload session cancelled after {} of {} files", processed, total)
            }
            AuditEvent::SessionComplete { files } => {
                write!(f, "Upload session complete. Total files: {}", files)
            }
        }
    }
}

/// Destination for audit events.
pub trait AuditSink {
    fn record(&mut self, event: &AuditEvent);
}

/// Emits events on the `audit` tracing target at their own severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&mut self, event: &AuditEvent) {
        match event.level() {
            Level::ERROR => tracing::error!(target: AUDIT_TARGET, "{}", event),
            Level::WARN => tracing::warn!(target: AUDIT_TARGET, "{}", event),
            _ => tracing::info!(target: AUDIT_TARGET, "{}", event),
        }
    }
}

impl<T: AuditSink + ?Sized> AuditSink for &mut T {
    fn record(&mut self, event: &AuditEvent) {
        (**self).record(event);
    }
}

impl AuditSink for Vec<AuditEvent> {
    fn record(&mut self, event: &AuditEvent) {
        self.push(event.clone());
    }
}
