use crate::Result;
use crate::archive::Archiver;
use crate::audit::{AuditEvent, AuditSink, TracingAudit};
use crate::ledger::{ArchiveStatus, TransferLedger, TransferOutcome};
use crate::profile::ConnectionProfile;
use crate::resolver::{CollisionResolver, Resolution};
use crate::transport::{Connector, RemoteSession, SessionGuard};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

const SKIP_REASON: &str = "Exists on server; skipped";

/// Cooperative stop request, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The shared flag, for signal handlers.
    pub fn handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// One batch: upload `files` in order over a single remote session.
pub struct UploadSession<'a> {
    profile: ConnectionProfile,
    files: Vec<PathBuf>,
    archiver: Archiver,
    resolver: Option<Box<dyn CollisionResolver + 'a>>,
    audit: Box<dyn AuditSink + 'a>,
    cancel: CancelFlag,
    progress: Option<ProgressBar>,
}

impl<'a> UploadSession<'a> {
    /// Without a resolver, any file that already exists remotely fails.
    pub fn new(profile: ConnectionProfile, files: Vec<PathBuf>) -> Self {
        let archiver = Archiver::new(profile.archive_path.clone());
        Self {
            profile,
            files,
            archiver,
            resolver: None,
            audit: Box::new(TracingAudit),
            cancel: CancelFlag::new(),
            progress: None,
        }
    }

    pub fn with_resolver(mut self, resolver: impl CollisionResolver + 'a) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn with_audit(mut self, audit: impl AuditSink + 'a) -> Self {
        self.audit = Box::new(audit);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    /// Run the batch.
    ///
    /// Fails only if the profile is invalid or the session cannot be opened;
    /// in that case no file is touched. Every per-file problem ends up in the
    /// ledger instead. The session is closed exactly once.
    pub fn run<C: Connector>(mut self, connector: &C) -> Result<TransferLedger> {
        self.profile.validate()?;

        info!("Connecting to {}@{}:{}...", self.profile.username, self.profile.host, self.profile.port);
        let guard = SessionGuard::new(connector.open(&self.profile)?);
        info!("Connected.");

        let files = std::mem::take(&mut self.files);
        let mut ledger = TransferLedger::new();

        if let Some(pb) = &self.progress {
            pb.set_length(files.len() as u64);
        }

        for local in &files {
            if self.cancel.is_cancelled() {
                self.audit.record(&AuditEvent::Cancelled { processed: ledger.len(), total: files.len() });
                break;
            }

            let (file_name, outcome) = self.process_file(guard.session(), local);
            ledger.record(file_name, outcome);

            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
        }

        if let Err(e) = guard.close() {
            warn!("Closing the remote session failed: {}", e);
        }

        if let Some(pb) = &self.progress {
            pb.finish_with_message("Upload complete");
        }

        self.audit.record(&AuditEvent::SessionComplete { files: ledger.len() });
        Ok(ledger)
    }

    fn process_file<S: RemoteSession>(&mut self, session: &S, local: &Path) -> (String, TransferOutcome) {
        let file_name = match local.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => {
                let shown = local.to_string_lossy().to_string();
                return (shown.clone(), self.fail(&shown, format!("Invalid file name: {:?}", local)));
            }
        };

        if let Some(pb) = &self.progress {
            pb.set_message(format!("Uploading {}", file_name));
        }
        self.audit.record(&AuditEvent::Preparing { file: file_name.clone() });

        if !local.is_file() {
            let outcome = self.fail(&file_name, format!("Local file not found: {:?}", local));
            return (file_name, outcome);
        }

        let remote_path = self.profile.remote_file_path(&file_name);

        let exists = match session.exists(&remote_path) {
            Ok(exists) => exists,
            Err(e) => return (file_name.clone(), self.fail(&file_name, e.to_string())),
        };

        let overwrite = if exists {
            debug!("{} already exists on the server", remote_path);
            match self.resolve(&file_name) {
                Ok(Resolution::Overwrite) => true,
                Ok(Resolution::Skip) => {
                    self.audit.record(&AuditEvent::Skipped {
                        file: file_name.clone(),
                        reason: SKIP_REASON.to_string(),
                    });
                    return (file_name, TransferOutcome::Skipped { reason: SKIP_REASON.to_string() });
                }
                Err(e) => return (file_name.clone(), self.fail(&file_name, e.to_string())),
            }
        } else {
            false
        };

        if let Err(e) = session.write(local, &remote_path) {
            return (file_name.clone(), self.fail(&file_name, e.to_string()));
        }

        self.audit.record(&AuditEvent::Uploaded {
            file: file_name.clone(),
            remote_path: remote_path.clone(),
            overwritten: overwrite,
        });

        let archive = match self.archiver.archive(local, overwrite) {
            Ok(path) => ArchiveStatus::Archived(path),
            Err(e) => {
                self.audit.record(&AuditEvent::ArchiveFailed {
                    file: file_name.clone(),
                    error: e.to_string(),
                });
                ArchiveStatus::Failed(e.to_string())
            }
        };

        (file_name, TransferOutcome::Success { remote_path, overwritten: overwrite, archive })
    }

    fn resolve(&mut self, file_name: &str) -> Result<Resolution> {
        match self.resolver.as_mut() {
            Some(resolver) => resolver.decide(file_name),
            None => Err(crate::PoUploadError::Resolver(format!(
                "{} exists on the server and no overwrite policy is configured",
                file_name
            ))),
        }
    }

    fn fail(&mut self, file_name: &str, error: String) -> TransferOutcome {
        self.audit.record(&AuditEvent::Failed { file: file_name.to_string(), error: error.clone() });
        TransferOutcome::Failed { error }
    }
}
