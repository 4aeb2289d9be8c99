use po_upload::audit::AuditEvent;
use po_upload::engine::{CancelFlag, UploadSession};
use po_upload::ledger::{ArchiveStatus, Status, TransferOutcome};
use po_upload::profile::ConnectionProfile;
use po_upload::resolver::{FixedResolver, Resolution};
use po_upload::transport::{probe, Connector, RemoteSession, SessionGuard};
use po_upload::{PoUploadError, Result};
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RemoteState {
    files: HashMap<String, Vec<u8>>,
    fail_writes: HashSet<String>,
    fail_stats: HashSet<String>,
    writes: Vec<String>,
    removes: Vec<String>,
    opens: usize,
    closes: usize,
}

struct MockRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl RemoteSession for MockRemote {
    fn exists(&self, remote: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        if state.fail_stats.contains(remote) {
            return Err(PoUploadError::Transfer(format!("stat {} timed out", remote)));
        }
        Ok(state.files.contains_key(remote))
    }

    fn write(&self, local: &Path, remote: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(remote.to_string());
        if state.fail_writes.contains(remote) {
            return Err(PoUploadError::Transfer(format!("Write to {} failed: connection reset", remote)));
        }
        let data = fs::read(local)?;
        state.files.insert(remote.to_string(), data);
        Ok(())
    }

    fn remove(&self, remote: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.removes.push(remote.to_string());
        state.files.remove(remote);
        Ok(())
    }

    fn list_dir(&self, remote: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        let prefix = format!("{}/", remote.trim_end_matches('/'));
        Ok(state.files.keys().filter_map(|k| k.strip_prefix(&prefix)).map(str::to_string).collect())
    }

    fn close(&mut self) -> Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

struct MockConnector {
    state: Arc<Mutex<RemoteState>>,
    refuse: bool,
}

impl MockConnector {
    fn new() -> Self {
        Self { state: Arc::new(Mutex::new(RemoteState::default())), refuse: false }
    }

    fn with_remote_file(self, remote: &str) -> Self {
        self.state.lock().unwrap().files.insert(remote.to_string(), b"existing".to_vec());
        self
    }

    fn failing_write(self, remote: &str) -> Self {
        self.state.lock().unwrap().fail_writes.insert(remote.to_string());
        self
    }

    fn failing_stat(self, remote: &str) -> Self {
        self.state.lock().unwrap().fail_stats.insert(remote.to_string());
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap()
    }
}

impl Connector for MockConnector {
    type Session = MockRemote;

    fn open(&self, _profile: &ConnectionProfile) -> Result<MockRemote> {
        self.state.lock().unwrap().opens += 1;
        if self.refuse {
            return Err(PoUploadError::Authentication("bad password".into()));
        }
        Ok(MockRemote { state: Arc::clone(&self.state) })
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    source: PathBuf,
    archive: PathBuf,
}

impl Fixture {
    fn new(names: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("outbox");
        let archive = dir.path().join("archive");
        fs::create_dir(&source).unwrap();
        for name in names {
            fs::write(source.join(name), format!("%PDF {}", name)).unwrap();
        }
        Self { _dir: dir, source, archive }
    }

    fn files(&self, names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| self.source.join(n)).collect()
    }

    fn profile(&self) -> ConnectionProfile {
        ConnectionProfile::new("sftp.example.com", "edi", "pw", "/in", &self.archive)
    }

    fn archived_names(&self) -> Vec<String> {
        let Ok(rd) = fs::read_dir(&self.archive) else {
            return Vec::new();
        };
        let mut names: Vec<String> = rd
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

fn quiet() -> Vec<AuditEvent> {
    Vec::new()
}

fn statuses(ledger: &po_upload::ledger::TransferLedger) -> Vec<(String, Status)> {
    ledger.iter().map(|e| (e.file_name.clone(), e.outcome.status())).collect()
}

#[test]
fn test_new_files_upload_and_archive_under_original_names() {
    let fx = Fixture::new(&["a.pdf", "b.pdf"]);
    let connector = MockConnector::new();
    let asked = Cell::new(0);

    let ledger = UploadSession::new(fx.profile(), fx.files(&["a.pdf", "b.pdf"]))
        .with_resolver(|_: &str| -> Result<Resolution> {
            asked.set(asked.get() + 1);
            Ok(Resolution::Overwrite)
        })
        .with_audit(quiet())
        .run(&connector)
        .unwrap();

    assert_eq!(
        statuses(&ledger),
        vec![("a.pdf".to_string(), Status::Success), ("b.pdf".to_string(), Status::Success)]
    );
    assert_eq!(asked.get(), 0);
    assert_eq!(fx.archived_names(), vec!["a.pdf", "b.pdf"]);
    assert!(!fx.source.join("a.pdf").exists());

    match &ledger.entries()[0].outcome {
        TransferOutcome::Success { remote_path, overwritten, archive } => {
            assert_eq!(remote_path, "/in/a.pdf");
            assert!(!*overwritten);
            assert_eq!(archive, &ArchiveStatus::Archived(fx.archive.join("a.pdf")));
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let state = connector.state();
    assert_eq!(state.opens, 1);
    assert_eq!(state.closes, 1);
    assert_eq!(state.files["/in/b.pdf"], b"%PDF b.pdf");
}

#[test]
fn test_existing_file_skipped_leaves_local_and_archive_alone() {
    let fx = Fixture::new(&["a.pdf"]);
    let connector = MockConnector::new().with_remote_file("/in/a.pdf");

    let ledger = UploadSession::new(fx.profile(), fx.files(&["a.pdf"]))
        .with_resolver(FixedResolver(Resolution::Skip))
        .with_audit(quiet())
        .run(&connector)
        .unwrap();

    assert_eq!(ledger.len(), 1);
    assert_eq!(
        ledger.entries()[0].outcome,
        TransferOutcome::Skipped { reason: "Exists on server; skipped".into() }
    );
    assert!(fx.source.join("a.pdf").exists());
    assert!(fx.archived_names().is_empty());

    let state = connector.state();
    assert!(state.writes.is_empty());
    assert_eq!(state.files["/in/a.pdf"], b"existing");
    assert_eq!(state.closes, 1);
}

#[test]
fn test_existing_file_overwritten_is_archived_with_timestamp() {
    let fx = Fixture::new(&["a.pdf"]);
    let connector = MockConnector::new().with_remote_file("/in/a.pdf");

    let ledger = UploadSession::new(fx.profile(), fx.files(&["a.pdf"]))
        .with_resolver(FixedResolver(Resolution::Overwrite))
        .with_audit(quiet())
        .run(&connector)
        .unwrap();

    match &ledger.entries()[0].outcome {
        TransferOutcome::Success { overwritten, .. } => assert!(*overwritten),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(!fx.source.join("a.pdf").exists());

    let archived = fx.archived_names();
    assert_eq!(archived.len(), 1);
    assert_ne!(archived[0], "a.pdf");
    assert!(archived[0].starts_with("a_") && archived[0].ends_with(".pdf"));
    assert_eq!(connector.state().files["/in/a.pdf"], b"%PDF a.pdf");
}

#[test]
fn test_write_failure_mid_batch_does_not_stop_it() {
    let fx = Fixture::new(&["a.pdf", "b.pdf", "c.pdf"]);
    let connector = MockConnector::new().failing_write("/in/b.pdf");

    let ledger = UploadSession::new(fx.profile(), fx.files(&["a.pdf", "b.pdf", "c.pdf"]))
        .with_audit(quiet())
        .run(&connector)
        .unwrap();

    assert_eq!(
        statuses(&ledger),
        vec![
            ("a.pdf".to_string(), Status::Success),
            ("b.pdf".to_string(), Status::Failed),
            ("c.pdf".to_string(), Status::Success),
        ]
    );
    // Failed uploads stay in the outbox.
    assert!(fx.source.join("b.pdf").exists());
    assert_eq!(fx.archived_names(), vec!["a.pdf", "c.pdf"]);
    assert_eq!(connector.state().closes, 1);
}

#[test]
fn test_open_failure_aborts_before_any_file() {
    let fx = Fixture::new(&["a.pdf"]);
    let mut connector = MockConnector::new();
    connector.refuse = true;
    let mut events: Vec<AuditEvent> = Vec::new();

    let err = UploadSession::new(fx.profile(), fx.files(&["a.pdf"]))
        .with_resolver(FixedResolver(Resolution::Overwrite))
        .with_audit(&mut events)
        .run(&connector)
        .unwrap_err();

    assert!(err.is_connection());
    assert!(events.is_empty());
    assert!(fx.source.join("a.pdf").exists());
    assert!(fx.archived_names().is_empty());
    let state = connector.state();
    assert!(state.writes.is_empty());
    assert_eq!(state.closes, 0);
}

#[test]
fn test_invalid_profile_never_connects() {
    let fx = Fixture::new(&["a.pdf"]);
    let connector = MockConnector::new();
    let mut profile = fx.profile();
    profile.username.clear();

    let err = UploadSession::new(profile, fx.files(&["a.pdf"]))
        .with_audit(quiet())
        .run(&connector)
        .unwrap_err();

    assert!(matches!(err, PoUploadError::Config(_)));
    assert_eq!(connector.state().opens, 0);
}

#[test]
fn test_collision_without_resolver_fails_closed() {
    let fx = Fixture::new(&["a.pdf", "b.pdf"]);
    let connector = MockConnector::new().with_remote_file("/in/a.pdf");

    let ledger = UploadSession::new(fx.profile(), fx.files(&["a.pdf", "b.pdf"]))
        .with_audit(quiet())
        .run(&connector)
        .unwrap();

    assert_eq!(
        statuses(&ledger),
        vec![("a.pdf".to_string(), Status::Failed), ("b.pdf".to_string(), Status::Success)]
    );
    match &ledger.entries()[0].outcome {
        TransferOutcome::Failed { error } => {
            assert_eq!(error, "a.pdf exists on the server and no overwrite policy is configured")
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    let state = connector.state();
    assert_eq!(state.writes, vec!["/in/b.pdf"]);
    assert_eq!(state.files["/in/a.pdf"], b"existing");
}

#[test]
fn test_resolver_error_fails_only_that_file() {
    let fx = Fixture::new(&["a.pdf"]);
    let connector = MockConnector::new().with_remote_file("/in/a.pdf");

    let ledger = UploadSession::new(fx.profile(), fx.files(&["a.pdf"]))
        .with_resolver(|name: &str| -> Result<Resolution> {
            Err(PoUploadError::Resolver(format!("{}: no answer", name)))
        })
        .with_audit(quiet())
        .run(&connector)
        .unwrap();

    match &ledger.entries()[0].outcome {
        TransferOutcome::Failed { error } => assert!(error.contains("no answer")),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(connector.state().writes.is_empty());
    assert!(fx.source.join("a.pdf").exists());
}

#[test]
fn test_stat_error_is_not_treated_as_absent() {
    let fx = Fixture::new(&["a.pdf", "b.pdf"]);
    let connector = MockConnector::new().failing_stat("/in/a.pdf");

    let ledger = UploadSession::new(fx.profile(), fx.files(&["a.pdf", "b.pdf"]))
        .with_resolver(FixedResolver(Resolution::Overwrite))
        .with_audit(quiet())
        .run(&connector)
        .unwrap();

    assert_eq!(
        statuses(&ledger),
        vec![("a.pdf".to_string(), Status::Failed), ("b.pdf".to_string(), Status::Success)]
    );
    assert_eq!(connector.state().writes, vec!["/in/b.pdf"]);
}

#[test]
fn test_missing_local_file_is_recorded_as_failure() {
    let fx = Fixture::new(&["b.pdf"]);
    let connector = MockConnector::new();

    let ledger = UploadSession::new(fx.profile(), fx.files(&["gone.pdf", "b.pdf"]))
        .with_audit(quiet())
        .run(&connector)
        .unwrap();

    assert_eq!(
        statuses(&ledger),
        vec![("gone.pdf".to_string(), Status::Failed), ("b.pdf".to_string(), Status::Success)]
    );
}

#[test]
fn test_archive_failure_keeps_success_status() {
    let fx = Fixture::new(&["a.pdf"]);
    // A plain file where the archive directory should be.
    fs::write(&fx.archive, b"not a directory").unwrap();
    let connector = MockConnector::new();
    let mut events: Vec<AuditEvent> = Vec::new();

    let ledger = UploadSession::new(fx.profile(), fx.files(&["a.pdf"]))
        .with_audit(&mut events)
        .run(&connector)
        .unwrap();

    let outcome = &ledger.entries()[0].outcome;
    assert_eq!(outcome.status(), Status::Success);
    assert!(matches!(
        outcome,
        TransferOutcome::Success { archive: ArchiveStatus::Failed(_), .. }
    ));
    assert_eq!(ledger.summary().archive_failures, 1);
    assert!(fx.source.join("a.pdf").exists());
    assert!(connector.state().files.contains_key("/in/a.pdf"));
    assert!(events.iter().any(|e| matches!(e, AuditEvent::ArchiveFailed { .. })));
}

#[test]
fn test_cancel_between_files() {
    let fx = Fixture::new(&["a.pdf", "b.pdf", "c.pdf"]);
    let connector = MockConnector::new().with_remote_file("/in/a.pdf");
    let cancel = CancelFlag::new();
    let trigger = cancel.clone();
    let mut events: Vec<AuditEvent> = Vec::new();

    let ledger = UploadSession::new(fx.profile(), fx.files(&["a.pdf", "b.pdf", "c.pdf"]))
        .with_cancel(cancel)
        .with_resolver(move |_: &str| -> Result<Resolution> {
            // Cancelling mid-file still lets the current file finish.
            trigger.cancel();
            Ok(Resolution::Overwrite)
        })
        .with_audit(&mut events)
        .run(&connector)
        .unwrap();

    assert_eq!(statuses(&ledger), vec![("a.pdf".to_string(), Status::Success)]);
    assert!(fx.source.join("b.pdf").exists());
    assert_eq!(connector.state().closes, 1);
    assert!(events.contains(&AuditEvent::Cancelled { processed: 1, total: 3 }));
    assert_eq!(events.last(), Some(&AuditEvent::SessionComplete { files: 1 }));
}

#[test]
fn test_audit_trail_covers_every_step() {
    let fx = Fixture::new(&["a.pdf", "b.pdf"]);
    let connector = MockConnector::new().with_remote_file("/in/b.pdf");
    let mut events: Vec<AuditEvent> = Vec::new();

    UploadSession::new(fx.profile(), fx.files(&["a.pdf", "b.pdf"]))
        .with_resolver(FixedResolver(Resolution::Skip))
        .with_audit(&mut events)
        .run(&connector)
        .unwrap();

    assert_eq!(
        events,
        vec![
            AuditEvent::Preparing { file: "a.pdf".into() },
            AuditEvent::Uploaded {
                file: "a.pdf".into(),
                remote_path: "/in/a.pdf".into(),
                overwritten: false,
            },
            AuditEvent::Preparing { file: "b.pdf".into() },
            AuditEvent::Skipped { file: "b.pdf".into(), reason: "Exists on server; skipped".into() },
            AuditEvent::SessionComplete { files: 2 },
        ]
    );
}

#[test]
fn test_guard_closes_once_on_drop() {
    let connector = MockConnector::new();
    let profile = ConnectionProfile::new("h", "u", "p", "/in", "/tmp/archive");
    {
        let _guard = SessionGuard::new(connector.open(&profile).unwrap());
    }
    assert_eq!(connector.state().closes, 1);

    let guard = SessionGuard::new(connector.open(&profile).unwrap());
    guard.close().unwrap();
    assert_eq!(connector.state().closes, 2);
}

#[test]
fn test_probe_writes_and_removes() {
    let connector = MockConnector::new().with_remote_file("/in/old.pdf");
    let profile = ConnectionProfile::new("h", "u", "p", "/in", "/tmp/archive");
    let guard = SessionGuard::new(connector.open(&profile).unwrap());

    let entries = probe(guard.session(), "/in").unwrap();
    guard.close().unwrap();

    assert_eq!(entries, 1);
    let state = connector.state();
    assert_eq!(state.writes, vec!["/in/test_sftp.txt"]);
    assert_eq!(state.removes, vec!["/in/test_sftp.txt"]);
    assert!(!state.files.contains_key("/in/test_sftp.txt"));
}
