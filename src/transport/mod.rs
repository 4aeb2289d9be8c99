use crate::Result;
use crate::profile::ConnectionProfile;
use std::path::Path;
use tracing::{debug, warn};

pub mod ssh;

/// One live, authenticated connection to the remote file store.
///
/// Remote paths are plain `/`-separated strings; they are never run through
/// `std::path`, which would apply the local OS rules.
pub trait RemoteSession {
    /// `Ok(false)` only when the server reports the path as absent.
    fn exists(&self, remote: &str) -> Result<bool>;
    /// Stream a local file to `remote`, replacing any existing content.
    fn write(&self, local: &Path, remote: &str) -> Result<()>;
    fn remove(&self, remote: &str) -> Result<()>;
    /// Names of the entries in a remote directory.
    fn list_dir(&self, remote: &str) -> Result<Vec<String>>;
    /// Release the connection. The session is unusable afterwards.
    fn close(&mut self) -> Result<()>;
}

/// Opens sessions. Transport and authentication failures are returned as-is;
/// there is no retry here.
pub trait Connector {
    type Session: RemoteSession;

    fn open(&self, profile: &ConnectionProfile) -> Result<Self::Session>;
}

/// Closes the wrapped session exactly once: explicitly through
/// [`SessionGuard::close`], or on drop if that never happened.
pub struct SessionGuard<S: RemoteSession> {
    session: S,
    closed: bool,
}

impl<S: RemoteSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self { session, closed: false }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.session.close()
    }
}

impl<S: RemoteSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.session.close() {
                warn!("Failed to close remote session: {}", e);
            }
        }
    }
}

const PROBE_FILE: &str = "test_sftp.txt";

/// Connection check: list the remote directory, write a probe file into it,
/// then remove it again.
pub fn probe<S: RemoteSession>(session: &S, remote_dir: &str) -> Result<usize> {
    let entries = session.list_dir(remote_dir)?;
    debug!("Remote directory {} has {} entries", remote_dir, entries.len());

    let probe_remote = format!("{}/{}", remote_dir.trim_end_matches('/'), PROBE_FILE);
    let local = std::env::temp_dir().join(format!("po-upload-probe-{}.txt", std::process::id()));
    std::fs::write(&local, b"test")?;
    let written = session.write(&local, &probe_remote);
    let _ = std::fs::remove_file(&local);
    written?;

    session.remove(&probe_remote)?;
    Ok(entries.len())
}
