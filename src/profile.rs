use crate::{PoUploadError, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable consulted when the profile file carries no password.
pub const PASSWORD_ENV: &str = "PO_UPLOAD_PASSWORD";

const DEFAULT_PORT: u16 = 22;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Password wrapper that never shows up in `Debug` output or logs.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Connection and filing details for one SFTP drop.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Secret,
    pub remote_path: String,
    pub archive_path: PathBuf,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// Connect and per-operation timeout (seconds). 0 disables it.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ConnectionProfile {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        remote_path: impl Into<String>,
        archive_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: Secret::new(password),
            remote_path: remote_path.into(),
            archive_path: archive_path.into(),
            log_path: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Load a profile from a TOML file, falling back to `PO_UPLOAD_PASSWORD`
    /// when the file leaves the password out.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PoUploadError::Config(format!("Cannot read profile {:?}: {}", path, e)))?;
        let mut profile: ConnectionProfile = toml::from_str(&text)?;
        if profile.password.is_empty() {
            if let Ok(pw) = std::env::var(PASSWORD_ENV) {
                profile.password = Secret::new(pw);
            }
        }
        Ok(profile)
    }

    /// Every field except the log destination must be filled in before a
    /// session may be opened.
    pub fn validate(&self) -> Result<()> {
        let missing = if self.host.trim().is_empty() {
            Some("host")
        } else if self.port == 0 {
            Some("port")
        } else if self.username.trim().is_empty() {
            Some("username")
        } else if self.password.is_empty() {
            Some("password")
        } else if self.remote_path.trim().is_empty() {
            Some("remote_path")
        } else if self.archive_path.as_os_str().is_empty() {
            Some("archive_path")
        } else {
            None
        };

        match missing {
            Some(field) => Err(PoUploadError::Config(format!("Profile field '{}' is empty", field))),
            None => Ok(()),
        }
    }

    /// Remote location for a local file name. Remote paths always use `/`.
    pub fn remote_file_path(&self, file_name: &str) -> String {
        let base = self.remote_path.trim_end_matches('/');
        if base.is_empty() {
            format!("/{}", file_name)
        } else {
            format!("{}/{}", base, file_name)
        }
    }

    /// The configured log file, or the dated default next to the archive.
    pub fn resolved_log_path(&self, today: NaiveDate) -> PathBuf {
        match &self.log_path {
            Some(p) if !p.as_os_str().is_empty() => p.clone(),
            _ => default_log_path(&self.archive_path, today),
        }
    }
}

/// `<archive parent>/SFTP Logs/sftp_transfer_<YYYYMMDD>.log`
pub fn default_log_path(archive_path: &Path, today: NaiveDate) -> PathBuf {
    let parent = archive_path.parent().unwrap_or_else(|| Path::new("."));
    parent
        .join("SFTP Logs")
        .join(format!("sftp_transfer_{}.log", today.format("%Y%m%d")))
}
