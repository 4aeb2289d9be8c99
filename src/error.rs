use thiserror::Error;
use std::path::PathBuf;

#[derive(Debug, Error)]
pub enum PoUploadError {
    #[error("SSH connection failed: {0}")]
    SshConnection(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Archive of {path:?} failed: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Resolver(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Profile parse error: {0}")]
    Profile(#[from] toml::de::Error),

    #[error("WalkDir error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

impl PoUploadError {
    /// True for errors raised while opening the session; these abort the batch.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::SshConnection(_) | Self::Authentication(_))
    }
}
