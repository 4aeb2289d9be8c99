use crate::{PoUploadError, Result};
use chrono::Local;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Moves uploaded files into the local archive directory.
#[derive(Debug, Clone)]
pub struct Archiver {
    archive_dir: PathBuf,
}

impl Archiver {
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        Self { archive_dir: archive_dir.into() }
    }

    /// Move `local` into the archive. When the upload replaced a remote copy
    /// the archived name gets a timestamp so the earlier archived file of the
    /// same name survives.
    pub fn archive(&self, local: &Path, was_overwrite: bool) -> Result<PathBuf> {
        let file_name = local.file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PoUploadError::FileNotFound(local.to_path_buf()))?;

        if !local.is_file() {
            return Err(PoUploadError::FileNotFound(local.to_path_buf()));
        }

        fs::create_dir_all(&self.archive_dir).map_err(|source| PoUploadError::Archive {
            path: self.archive_dir.clone(),
            source,
        })?;

        let target = if was_overwrite {
            let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
            self.free_name(&timestamped_name(file_name, &stamp))
        } else {
            self.archive_dir.join(file_name)
        };

        move_file(local, &target).map_err(|source| PoUploadError::Archive {
            path: local.to_path_buf(),
            source,
        })?;

        debug!("Archived {:?} -> {:?}", local, target);
        Ok(target)
    }

    /// First of `name`, `stem_1.ext`, `stem_2.ext`, ... not yet in the archive.
    fn free_name(&self, name: &str) -> PathBuf {
        let candidate = self.archive_dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        let (stem, ext) = split_name(name);
        (1..)
            .map(|n| self.archive_dir.join(format!("{}_{}{}", stem, n, ext)))
            .find(|p| !p.exists())
            .unwrap_or(candidate)
    }
}

/// `report.pdf` + `20240309_141500` -> `report_20240309_141500.pdf`
pub fn timestamped_name(file_name: &str, stamp: &str) -> String {
    let (stem, ext) = split_name(file_name);
    format!("{}_{}{}", stem, stamp, ext)
}

/// Splits at the last dot, keeping the dot with the extension. A leading dot
/// is part of the stem.
fn split_name(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(0) | None => (file_name, ""),
        Some(i) => file_name.split_at(i),
    }
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => copy_then_remove(from, to, |p| fs::remove_file(p)),
        Err(e) => Err(e),
    }
}

/// Copy `from` to `to`, then drop the source. If the source cannot be
/// removed the copy is deleted again so the file exists in one place only.
fn copy_then_remove<R>(from: &Path, to: &Path, remove: R) -> std::io::Result<()>
where
    R: FnOnce(&Path) -> std::io::Result<()>,
{
    fs::copy(from, to)?;
    if let Err(e) = remove(from) {
        let _ = fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}
