use crate::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand command-line arguments into the ordered list of PDFs to upload.
///
/// Files are kept in argument order. A directory contributes its direct
/// `.pdf` children, sorted by name. Anything else is skipped with a warning.
pub fn collect_pdfs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let walker = WalkDir::new(input)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name();
            for entry in walker {
                let entry = entry?;
                if entry.file_type().is_file() && is_pdf(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else if is_pdf(input) {
            files.push(input.clone());
        } else {
            tracing::warn!("Skipping non-PDF input: {:?}", input);
        }
    }

    Ok(files)
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
