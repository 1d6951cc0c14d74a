use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Direct children of one directory, hidden entries excluded.
#[derive(Debug, Clone, Default)]
pub struct DirListing {
    pub subdirs: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

pub fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// List the non-hidden direct children of `directory`, split into
/// subdirectories and everything else, each sorted by path.
pub fn list_directory(directory: &Path) -> Result<DirListing> {
    let mut listing = DirListing::default();

    let entries = std::fs::read_dir(directory)
        .with_context(|| format!("Failed to read directory {}", directory.display()))?;
    for entry in entries {
        let entry = entry?;
        if is_hidden(&entry.file_name()) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            listing.subdirs.push(path);
        } else {
            listing.files.push(path);
        }
    }

    listing.subdirs.sort();
    listing.files.sort();
    Ok(listing)
}

pub fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            extensions.iter().any(|e| e.to_lowercase() == ext_lower)
        }
        None => false,
    }
}

/// Every non-hidden file under `directory`, deepest directories first.
pub fn discover_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .contents_first(true)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to walk {}", directory.display()))?;
        if entry.file_type().is_file() && !is_hidden(entry.file_name()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}
