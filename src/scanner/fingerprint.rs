use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use walkdir::WalkDir;

use super::discovery::is_hidden;

/// SHA-256 over a recursive long listing of `dir`.
///
/// Each non-hidden entry below `dir` contributes one line with its relative
/// path, kind, byte length, modification time and mode, visited in name
/// order, so the digest changes iff something in the tree was added,
/// removed, resized, touched or re-permissioned. Hidden entries (and
/// everything under hidden directories) are not listed.
pub fn fingerprint(dir: &Path) -> Result<String> {
    let mut hasher = Sha256::new();

    let walker = WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if entry.depth() == 0 {
            continue;
        }
        let metadata = entry
            .metadata()
            .with_context(|| format!("Failed to stat {}", entry.path().display()))?;
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());

        let kind = if metadata.is_dir() {
            'd'
        } else if metadata.file_type().is_symlink() {
            'l'
        } else {
            '-'
        };
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        let line = format!(
            "{}{:o} {} {} {}\n",
            kind,
            mode(&metadata),
            metadata.len(),
            mtime,
            relative.to_string_lossy()
        );
        hasher.update(line.as_bytes());
    }

    let digest = format!("{:x}", hasher.finalize());
    tracing::debug!("Directory hash for {}: {}", dir.display(), digest);
    Ok(digest)
}

#[cfg(unix)]
fn mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode(metadata: &std::fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}
