//! Flat-folder uploader: mirror a gallery directory into object storage,
//! skipping anything already there. No catalog, no ledger, no resizing.

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::remote::{publish, remote_key, ObjectStore, UploadPolicy};
use crate::scanner::discover_files;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GalleryReport {
    pub uploaded: usize,
    pub skipped: usize,
}

pub fn upload_gallery(root: &Path, container: &str, store: &dyn ObjectStore) -> Result<GalleryReport> {
    let mut report = GalleryReport::default();

    for path in discover_files(root)? {
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let key = remote_key(container, relative);
        let content_type = mime_guess::from_path(&path).first_raw();

        if publish(store, &key, &path, content_type, UploadPolicy::SkipIfPresent)? {
            info!("Uploaded {}", key);
            report.uploaded += 1;
        } else {
            info!("Skipping {}", key);
            report.skipped += 1;
        }
    }

    Ok(report)
}
