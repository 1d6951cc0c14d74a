//! Publishing one photo: the (possibly upscaled) full image to object
//! storage and a thumbnail to the ingestion endpoint.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::{Config, ThumbnailFailure};
use crate::error::SyncError;
use crate::remote::{publish, remote_key, ObjectStore, ThumbnailSink, UploadPolicy};
use crate::scanner::{Orientation, PhotoMetadata};

/// Used when the format gives no better guess.
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub container: String,
    pub policy: UploadPolicy,
    pub canonical_size: u32,
    pub thumbnail_size: u32,
    pub thumbnail_failure: ThumbnailFailure,
}

impl TransferSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            container: config.container.clone(),
            policy: config.transfer.upload_policy,
            canonical_size: config.transfer.canonical_size,
            thumbnail_size: config.transfer.thumbnail_size,
            thumbnail_failure: config.transfer.thumbnail_failure,
        }
    }
}

/// Outcome of transferring one photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transferred {
    /// Whether the full image was uploaded (false only when skipped by policy).
    pub uploaded: bool,
    /// HTTP status returned for the thumbnail post.
    pub thumbnail_status: u16,
}

/// Fixed output size for an undersized photo, or `None` when the photo's
/// dominant dimension already reaches `canonical` and it is kept as is.
///
/// Square and vertical photos are judged by height, horizontal ones by
/// width. Targets are `canonical` square, or `canonical` by 3/4 of it.
pub fn upscale_target(
    orientation: Orientation,
    width: u32,
    height: u32,
    canonical: u32,
) -> Option<(u32, u32)> {
    let short = canonical * 3 / 4;
    let (dominant, target) = match orientation {
        Orientation::Square => (height, (canonical, canonical)),
        Orientation::Horizontal => (width, (canonical, short)),
        Orientation::Vertical => (height, (short, canonical)),
    };
    (dominant < canonical).then_some(target)
}

pub fn content_type_for(file_type: &str) -> &'static str {
    mime_guess::from_ext(&file_type.to_lowercase())
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

pub struct TransferEngine<'a> {
    store: &'a dyn ObjectStore,
    thumbs: &'a dyn ThumbnailSink,
    settings: &'a TransferSettings,
}

impl<'a> TransferEngine<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        thumbs: &'a dyn ThumbnailSink,
        settings: &'a TransferSettings,
    ) -> Self {
        Self {
            store,
            thumbs,
            settings,
        }
    }

    pub fn transfer(&self, local_path: &Path, photo: &PhotoMetadata) -> Result<Transferred> {
        let uploaded = self.upload_full(local_path, photo)?;
        let thumbnail_status = self.push_thumbnail(local_path, photo)?;
        Ok(Transferred {
            uploaded,
            thumbnail_status,
        })
    }

    fn upload_full(&self, local_path: &Path, photo: &PhotoMetadata) -> Result<bool> {
        let mut img = open_image(local_path)?;
        if let Some((width, height)) = upscale_target(
            photo.orientation,
            photo.width,
            photo.height,
            self.settings.canonical_size,
        ) {
            info!("Upscaling {} to {}x{}", photo.name, width, height);
            img = img.resize_exact(width, height, FilterType::Triangle);
        }

        let tmp = encode_to_temp(&img, photo)?;
        info!("Uploading: {}", photo.name);
        let key = remote_key(&self.settings.container, Path::new(&photo.name));
        let uploaded = publish(
            self.store,
            &key,
            tmp.path(),
            Some(content_type_for(&photo.file_type)),
            self.settings.policy,
        )?;
        if !uploaded {
            info!("Skipping {}; {} already exists", photo.name, key);
        }
        Ok(uploaded)
    }

    fn push_thumbnail(&self, local_path: &Path, photo: &PhotoMetadata) -> Result<u16> {
        let size = self.settings.thumbnail_size;
        let thumbnail = open_image(local_path)?.thumbnail(size, size);

        let tmp = encode_to_temp(&thumbnail, photo)?;
        let bytes = std::fs::read(tmp.path())?;

        info!("Posting thumbnail for {}", photo.name);
        let status = self.thumbs.post(&photo.name, bytes)?;
        if !(200..300).contains(&status) {
            match self.settings.thumbnail_failure {
                ThumbnailFailure::Ignore => {
                    warn!("Thumbnail for {} answered with HTTP {}", photo.name, status);
                }
                ThumbnailFailure::Fail => {
                    return Err(SyncError::ThumbnailRejected {
                        name: photo.name.clone(),
                        status,
                    }
                    .into());
                }
            }
        }
        Ok(status)
    }
}

fn open_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("Failed to decode {}", path.display()))
}

/// Encode `img` in the photo's own format into a fresh temp file. The file
/// is removed when the returned handle drops, whatever happens next.
fn encode_to_temp(img: &DynamicImage, photo: &PhotoMetadata) -> Result<NamedTempFile> {
    let suffix = format!(".{}", extension_for(photo.format));
    let mut tmp = tempfile::Builder::new()
        .prefix("photosync-")
        .suffix(&suffix)
        .tempfile()
        .context("Failed to create temp file")?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        img.write_to(&mut writer, photo.format).map_err(|e| {
            anyhow::Error::new(SyncError::UnsupportedFormat {
                name: photo.name.clone(),
                file_type: photo.file_type.clone(),
            })
            .context(e)
        })?;
        writer.flush()?;
    }
    Ok(tmp)
}

fn extension_for(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}
