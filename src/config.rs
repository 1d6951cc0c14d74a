use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::remote::UploadPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the photo tree to import.
    #[serde(default = "default_photo_dir")]
    pub photo_dir: PathBuf,

    /// Object storage prefix that full-size images are published under.
    #[serde(default = "default_container")]
    pub container: String,

    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,

    /// Treat every directory as changed.
    #[serde(default)]
    pub force_resync: bool,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub transfer: TransferConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub gallery: GalleryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "gif".to_string(),
        "webp".to_string(),
        "tif".to_string(),
        "tiff".to_string(),
        "bmp".to_string(),
    ]
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailFailure {
    /// Log a non-success response and carry on.
    #[default]
    Ignore,
    /// Abort the run on a non-success response.
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_importer_policy")]
    pub upload_policy: UploadPolicy,

    /// Long edge of the canonical upscale targets; the short edge is 3/4 of it.
    #[serde(default = "default_canonical_size")]
    pub canonical_size: u32,

    #[serde(default = "default_thumbnail_url")]
    pub thumbnail_url: String,

    /// Bounding box (width and height) for generated thumbnails.
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,

    #[serde(default)]
    pub thumbnail_failure: ThumbnailFailure,
}

fn default_importer_policy() -> UploadPolicy {
    UploadPolicy::AlwaysOverwrite
}

fn default_canonical_size() -> u32 {
    4000
}

fn default_thumbnail_url() -> String {
    "https://photo.leafe.com/images/thumb".to_string()
}

fn default_thumbnail_size() -> u32 {
    120
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            upload_policy: default_importer_policy(),
            canonical_size: default_canonical_size(),
            thumbnail_url: default_thumbnail_url(),
            thumbnail_size: default_thumbnail_size(),
            thumbnail_failure: ThumbnailFailure::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File holding `spacekey`, `secret` and `bucket`.
    #[serde(default = "default_storage_credentials")]
    pub credentials_file: PathBuf,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub force_path_style: bool,
}

fn default_storage_credentials() -> PathBuf {
    home_dir().join(".docreds")
}

fn default_endpoint() -> String {
    "https://nyc3.digitaloceanspaces.com".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_file: default_storage_credentials(),
            endpoint: default_endpoint(),
            region: default_region(),
            force_path_style: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    Sqlite,
    Postgresql,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: DatabaseType,

    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,

    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_name")]
    pub name: String,

    /// File holding `DB_USERNAME` and `DB_PWD` for the PostgreSQL backend.
    #[serde(default = "default_db_credentials")]
    pub credentials_file: PathBuf,
}

fn default_sqlite_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photosync")
        .join("photoframe.db")
}

fn default_db_host() -> String {
    "dodata".to_string()
}

fn default_db_name() -> String {
    "photoframe".to_string()
}

fn default_db_credentials() -> PathBuf {
    home_dir().join(".dbcreds")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseType::default(),
            sqlite_path: default_sqlite_path(),
            host: default_db_host(),
            name: default_db_name(),
            credentials_file: default_db_credentials(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryConfig {
    #[serde(default = "default_gallery_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_gallery_container")]
    pub container: String,
}

fn default_gallery_dir() -> PathBuf {
    home_dir().join("Desktop").join("Website Gallery")
}

fn default_gallery_container() -> String {
    "galleries".to_string()
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            dir: default_gallery_dir(),
            container: default_gallery_container(),
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_photo_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| home_dir().join("Pictures"))
        .join("photoframe")
}

fn default_container() -> String {
    "photoviewer".to_string()
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("state.hash")
}

fn default_lock_path() -> PathBuf {
    PathBuf::from(".upload.lock")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            photo_dir: default_photo_dir(),
            container: default_container(),
            ledger_path: default_ledger_path(),
            lock_path: default_lock_path(),
            force_resync: false,
            scanner: ScannerConfig::default(),
            transfer: TransferConfig::default(),
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            gallery: GalleryConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, writing a default config there if
    /// none exists yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photosync")
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PHOTOSYNC_CONFIG") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }
}
