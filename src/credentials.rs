//! Line-oriented `key=value` credential files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

const SPACES_KEYS: [&str; 3] = ["spacekey", "secret", "bucket"];

/// Parsed contents of one credential file.
#[derive(Debug, Clone)]
pub struct Credentials {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl Credentials {
    /// Spaces-style file: any line starting with a known key contributes the
    /// text after its last `=`, trimmed.
    pub fn load_spaces(path: &Path) -> Result<Self, SyncError> {
        let content = read(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            values: parse_spaces(&content),
        })
    }

    /// Plain `KEY=VALUE` file, one pair per line.
    pub fn load_pairs(path: &Path) -> Result<Self, SyncError> {
        let content = read(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            values: parse_pairs(&content),
        })
    }

    pub fn require(&self, key: &str) -> Result<&str, SyncError> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| SyncError::MissingCredential {
                key: key.to_string(),
                path: self.path.clone(),
            })
    }
}

fn read(path: &Path) -> Result<String, SyncError> {
    std::fs::read_to_string(path).map_err(|source| SyncError::CredentialsRead {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_spaces(content: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for line in content.lines() {
        if let Some(key) = SPACES_KEYS.iter().find(|k| line.starts_with(*k)) {
            let value = line.rsplit('=').next().unwrap_or_default().trim();
            values.insert(key.to_string(), value.to_string());
        }
    }
    values
}

fn parse_pairs(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
