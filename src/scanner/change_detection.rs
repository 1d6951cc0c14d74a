//! Change detection for the photo tree.
//!
//! Decides whether a directory needs re-importing by comparing its current
//! fingerprint with the one recorded in the ledger at the end of the last
//! successful run.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::discovery::list_directory;
use super::fingerprint::fingerprint;

/// Ledger key for the photo root.
pub const ROOT_KEY: &str = "ALL";

/// Directory key -> fingerprint, as persisted in the `key:value` state file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: HashMap<String, String>,
}

impl Ledger {
    /// Read the ledger at `path`. A missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ledger {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter_map(|line| line.rsplit_once(':'))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace the file at `path` with this ledger. The new content is
    /// written to a sibling temp file and renamed into place, so readers see
    /// either the old ledger or the new one.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp ledger in {}", dir.display()))?;
        for (key, value) in &self.entries {
            writeln!(tmp, "{}:{}", key, value)?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .with_context(|| format!("Failed to replace ledger {}", path.display()))?;
        Ok(())
    }
}

/// Answers "has this directory changed since the last run?".
pub struct ChangeDetector {
    root: PathBuf,
    ledger_path: PathBuf,
    ledger: Option<Ledger>,
    force: bool,
}

impl ChangeDetector {
    pub fn new(root: &Path, ledger_path: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ledger_path: ledger_path.to_path_buf(),
            ledger: None,
            force: false,
        }
    }

    /// Report every directory as changed.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Ledger key for `dir`: `ALL` for the root, otherwise the base name.
    pub fn key_for(&self, dir: &Path) -> String {
        if dir == self.root {
            return ROOT_KEY.to_string();
        }
        dir.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| ROOT_KEY.to_string())
    }

    /// True when `dir` has no ledger entry or its fingerprint differs from
    /// the recorded one.
    pub fn has_changed(&mut self, dir: &Path) -> Result<bool> {
        if self.force {
            return Ok(true);
        }
        let key = self.key_for(dir);
        tracing::debug!("Checking changed status of {}", key);

        let previous = self.ledger()?.get(&key).map(str::to_string);
        tracing::debug!("Previous hash: {:?}", previous);
        let Some(previous) = previous else {
            return Ok(true);
        };

        let current = fingerprint(dir)?;
        tracing::debug!("Current hash: {}", current);
        Ok(current != previous)
    }

    fn ledger(&mut self) -> Result<&Ledger> {
        if self.ledger.is_none() {
            self.ledger = Some(Ledger::load(&self.ledger_path)?);
        }
        Ok(self.ledger.get_or_insert_with(Ledger::default))
    }

    /// Fingerprint the root and each of its non-hidden subdirectories and
    /// overwrite the ledger with the result.
    pub fn persist(&mut self) -> Result<Ledger> {
        let mut ledger = Ledger::default();
        ledger.insert(ROOT_KEY, fingerprint(&self.root)?);

        for subdir in list_directory(&self.root)?.subdirs {
            let key = self.key_for(&subdir);
            // A top-level directory named like the root key must not
            // clobber the root entry; it simply counts as changed.
            if key == ROOT_KEY {
                continue;
            }
            ledger.insert(key, fingerprint(&subdir)?);
        }

        ledger.save(&self.ledger_path)?;
        tracing::info!("State file updated");
        self.ledger = Some(ledger.clone());
        Ok(ledger)
    }
}
