//! In-run cache of album ids.

use std::collections::HashMap;

/// Album name -> id for albums already resolved during this run, so each
/// album is looked up (or created) in the catalog at most once per run.
#[derive(Debug, Clone, Default)]
pub struct AlbumCache {
    seen: HashMap<String, String>,
}

impl AlbumCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.seen.get(name).map(String::as_str)
    }

    pub fn remember(&mut self, name: &str, id: &str) {
        self.seen.insert(name.to_string(), id.to_string());
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
