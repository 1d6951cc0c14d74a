//! Remote destinations: object storage for full images and the thumbnail
//! ingestion endpoint.

pub mod s3;
pub mod thumbs;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use s3::S3Store;
pub use thumbs::{HttpThumbnailSink, ThumbnailSink};

/// Minimal object storage surface the importer and gallery uploader need.
pub trait ObjectStore {
    fn exists(&self, key: &str) -> Result<bool>;

    fn put_file(&self, key: &str, path: &Path, content_type: Option<&str>) -> Result<()>;

    fn set_public_read(&self, key: &str) -> Result<()>;
}

/// What to do when the destination key may already hold an object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UploadPolicy {
    /// Check for the key first and leave an existing object untouched.
    SkipIfPresent,
    /// Upload unconditionally, replacing any existing object.
    AlwaysOverwrite,
}

/// Object key for `relative` under `container`, always `/`-separated.
pub fn remote_key(container: &str, relative: &Path) -> String {
    let mut key = container.trim_end_matches('/').to_string();
    for component in relative.components() {
        if let std::path::Component::Normal(part) = component {
            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(&part.to_string_lossy());
        }
    }
    key
}

/// Upload `path` to `key` according to `policy` and make it publicly
/// readable. Returns whether an upload took place.
pub fn publish(
    store: &dyn ObjectStore,
    key: &str,
    path: &Path,
    content_type: Option<&str>,
    policy: UploadPolicy,
) -> Result<bool> {
    if policy == UploadPolicy::SkipIfPresent && store.exists(key)? {
        return Ok(false);
    }
    store.put_file(key, path, content_type)?;
    store.set_public_read(key)?;
    Ok(true)
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory stand-ins for the remote services.

    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct StoredObject {
        pub bytes: Vec<u8>,
        pub content_type: Option<String>,
        pub public: bool,
    }

    /// Shared handle; clones see the same objects.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryStore {
        pub objects: Rc<RefCell<BTreeMap<String, StoredObject>>>,
        pub puts: Rc<RefCell<Vec<String>>>,
    }

    impl MemoryStore {
        pub fn keys(&self) -> Vec<String> {
            self.objects.borrow().keys().cloned().collect()
        }

        pub fn object(&self, key: &str) -> Option<StoredObject> {
            self.objects.borrow().get(key).cloned()
        }

        pub fn put_count(&self) -> usize {
            self.puts.borrow().len()
        }
    }

    impl ObjectStore for MemoryStore {
        fn exists(&self, key: &str) -> Result<bool> {
            Ok(self.objects.borrow().contains_key(key))
        }

        fn put_file(&self, key: &str, path: &Path, content_type: Option<&str>) -> Result<()> {
            let bytes = std::fs::read(path)?;
            self.objects.borrow_mut().insert(
                key.to_string(),
                StoredObject {
                    bytes,
                    content_type: content_type.map(str::to_string),
                    public: false,
                },
            );
            self.puts.borrow_mut().push(key.to_string());
            Ok(())
        }

        fn set_public_read(&self, key: &str) -> Result<()> {
            match self.objects.borrow_mut().get_mut(key) {
                Some(object) => {
                    object.public = true;
                    Ok(())
                }
                None => anyhow::bail!("no such key: {}", key),
            }
        }
    }

    /// Records every thumbnail post and answers with a fixed status.
    #[derive(Debug, Clone)]
    pub struct RecordingSink {
        pub posts: Rc<RefCell<Vec<(String, Vec<u8>)>>>,
        pub status: u16,
    }

    impl RecordingSink {
        pub fn answering(status: u16) -> Self {
            Self {
                posts: Rc::default(),
                status,
            }
        }

        pub fn names(&self) -> Vec<String> {
            self.posts.borrow().iter().map(|(n, _)| n.clone()).collect()
        }
    }

    impl Default for RecordingSink {
        fn default() -> Self {
            Self::answering(200)
        }
    }

    impl ThumbnailSink for RecordingSink {
        fn post(&self, filename: &str, bytes: Vec<u8>) -> Result<u16> {
            self.posts.borrow_mut().push((filename.to_string(), bytes));
            Ok(self.status)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryStore;
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_remote_key() {
        assert_eq!(remote_key("photoviewer", Path::new("a.jpg")), "photoviewer/a.jpg");
        assert_eq!(
            remote_key("galleries/", &PathBuf::from("2023").join("b.jpg")),
            "galleries/2023/b.jpg"
        );
    }

    #[test]
    fn test_publish_policies() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.jpg");
        let second = dir.path().join("second.jpg");
        std::fs::write(&first, b"first").unwrap();
        std::fs::write(&second, b"second").unwrap();

        let store = MemoryStore::default();
        assert!(publish(&store, "c/x.jpg", &first, Some("image/jpeg"), UploadPolicy::SkipIfPresent).unwrap());
        assert!(!publish(&store, "c/x.jpg", &second, None, UploadPolicy::SkipIfPresent).unwrap());
        assert_eq!(store.object("c/x.jpg").unwrap().bytes, b"first");

        assert!(publish(&store, "c/x.jpg", &second, None, UploadPolicy::AlwaysOverwrite).unwrap());
        let object = store.object("c/x.jpg").unwrap();
        assert_eq!(object.bytes, b"second");
        assert!(object.public);
        assert_eq!(store.put_count(), 2);
    }
}
