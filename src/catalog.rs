//! Reconciling one photo's metadata against the relational catalog.

use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use crate::db::{AlbumCache, CatalogTx, Database, ImageRecord};
use crate::scanner::PhotoMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub image_id: String,
    pub outcome: ReconcileOutcome,
    /// True when a new album membership row was written.
    pub album_linked: bool,
}

/// Insert, update or leave alone the catalog row for `photo`, then link it
/// to `album` when one is given. Everything happens in one transaction that
/// is committed before returning.
pub fn reconcile(
    db: &mut Database,
    albums: &mut AlbumCache,
    photo: &PhotoMetadata,
    album: Option<&str>,
) -> Result<Reconciled> {
    db.transaction(|tx| {
        let (image_id, outcome) = upsert_image(tx, photo)?;

        let album_linked = match album {
            Some(name) => {
                let album_id = resolve_album(tx, albums, name)?;
                tx.add_album_image(&album_id, &image_id)?
            }
            None => false,
        };

        Ok(Reconciled {
            image_id,
            outcome,
            album_linked,
        })
    })
}

fn upsert_image(tx: &mut dyn CatalogTx, photo: &PhotoMetadata) -> Result<(String, ReconcileOutcome)> {
    match tx.find_image(&photo.name)? {
        Some(existing) => {
            let fresh = ImageRecord::from_photo(existing.id.clone(), photo);
            if existing.same_attributes(&fresh) {
                return Ok((existing.id, ReconcileOutcome::Unchanged));
            }
            info!("DB; updating image {}", photo.name);
            tx.update_image(&fresh)?;
            Ok((existing.id, ReconcileOutcome::Updated))
        }
        None => {
            let record = ImageRecord::from_photo(Uuid::new_v4().to_string(), photo);
            info!("DB; inserting image {}", photo.name);
            tx.insert_image(&record)?;
            Ok((record.id, ReconcileOutcome::Inserted))
        }
    }
}

/// Album id for `name`: from the run cache, else the catalog, else a newly
/// created row. The result is cached either way.
fn resolve_album(tx: &mut dyn CatalogTx, albums: &mut AlbumCache, name: &str) -> Result<String> {
    if let Some(id) = albums.get(name) {
        return Ok(id.to_string());
    }

    let id = match tx.find_album(name)? {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4().to_string();
            info!("DB; creating album {}", name);
            tx.insert_album(&id, name)?;
            id
        }
    };
    albums.remember(name, &id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, DatabaseType};
    use crate::scanner::metadata::sentinel_created;
    use crate::scanner::{Orientation, SENTINEL_CREATED};
    use image::ImageFormat;
    use tempfile::tempdir;

    fn open_db(dir: &std::path::Path) -> Database {
        let config = DatabaseConfig {
            backend: DatabaseType::Sqlite,
            sqlite_path: dir.join("photoframe.db"),
            ..DatabaseConfig::default()
        };
        let db = Database::open(&config).unwrap();
        db.initialize().unwrap();
        db
    }

    fn photo(name: &str) -> PhotoMetadata {
        PhotoMetadata {
            name: name.to_string(),
            file_type: "JPEG".to_string(),
            format: ImageFormat::Jpeg,
            size_bytes: 2048,
            width: 4000,
            height: 3000,
            orientation: Orientation::Horizontal,
            created: sentinel_created(),
            keywords: vec!["beach".to_string(), "sunset".to_string()],
        }
    }

    #[test]
    fn test_insert_then_noop_then_update() {
        let dir = tempdir().unwrap();
        let mut db = open_db(dir.path());
        let mut albums = AlbumCache::new();

        let first = reconcile(&mut db, &mut albums, &photo("a.jpg"), None).unwrap();
        assert_eq!(first.outcome, ReconcileOutcome::Inserted);
        assert!(!first.album_linked);

        let again = reconcile(&mut db, &mut albums, &photo("a.jpg"), None).unwrap();
        assert_eq!(again.outcome, ReconcileOutcome::Unchanged);
        assert_eq!(again.image_id, first.image_id);

        let mut edited = photo("a.jpg");
        edited.keywords.push("family".to_string());
        let updated = reconcile(&mut db, &mut albums, &edited, None).unwrap();
        assert_eq!(updated.outcome, ReconcileOutcome::Updated);
        assert_eq!(updated.image_id, first.image_id);

        let stored = db
            .transaction(|tx| tx.find_image("a.jpg"))
            .unwrap()
            .unwrap();
        assert_eq!(stored.keywords, "beach sunset family");
        assert_eq!(db.stats().unwrap().images, 1);
    }

    #[test]
    fn test_missing_capture_date_stores_sentinel() {
        let dir = tempdir().unwrap();
        let mut db = open_db(dir.path());
        let mut albums = AlbumCache::new();

        reconcile(&mut db, &mut albums, &photo("old.jpg"), None).unwrap();
        let stored = db
            .transaction(|tx| tx.find_image("old.jpg"))
            .unwrap()
            .unwrap();
        assert_eq!(stored.created, SENTINEL_CREATED);
        assert_eq!(stored.orientation, "H");
    }

    #[test]
    fn test_album_created_once_and_membership_idempotent() {
        let dir = tempdir().unwrap();
        let mut db = open_db(dir.path());
        let mut albums = AlbumCache::new();

        let a = reconcile(&mut db, &mut albums, &photo("a.jpg"), Some("Vacation2023")).unwrap();
        let b = reconcile(&mut db, &mut albums, &photo("b.jpg"), Some("Vacation2023")).unwrap();
        assert!(a.album_linked && b.album_linked);
        assert_eq!(albums.len(), 1);

        let repeat = reconcile(&mut db, &mut albums, &photo("a.jpg"), Some("Vacation2023")).unwrap();
        assert!(!repeat.album_linked);

        let stats = db.stats().unwrap();
        assert_eq!((stats.images, stats.albums, stats.memberships), (2, 1, 2));
    }

    #[test]
    fn test_existing_album_found_by_fresh_cache() {
        let dir = tempdir().unwrap();
        let mut db = open_db(dir.path());

        reconcile(&mut db, &mut AlbumCache::new(), &photo("a.jpg"), Some("Family")).unwrap();
        let mut next_run = AlbumCache::new();
        reconcile(&mut db, &mut next_run, &photo("b.jpg"), Some("Family")).unwrap();

        assert_eq!(db.stats().unwrap().albums, 1);
        let cached = next_run.get("Family").map(str::to_string);
        let stored = db.transaction(|tx| tx.find_album("Family")).unwrap();
        assert_eq!(cached, stored);
    }
}
