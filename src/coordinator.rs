//! One import run: lock, change check, tree walk, ledger rewrite.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::catalog::{reconcile, ReconcileOutcome};
use crate::config::Config;
use crate::db::{AlbumCache, Database};
use crate::lock::RunLock;
use crate::remote::{ObjectStore, ThumbnailSink};
use crate::scanner::{extract_metadata, has_image_extension, list_directory, ChangeDetector};
use crate::transfer::{TransferEngine, TransferSettings};

/// Connections a run needs once it knows there is work to do.
pub struct Session {
    pub db: Database,
    pub store: Box<dyn ObjectStore>,
    pub thumbs: Box<dyn ThumbnailSink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub directories: usize,
    pub photos: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub uploaded: usize,
    pub thumbnails: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run holds the lock; nothing was touched.
    Locked,
    /// The photo root matches the ledger.
    Unchanged,
    Synced(RunReport),
}

/// State owned by a single run and dropped with it.
struct RunContext<'a> {
    session: Session,
    albums: AlbumCache,
    detector: ChangeDetector,
    settings: TransferSettings,
    extensions: &'a [String],
    report: RunReport,
}

pub struct Coordinator {
    config: Config,
}

impl Coordinator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Perform one import run. `connect` is only called once the root is
    /// known to have changed.
    ///
    /// The ledger is rewritten only after the whole tree has been
    /// processed, so any error leaves it as it was.
    pub fn run(&self, connect: impl FnOnce() -> Result<Session>) -> Result<RunOutcome> {
        let Some(_lock) = RunLock::try_acquire(&self.config.lock_path)? else {
            info!("locked");
            return Ok(RunOutcome::Locked);
        };

        let root = self.config.photo_dir.as_path();
        let mut detector = ChangeDetector::new(root, &self.config.ledger_path)
            .with_force(self.config.force_resync);
        if !detector.has_changed(root)? {
            info!("No changes under {}", root.display());
            return Ok(RunOutcome::Unchanged);
        }

        let session = connect().context("Failed to connect to remote services")?;
        session.db.initialize()?;

        let mut ctx = RunContext {
            session,
            albums: AlbumCache::new(),
            detector,
            settings: TransferSettings::from_config(&self.config),
            extensions: &self.config.scanner.image_extensions,
            report: RunReport::default(),
        };
        ctx.import_tree(root, None)?;
        ctx.detector.persist()?;

        Ok(RunOutcome::Synced(ctx.report))
    }
}

impl RunContext<'_> {
    /// Changed subdirectories first, then the photos directly inside `dir`.
    fn import_tree(&mut self, dir: &Path, album: Option<&str>) -> Result<()> {
        info!("Processing directory {}", dir.display());
        self.report.directories += 1;
        let listing = list_directory(dir)?;

        for subdir in &listing.subdirs {
            if !self.detector.has_changed(subdir)? {
                debug!("Unchanged, skipping {}", subdir.display());
                continue;
            }
            let name = subdir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.import_tree(subdir, Some(&name))?;
        }

        for file in &listing.files {
            if !has_image_extension(file, self.extensions) {
                debug!("Not an image, skipping {}", file.display());
                continue;
            }
            self.import_photo(file, album)?;
        }
        Ok(())
    }

    fn import_photo(&mut self, path: &Path, album: Option<&str>) -> Result<()> {
        info!("Importing {}", path.display());
        let photo = extract_metadata(path)?;

        let reconciled = reconcile(&mut self.session.db, &mut self.albums, &photo, album)?;
        match reconciled.outcome {
            ReconcileOutcome::Inserted => self.report.inserted += 1,
            ReconcileOutcome::Updated => self.report.updated += 1,
            ReconcileOutcome::Unchanged => self.report.unchanged += 1,
        }

        let engine = TransferEngine::new(
            self.session.store.as_ref(),
            self.session.thumbs.as_ref(),
            &self.settings,
        );
        let transferred = engine.transfer(path, &photo)?;
        if transferred.uploaded {
            self.report.uploaded += 1;
        }
        self.report.thumbnails += 1;
        self.report.photos += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseType;
    use crate::remote::testing::{MemoryStore, RecordingSink};
    use crate::scanner::{Ledger, ROOT_KEY};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        root: TempDir,
        state: TempDir,
        store: MemoryStore,
        sink: RecordingSink,
    }

    impl Fixture {
        fn new() -> Self {
            let fixture = Self {
                root: tempdir().unwrap(),
                state: tempdir().unwrap(),
                store: MemoryStore::default(),
                sink: RecordingSink::default(),
            };
            fixture.photo("Vacation2023/beach.png", 24, 16);
            fixture.photo("Vacation2023/pier.png", 16, 24);
            fixture.photo("Family/dinner.png", 20, 20);
            fs::write(fixture.root.path().join("Family/notes.txt"), b"not a photo").unwrap();
            fs::create_dir(fixture.root.path().join(".thumbnails")).unwrap();
            fixture
        }

        fn photo(&self, relative: &str, width: u32, height: u32) -> PathBuf {
            let path = self.root.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            image::RgbImage::from_pixel(width, height, image::Rgb([10, 90, 180]))
                .save(&path)
                .unwrap();
            path
        }

        fn config(&self) -> Config {
            let mut config = Config::default();
            config.photo_dir = self.root.path().to_path_buf();
            config.ledger_path = self.state.path().join("state.hash");
            config.lock_path = self.state.path().join(".upload.lock");
            config.database.backend = DatabaseType::Sqlite;
            config.database.sqlite_path = self.state.path().join("photoframe.db");
            config.transfer.canonical_size = 16;
            config.transfer.thumbnail_size = 8;
            config
        }

        fn run(&self, config: Config) -> RunOutcome {
            let store = self.store.clone();
            let sink = self.sink.clone();
            let db_config = config.database.clone();
            Coordinator::new(config)
                .run(move || {
                    Ok(Session {
                        db: Database::open(&db_config)?,
                        store: Box::new(store),
                        thumbs: Box::new(sink),
                    })
                })
                .unwrap()
        }

        fn ledger(&self) -> Ledger {
            Ledger::load(&self.state.path().join("state.hash")).unwrap()
        }

        fn catalog(&self) -> Database {
            Database::open(&self.config().database).unwrap()
        }
    }

    fn synced(outcome: RunOutcome) -> RunReport {
        match outcome {
            RunOutcome::Synced(report) => report,
            other => panic!("expected a sync, got {:?}", other),
        }
    }

    #[test]
    fn test_first_run_imports_everything() {
        let fx = Fixture::new();
        let report = synced(fx.run(fx.config()));

        assert_eq!(report.photos, 3);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.uploaded, 3);
        assert_eq!(report.thumbnails, 3);
        assert_eq!(
            fx.store.keys(),
            vec![
                "photoviewer/beach.png".to_string(),
                "photoviewer/dinner.png".to_string(),
                "photoviewer/pier.png".to_string(),
            ]
        );

        let stats = fx.catalog().stats().unwrap();
        assert_eq!((stats.images, stats.albums, stats.memberships), (3, 2, 3));

        let ledger = fx.ledger();
        assert_eq!(ledger.len(), 3);
        assert!(ledger.get(ROOT_KEY).is_some());
        assert!(ledger.get("Vacation2023").is_some());
        assert!(ledger.get("Family").is_some());
        assert!(ledger.get(".thumbnails").is_none());
    }

    #[test]
    fn test_second_run_without_changes_does_nothing() {
        let fx = Fixture::new();
        synced(fx.run(fx.config()));
        let puts = fx.store.put_count();
        let posts = fx.sink.names().len();

        let outcome = Coordinator::new(fx.config())
            .run(|| panic!("no connection expected for an unchanged tree"))
            .unwrap();
        assert_eq!(outcome, RunOutcome::Unchanged);
        assert_eq!(fx.store.put_count(), puts);
        assert_eq!(fx.sink.names().len(), posts);
    }

    #[test]
    fn test_only_changed_subdirectory_is_imported() {
        let fx = Fixture::new();
        synced(fx.run(fx.config()));
        let before = fx.ledger();

        fx.photo("Vacation2023/sunset.png", 30, 18);
        let report = synced(fx.run(fx.config()));

        assert_eq!(report.photos, 3);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.unchanged, 2);
        let dinner_puts = fx
            .store
            .puts
            .borrow()
            .iter()
            .filter(|key| key.ends_with("dinner.png"))
            .count();
        assert_eq!(dinner_puts, 1);

        let after = fx.ledger();
        assert_ne!(after.get(ROOT_KEY), before.get(ROOT_KEY));
        assert_ne!(after.get("Vacation2023"), before.get("Vacation2023"));
        assert_eq!(after.get("Family"), before.get("Family"));
        assert_eq!(after.len(), 3);
    }

    #[test]
    fn test_held_lock_exits_without_side_effects() {
        let fx = Fixture::new();
        let config = fx.config();
        let _held = RunLock::try_acquire(&config.lock_path).unwrap().unwrap();

        let outcome = Coordinator::new(config)
            .run(|| panic!("a locked run must not connect"))
            .unwrap();
        assert_eq!(outcome, RunOutcome::Locked);
        assert!(!fx.state.path().join("state.hash").exists());
        assert_eq!(fx.store.put_count(), 0);
    }

    #[test]
    fn test_force_resync_reimports_unchanged_tree() {
        let fx = Fixture::new();
        synced(fx.run(fx.config()));

        let mut config = fx.config();
        config.force_resync = true;
        let report = synced(fx.run(config));

        assert_eq!(report.photos, 3);
        assert_eq!(report.unchanged, 3);
        assert_eq!(report.uploaded, 3);
        assert_eq!(fx.store.put_count(), 6);
    }

    #[test]
    fn test_failed_run_keeps_previous_ledger() {
        let fx = Fixture::new();
        synced(fx.run(fx.config()));
        let ledger_path = fx.state.path().join("state.hash");
        let before = fs::read(&ledger_path).unwrap();

        fs::write(fx.root.path().join("Family/broken.png"), b"not really a png").unwrap();
        let result = Coordinator::new(fx.config()).run(|| {
            Ok(Session {
                db: Database::open(&fx.config().database)?,
                store: Box::new(fx.store.clone()),
                thumbs: Box::new(fx.sink.clone()),
            })
        });
        assert!(result.is_err());
        assert_eq!(fs::read(&ledger_path).unwrap(), before);
    }

    #[test]
    fn test_nested_directories_import_innermost_first() {
        let fx = Fixture::new();
        fx.photo("Vacation2023/Day1/harbour.png", 18, 12);
        synced(fx.run(fx.config()));

        let names = fx.sink.names();
        let position = |name: &str| names.iter().position(|n| n == name).unwrap();
        assert!(position("harbour.png") < position("beach.png"));
        assert!(position("harbour.png") < position("pier.png"));

        let conn = rusqlite::Connection::open(fx.state.path().join("photoframe.db")).unwrap();
        let album: String = conn
            .query_row(
                r#"
                SELECT album.name FROM album_image
                JOIN album ON album.pkid = album_image.album_id
                JOIN image ON image.pkid = album_image.image_id
                WHERE image.name = 'harbour.png'
                "#,
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(album, "Day1");

        let ledger = fx.ledger();
        assert_eq!(ledger.len(), 3);
        assert!(ledger.get("Day1").is_none());

        // Day1 has no ledger entry, so it is walked whenever its parent is.
        fx.photo("Vacation2023/sunset.png", 30, 18);
        let report = synced(fx.run(fx.config()));
        assert_eq!(report.photos, 4);
        let harbour_posts = fx.sink.names().iter().filter(|n| *n == "harbour.png").count();
        assert_eq!(harbour_posts, 2);
    }
}
