mod schema;
pub mod albums;
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "postgres")]
pub mod postgres_schema;

use anyhow::Result;

pub use albums::AlbumCache;
pub use schema::SCHEMA;

use crate::config::DatabaseConfig;
#[cfg(feature = "postgres")]
use crate::config::DatabaseType;
use crate::scanner::PhotoMetadata;

/// One row of the `image` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: String,
    pub name: String,
    /// Space-joined keyword list.
    pub keywords: String,
    pub width: i64,
    pub height: i64,
    /// `S`, `H` or `V`.
    pub orientation: String,
    pub imgtype: String,
    pub size: i64,
    /// `YYYY-MM-DD HH:MM:SS`.
    pub created: String,
}

impl ImageRecord {
    pub fn from_photo(id: String, photo: &PhotoMetadata) -> Self {
        Self {
            id,
            name: photo.name.clone(),
            keywords: photo.keywords_text(),
            width: photo.width as i64,
            height: photo.height as i64,
            orientation: photo.orientation.as_code().to_string(),
            imgtype: photo.file_type.clone(),
            size: photo.size_bytes as i64,
            created: photo.created_text(),
        }
    }

    /// Whether every mutable attribute matches `other` (id and name aside).
    pub fn same_attributes(&self, other: &ImageRecord) -> bool {
        self.keywords == other.keywords
            && self.width == other.width
            && self.height == other.height
            && self.imgtype == other.imgtype
            && self.orientation == other.orientation
            && self.created == other.created
            && self.size == other.size
    }
}

/// Row counts across the catalog tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub images: i64,
    pub albums: i64,
    pub memberships: i64,
}

/// Statements available inside one catalog transaction.
pub trait CatalogTx {
    fn find_image(&mut self, name: &str) -> Result<Option<ImageRecord>>;

    fn insert_image(&mut self, record: &ImageRecord) -> Result<()>;

    /// Overwrite every mutable column of the row with `record.id`.
    fn update_image(&mut self, record: &ImageRecord) -> Result<()>;

    fn find_album(&mut self, name: &str) -> Result<Option<String>>;

    fn insert_album(&mut self, id: &str, name: &str) -> Result<()>;

    /// Link an image to an album. An existing link is left alone and
    /// reported as `false`.
    fn add_album_image(&mut self, album_id: &str, image_id: &str) -> Result<bool>;
}

/// Macro to dispatch a method call to the active backend variant.
macro_rules! dispatch {
    ($self:expr, $method:ident()) => {
        match &$self.inner {
            DatabaseInner::Sqlite(db) => db.$method(),
            #[cfg(feature = "postgres")]
            DatabaseInner::Postgres(db) => db.$method(),
        }
    };
}

enum DatabaseInner {
    Sqlite(sqlite::SqliteDb),
    #[cfg(feature = "postgres")]
    Postgres(postgres::PgDb),
}

pub struct Database {
    inner: DatabaseInner,
}

impl Database {
    /// Open a catalog connection based on the provided configuration.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        #[cfg(feature = "postgres")]
        {
            if config.backend == DatabaseType::Postgresql {
                let pg = postgres::PgDb::open(config)?;
                return Ok(Self { inner: DatabaseInner::Postgres(pg) });
            }
        }

        let db = sqlite::SqliteDb::open(&config.sqlite_path)?;
        Ok(Self { inner: DatabaseInner::Sqlite(db) })
    }

    /// Create the catalog tables if they don't exist yet.
    pub fn initialize(&self) -> Result<()> {
        dispatch!(self, initialize())
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        dispatch!(self, stats())
    }

    /// Run `f` in one transaction and commit it. If `f` fails the
    /// transaction is rolled back and the error returned.
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut dyn CatalogTx) -> Result<T>,
    ) -> Result<T> {
        match &mut self.inner {
            DatabaseInner::Sqlite(db) => db.transaction(f),
            #[cfg(feature = "postgres")]
            DatabaseInner::Postgres(db) => db.transaction(f),
        }
    }
}
