//! PostgreSQL backend implementation.

use anyhow::Result;
use postgres::NoTls;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;

use super::postgres_schema::POSTGRES_SCHEMA;
use super::{CatalogStats, CatalogTx, ImageRecord};
use crate::config::DatabaseConfig;
use crate::credentials::Credentials;

pub struct PgDb {
    pool: Pool<PostgresConnectionManager<NoTls>>,
}

impl PgDb {
    /// Connect using the host and database name from `config` and the
    /// `DB_USERNAME` / `DB_PWD` pair from its credentials file.
    ///
    /// The pool holds a single connection which r2d2 re-establishes if it is
    /// found closed.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let creds = Credentials::load_pairs(&config.credentials_file)?;

        let mut pg_config = postgres::Config::new();
        pg_config
            .host(&config.host)
            .dbname(&config.name)
            .user(creds.require("DB_USERNAME")?)
            .password(creds.require("DB_PWD")?);

        let manager = PostgresConnectionManager::new(pg_config, NoTls);
        let pool = Pool::builder().max_size(1).build(manager)?;
        Ok(Self { pool })
    }

    pub fn initialize(&self) -> Result<()> {
        let mut client = self.pool.get()?;
        client.batch_execute(POSTGRES_SCHEMA)?;
        Ok(())
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        let mut client = self.pool.get()?;
        let row = client.query_one(
            r#"
            SELECT (SELECT COUNT(*) FROM image),
                   (SELECT COUNT(*) FROM album),
                   (SELECT COUNT(*) FROM album_image)
            "#,
            &[],
        )?;
        Ok(CatalogStats {
            images: row.get(0),
            albums: row.get(1),
            memberships: row.get(2),
        })
    }

    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut dyn CatalogTx) -> Result<T>,
    ) -> Result<T> {
        let mut client = self.pool.get()?;
        let mut tx = client.transaction()?;
        let out = f(&mut PgTx { tx: &mut tx })?;
        tx.commit()?;
        Ok(out)
    }
}

struct PgTx<'a, 'b> {
    tx: &'a mut postgres::Transaction<'b>,
}

impl CatalogTx for PgTx<'_, '_> {
    fn find_image(&mut self, name: &str) -> Result<Option<ImageRecord>> {
        let row = self.tx.query_opt(
            r#"
            SELECT pkid, name, keywords, width, height, orientation, imgtype, size, created
            FROM image
            WHERE name = $1
            "#,
            &[&name],
        )?;
        Ok(row.map(|row| ImageRecord {
            id: row.get(0),
            name: row.get(1),
            keywords: row.get(2),
            width: row.get(3),
            height: row.get(4),
            orientation: row.get(5),
            imgtype: row.get(6),
            size: row.get(7),
            created: row.get(8),
        }))
    }

    fn insert_image(&mut self, record: &ImageRecord) -> Result<()> {
        self.tx.execute(
            r#"
            INSERT INTO image (pkid, keywords, name, width, height, orientation, imgtype, size, created)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
            &[
                &record.id,
                &record.keywords,
                &record.name,
                &record.width,
                &record.height,
                &record.orientation,
                &record.imgtype,
                &record.size,
                &record.created,
            ],
        )?;
        Ok(())
    }

    fn update_image(&mut self, record: &ImageRecord) -> Result<()> {
        self.tx.execute(
            r#"
            UPDATE image SET
                keywords = $1, width = $2, height = $3, imgtype = $4, orientation = $5,
                size = $6, created = $7
            WHERE pkid = $8
            "#,
            &[
                &record.keywords,
                &record.width,
                &record.height,
                &record.imgtype,
                &record.orientation,
                &record.size,
                &record.created,
                &record.id,
            ],
        )?;
        Ok(())
    }

    fn find_album(&mut self, name: &str) -> Result<Option<String>> {
        let row = self
            .tx
            .query_opt("SELECT pkid FROM album WHERE name = $1", &[&name])?;
        Ok(row.map(|row| row.get(0)))
    }

    fn insert_album(&mut self, id: &str, name: &str) -> Result<()> {
        self.tx.execute(
            "INSERT INTO album (pkid, name) VALUES ($1, $2)",
            &[&id, &name],
        )?;
        Ok(())
    }

    fn add_album_image(&mut self, album_id: &str, image_id: &str) -> Result<bool> {
        let inserted = self.tx.execute(
            "INSERT INTO album_image (album_id, image_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            &[&album_id, &image_id],
        )?;
        Ok(inserted > 0)
    }
}
