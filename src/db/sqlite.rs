//! SQLite backend implementation.

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use super::schema::SCHEMA;
use super::{CatalogStats, CatalogTx, ImageRecord};

pub struct SqliteDb {
    pub(crate) conn: Connection,
}

impl SqliteDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        let count = |table: &str| -> Result<i64> {
            let n = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n)
        };
        Ok(CatalogStats {
            images: count("image")?,
            albums: count("album")?,
            memberships: count("album_image")?,
        })
    }

    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut dyn CatalogTx) -> Result<T>,
    ) -> Result<T> {
        let tx = self.conn.transaction()?;
        let out = f(&mut SqliteTx { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }
}

struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl CatalogTx for SqliteTx<'_> {
    fn find_image(&mut self, name: &str) -> Result<Option<ImageRecord>> {
        let record = self
            .conn
            .query_row(
                r#"
                SELECT pkid, name, keywords, width, height, orientation, imgtype, size, created
                FROM image
                WHERE name = ?
                "#,
                [name],
                |row| {
                    Ok(ImageRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        keywords: row.get(2)?,
                        width: row.get(3)?,
                        height: row.get(4)?,
                        orientation: row.get(5)?,
                        imgtype: row.get(6)?,
                        size: row.get(7)?,
                        created: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn insert_image(&mut self, record: &ImageRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO image (pkid, keywords, name, width, height, orientation, imgtype, size, created)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            rusqlite::params![
                record.id,
                record.keywords,
                record.name,
                record.width,
                record.height,
                record.orientation,
                record.imgtype,
                record.size,
                record.created,
            ],
        )?;
        Ok(())
    }

    fn update_image(&mut self, record: &ImageRecord) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE image SET
                keywords = ?, width = ?, height = ?, imgtype = ?, orientation = ?,
                size = ?, created = ?
            WHERE pkid = ?
            "#,
            rusqlite::params![
                record.keywords,
                record.width,
                record.height,
                record.imgtype,
                record.orientation,
                record.size,
                record.created,
                record.id,
            ],
        )?;
        Ok(())
    }

    fn find_album(&mut self, name: &str) -> Result<Option<String>> {
        let id = self
            .conn
            .query_row("SELECT pkid FROM album WHERE name = ?", [name], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    fn insert_album(&mut self, id: &str, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO album (pkid, name) VALUES (?, ?)",
            rusqlite::params![id, name],
        )?;
        Ok(())
    }

    fn add_album_image(&mut self, album_id: &str, image_id: &str) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO album_image (album_id, image_id) VALUES (?, ?)",
            rusqlite::params![album_id, image_id],
        )?;
        Ok(inserted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: &str, name: &str) -> ImageRecord {
        ImageRecord {
            id: id.to_string(),
            name: name.to_string(),
            keywords: "beach sunset".to_string(),
            width: 4000,
            height: 3000,
            orientation: "H".to_string(),
            imgtype: "JPEG".to_string(),
            size: 123_456,
            created: "2023-07-01 10:00:00".to_string(),
        }
    }

    fn open_db(dir: &Path) -> SqliteDb {
        let db = SqliteDb::open(&dir.join("catalog").join("photoframe.db")).unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn test_insert_find_update() {
        let dir = tempdir().unwrap();
        let mut db = open_db(dir.path());

        db.transaction(|tx| tx.insert_image(&record("id-1", "a.jpg"))).unwrap();

        let found = db.transaction(|tx| tx.find_image("a.jpg")).unwrap().unwrap();
        assert_eq!(found, record("id-1", "a.jpg"));
        assert!(db.transaction(|tx| tx.find_image("missing.jpg")).unwrap().is_none());

        let mut changed = found.clone();
        changed.keywords = "beach".to_string();
        changed.size = 99;
        db.transaction(|tx| tx.update_image(&changed)).unwrap();

        let reread = db.transaction(|tx| tx.find_image("a.jpg")).unwrap().unwrap();
        assert_eq!(reread, changed);
    }

    #[test]
    fn test_duplicate_membership_is_ignored() {
        let dir = tempdir().unwrap();
        let mut db = open_db(dir.path());

        db.transaction(|tx| {
            tx.insert_image(&record("img", "a.jpg"))?;
            tx.insert_album("alb", "Vacation")
        })
        .unwrap();

        assert!(db.transaction(|tx| tx.add_album_image("alb", "img")).unwrap());
        assert!(!db.transaction(|tx| tx.add_album_image("alb", "img")).unwrap());
        assert_eq!(
            db.transaction(|tx| tx.find_album("Vacation")).unwrap(),
            Some("alb".to_string())
        );

        let stats = db.stats().unwrap();
        assert_eq!(stats, CatalogStats { images: 1, albums: 1, memberships: 1 });
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let dir = tempdir().unwrap();
        let mut db = open_db(dir.path());

        let result = db.transaction(|tx| {
            tx.insert_image(&record("id-1", "a.jpg"))?;
            tx.insert_image(&record("id-2", "a.jpg"))
        });
        assert!(result.is_err());
        assert_eq!(db.stats().unwrap().images, 0);
    }
}
