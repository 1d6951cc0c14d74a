pub const SCHEMA: &str = r#"
-- One row per photo, keyed by a generated id; the file name is the
-- photo's identity across runs.
CREATE TABLE IF NOT EXISTS image (
    pkid TEXT PRIMARY KEY,
    keywords TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL UNIQUE,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    orientation TEXT NOT NULL,
    imgtype TEXT NOT NULL,
    size INTEGER NOT NULL,
    created TEXT NOT NULL
);

-- Albums are named after the subdirectory a photo was imported from
CREATE TABLE IF NOT EXISTS album (
    pkid TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS album_image (
    album_id TEXT NOT NULL,
    image_id TEXT NOT NULL,
    PRIMARY KEY (album_id, image_id),
    FOREIGN KEY (album_id) REFERENCES album(pkid) ON DELETE CASCADE,
    FOREIGN KEY (image_id) REFERENCES image(pkid) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_album_image_image ON album_image(image_id);
"#;
