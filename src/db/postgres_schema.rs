pub const POSTGRES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS image (
    pkid VARCHAR(36) PRIMARY KEY,
    keywords TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL UNIQUE,
    width BIGINT NOT NULL,
    height BIGINT NOT NULL,
    orientation VARCHAR(1) NOT NULL,
    imgtype TEXT NOT NULL,
    size BIGINT NOT NULL,
    created TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS album (
    pkid VARCHAR(36) PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS album_image (
    album_id VARCHAR(36) NOT NULL REFERENCES album(pkid) ON DELETE CASCADE,
    image_id VARCHAR(36) NOT NULL REFERENCES image(pkid) ON DELETE CASCADE,
    PRIMARY KEY (album_id, image_id)
);

CREATE INDEX IF NOT EXISTS idx_album_image_image ON album_image(image_id);
"#;
