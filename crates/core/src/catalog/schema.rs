use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};

/// Nullable flag column holding the classification: NULL unknown, 1 grayscale, 0 color.
pub const CLASSIFICATION_COLUMN: &str = "_dz_bw";

/// Tables the pipeline reads or writes. They belong to the photo library.
pub const REQUIRED_TABLES: [&str; 4] = ["photos", "tags", "size_variants", "photos_tags"];

/// Create the library tables in a fresh SQLite database.
/// Real libraries already have these; this serves new libraries and fixtures.
pub fn create_library_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS photos (
            id          TEXT PRIMARY KEY,
            type        TEXT NOT NULL,
            checksum    TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_photos_created ON photos(created_at);

        CREATE TABLE IF NOT EXISTS tags (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS size_variants (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            photo_id    TEXT NOT NULL REFERENCES photos(id),
            type        INTEGER NOT NULL,
            short_path  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_size_variants_photo ON size_variants(photo_id, type);

        CREATE TABLE IF NOT EXISTS photos_tags (
            photo_id    TEXT NOT NULL REFERENCES photos(id),
            tag_id      INTEGER NOT NULL REFERENCES tags(id),
            PRIMARY KEY (photo_id, tag_id)
        );
        ",
    )?;
    Ok(())
}

/// Verify the library tables exist and add the classification column if missing.
/// Safe to call on every start.
pub fn prepare(conn: &Connection) -> Result<()> {
    for table in REQUIRED_TABLES {
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()?;
        if found.is_none() {
            return Err(Error::Schema(format!("missing table `{table}`")));
        }
    }

    if !has_column(conn, "photos", CLASSIFICATION_COLUMN)? {
        conn.execute(
            &format!("ALTER TABLE photos ADD COLUMN {CLASSIFICATION_COLUMN} INTEGER NULL"),
            [],
        )?;
    }
    Ok(())
}

/// True once the classification column exists. Read-only.
pub fn is_prepared(conn: &Connection) -> Result<bool> {
    has_column(conn, "photos", CLASSIFICATION_COLUMN)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|n| n == column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_adds_column_once() {
        let conn = Connection::open_in_memory().unwrap();
        create_library_tables(&conn).unwrap();
        assert!(!is_prepared(&conn).unwrap());

        prepare(&conn).unwrap();
        assert!(is_prepared(&conn).unwrap());

        // Second run must not try to add the column again
        prepare(&conn).unwrap();
    }

    #[test]
    fn test_prepare_rejects_missing_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let err = prepare(&conn).unwrap_err();
        assert!(matches!(err, Error::Schema(ref m) if m.contains("photos")));
    }
}
