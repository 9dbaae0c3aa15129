pub mod mysql_store;
pub mod schema;

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::domain::*;
use crate::error::{Error, Result};

pub use mysql_store::MysqlCatalog;

/// The photo library as the pipeline sees it: eligibility reads plus
/// classification and tag writes. The library owns every row.
pub trait LibraryStore {
    /// Make sure the classification column exists. Idempotent.
    fn prepare_schema(&mut self) -> Result<()>;

    /// Whether the classification column exists. Never alters the library.
    fn is_prepared(&mut self) -> Result<bool>;

    fn find_tag(&mut self, name: &str) -> Result<Option<Tag>>;

    fn create_tag(&mut self, name: &str, description: &str) -> Result<Tag>;

    /// Unclassified, untagged, non-video, non-raw photos in `(created_at, id)` order.
    /// With `after`, only photos sorting strictly after that cursor are returned.
    fn fetch_candidates(
        &mut self,
        tag_id: TagId,
        limit: usize,
        after: Option<&PageCursor>,
    ) -> Result<Vec<Photo>>;

    /// Overwrite the classification flag and bump the update timestamp.
    fn record_classification(&mut self, photo_id: &PhotoId, is_grayscale: bool) -> Result<()>;

    /// Associate the tag with the photo. Returns false when the association already existed.
    fn apply_tag(&mut self, photo_id: &PhotoId, tag_id: TagId) -> Result<bool>;

    /// Counts per classification. Without a tag id every untagged photo counts as pending.
    fn stats(&mut self, tag_id: Option<TagId>) -> Result<LibraryStats>;
}

impl<S: LibraryStore + ?Sized> LibraryStore for Box<S> {
    fn prepare_schema(&mut self) -> Result<()> {
        (**self).prepare_schema()
    }

    fn is_prepared(&mut self) -> Result<bool> {
        (**self).is_prepared()
    }

    fn find_tag(&mut self, name: &str) -> Result<Option<Tag>> {
        (**self).find_tag(name)
    }

    fn create_tag(&mut self, name: &str, description: &str) -> Result<Tag> {
        (**self).create_tag(name, description)
    }

    fn fetch_candidates(
        &mut self,
        tag_id: TagId,
        limit: usize,
        after: Option<&PageCursor>,
    ) -> Result<Vec<Photo>> {
        (**self).fetch_candidates(tag_id, limit, after)
    }

    fn record_classification(&mut self, photo_id: &PhotoId, is_grayscale: bool) -> Result<()> {
        (**self).record_classification(photo_id, is_grayscale)
    }

    fn apply_tag(&mut self, photo_id: &PhotoId, tag_id: TagId) -> Result<bool> {
        (**self).apply_tag(photo_id, tag_id)
    }

    fn stats(&mut self, tag_id: Option<TagId>) -> Result<LibraryStats> {
        (**self).stats(tag_id)
    }
}

/// Look up the Black & White tag, creating it when absent. Called once per run;
/// the returned id is threaded through the pass instead of held globally.
pub fn find_or_create_bw_tag<S: LibraryStore + ?Sized>(store: &mut S) -> Result<Tag> {
    if let Some(tag) = store.find_tag(BW_TAG_NAME)? {
        info!(tag_id = %tag.id, "found existing {BW_TAG_NAME} tag");
        return Ok(tag);
    }
    let tag = store.create_tag(BW_TAG_NAME, BW_TAG_DESCRIPTION)?;
    info!(tag_id = %tag.id, "created {BW_TAG_NAME} tag");
    Ok(tag)
}

// ── Shared SQL ──────────────────────────────────────────────────────
// Plain `?` placeholders work for both SQLite and MySQL.

/// Eligibility filter. Binds one parameter: the Black & White tag id.
/// A NULL tag id matches no association, leaving every untagged photo eligible.
const CANDIDATE_FILTER: &str = "
    FROM photos p
    LEFT JOIN photos_tags pt ON p.id = pt.photo_id AND pt.tag_id = ?
    WHERE pt.photo_id IS NULL
      AND p._dz_bw IS NULL
      AND LOWER(p.type) NOT LIKE '%video%'
      AND LOWER(p.type) NOT LIKE '%raw%'";

/// Candidate page query. Binds the tag id, then `created_at, created_at, id`
/// when paging after a cursor, then the limit.
pub(crate) fn candidate_query(after_cursor: bool) -> String {
    let mut sql = format!(
        "SELECT p.id, p.type, p.checksum, CAST(p.created_at AS CHAR),
            (SELECT sv.short_path FROM size_variants sv
              WHERE sv.photo_id = p.id AND sv.type = {large} LIMIT 1),
            (SELECT sv.short_path FROM size_variants sv
              WHERE sv.photo_id = p.id AND sv.type = {original} LIMIT 1)
        {CANDIDATE_FILTER}",
        large = RenditionKind::Large.type_code(),
        original = RenditionKind::Original.type_code(),
    );
    if after_cursor {
        sql.push_str("\n      AND (p.created_at > ? OR (p.created_at = ? AND p.id > ?))");
    }
    sql.push_str("\n    ORDER BY p.created_at ASC, p.id ASC\n    LIMIT ?");
    sql
}

pub(crate) fn pending_count_query() -> String {
    format!("SELECT COUNT(*) {CANDIDATE_FILTER}")
}

pub(crate) const COUNT_BY_FLAG: &str = "SELECT COUNT(*) FROM photos WHERE _dz_bw = ?";

pub(crate) fn candidate_from_row(
    id: String,
    media_kind: String,
    checksum: Option<String>,
    created_at: String,
    large_path: Option<String>,
    original_path: Option<String>,
) -> Photo {
    Photo {
        id: PhotoId(id),
        media_kind,
        checksum,
        created_at,
        large_path,
        original_path,
        classification: Classification::Unknown,
    }
}

// ── SQLite ──────────────────────────────────────────────────────────

/// SQLite-backed photo library.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open an existing SQLite library.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Connectivity(format!(
                "library file does not exist: {}",
                path.display()
            )));
        }
        let conn = Connection::open(path).map_err(|e| Error::Connectivity(e.to_string()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    /// Open an empty in-memory library with the library tables created (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::create_library_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Read back a photo's classification flag.
    pub fn classification(&self, photo_id: &PhotoId) -> Result<Classification> {
        let flag: Option<Option<bool>> = self
            .conn
            .query_row(
                "SELECT _dz_bw FROM photos WHERE id = ?1",
                [photo_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        flag.map(Classification::from_flag)
            .ok_or_else(|| Error::PhotoNotFound(photo_id.clone()))
    }

    /// Number of association rows between a photo and a tag.
    pub fn tag_count(&self, photo_id: &PhotoId, tag_id: TagId) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM photos_tags WHERE photo_id = ?1 AND tag_id = ?2",
            rusqlite::params![photo_id.as_str(), tag_id.0],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl LibraryStore for Catalog {
    fn prepare_schema(&mut self) -> Result<()> {
        schema::prepare(&self.conn).map_err(|e| match e {
            Error::Schema(_) => e,
            other => Error::Schema(other.to_string()),
        })
    }

    fn is_prepared(&mut self) -> Result<bool> {
        schema::is_prepared(&self.conn)
    }

    fn find_tag(&mut self, name: &str) -> Result<Option<Tag>> {
        let tag = self
            .conn
            .query_row(
                "SELECT id, name, description FROM tags WHERE name = ?1",
                [name],
                |row| {
                    Ok(Tag {
                        id: TagId(row.get(0)?),
                        name: row.get(1)?,
                        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    })
                },
            )
            .optional()?;
        Ok(tag)
    }

    fn create_tag(&mut self, name: &str, description: &str) -> Result<Tag> {
        self.conn.execute(
            "INSERT INTO tags (name, description) VALUES (?1, ?2)",
            [name, description],
        )?;
        Ok(Tag {
            id: TagId(self.conn.last_insert_rowid()),
            name: name.to_string(),
            description: description.to_string(),
        })
    }

    fn fetch_candidates(
        &mut self,
        tag_id: TagId,
        limit: usize,
        after: Option<&PageCursor>,
    ) -> Result<Vec<Photo>> {
        let limit = limit as i64;
        let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::with_capacity(5);
        params.push(&tag_id.0);
        if let Some(cursor) = after {
            params.push(&cursor.created_at);
            params.push(&cursor.created_at);
            params.push(&cursor.id.0);
        }
        params.push(&limit);

        let mut stmt = self.conn.prepare(&candidate_query(after.is_some()))?;
        let photos = stmt
            .query_map(params.as_slice(), |row| {
                Ok(candidate_from_row(
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(photos)
    }

    fn record_classification(&mut self, photo_id: &PhotoId, is_grayscale: bool) -> Result<()> {
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let updated = self.conn.execute(
            "UPDATE photos SET _dz_bw = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![is_grayscale, now, photo_id.as_str()],
        )?;
        if updated == 0 {
            return Err(Error::PhotoNotFound(photo_id.clone()));
        }
        Ok(())
    }

    fn apply_tag(&mut self, photo_id: &PhotoId, tag_id: TagId) -> Result<bool> {
        // OR IGNORE covers a concurrent insert; NOT EXISTS covers libraries without a unique key.
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO photos_tags (tag_id, photo_id)
             SELECT ?1, ?2
             WHERE NOT EXISTS (
                SELECT 1 FROM photos_tags WHERE tag_id = ?1 AND photo_id = ?2
             )",
            rusqlite::params![tag_id.0, photo_id.as_str()],
        )?;
        Ok(inserted > 0)
    }

    fn stats(&mut self, tag_id: Option<TagId>) -> Result<LibraryStats> {
        let count_flag = |flag: bool| -> Result<usize> {
            let n: i64 = self.conn.query_row(COUNT_BY_FLAG, [flag], |row| row.get(0))?;
            Ok(n as usize)
        };
        let grayscale = count_flag(true)?;
        let color = count_flag(false)?;
        let pending: i64 =
            self.conn
                .query_row(&pending_count_query(), [tag_id.map(|t| t.0)], |row| row.get(0))?;
        Ok(LibraryStats {
            grayscale,
            color,
            pending: pending as usize,
        })
    }
}
