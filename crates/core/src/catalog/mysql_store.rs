use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder, Params, Value};
use tracing::{debug, info};

use super::{
    candidate_from_row, candidate_query, pending_count_query, schema::CLASSIFICATION_COLUMN,
    schema::REQUIRED_TABLES, LibraryStore, COUNT_BY_FLAG,
};
use crate::config::DatabaseConfig;
use crate::domain::*;
use crate::error::{Error, Result};

type CandidateRow = (
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
);

/// MySQL/MariaDB photo library over a single connection.
pub struct MysqlCatalog {
    conn: Conn,
}

impl MysqlCatalog {
    pub fn connect(db: &DatabaseConfig) -> Result<Self> {
        let password = (!db.password.is_empty()).then(|| db.password.clone());
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(db.host.clone()))
            .tcp_port(db.port)
            .user(Some(db.username.clone()))
            .pass(password)
            .db_name(Some(db.database.clone()));
        let conn = Conn::new(Opts::from(opts)).map_err(|e| {
            Error::Connectivity(format!("{}@{}:{}: {e}", db.username, db.host, db.port))
        })?;
        info!(host = %db.host, database = %db.database, "connected to MySQL library");
        Ok(Self { conn })
    }

    fn count(&mut self, sql: &str, params: impl Into<Params>) -> Result<usize> {
        let n: Option<i64> = self.conn.exec_first(sql, params)?;
        Ok(n.unwrap_or(0) as usize)
    }

    fn has_classification_column(&mut self) -> Result<bool> {
        let found = self.count(
            "SELECT COUNT(*) FROM information_schema.COLUMNS
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = 'photos' AND COLUMN_NAME = ?",
            (CLASSIFICATION_COLUMN,),
        )?;
        Ok(found > 0)
    }

    fn prepare(&mut self) -> Result<()> {
        for table in REQUIRED_TABLES {
            let found = self.count(
                "SELECT COUNT(*) FROM information_schema.TABLES
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
                (table,),
            )?;
            if found == 0 {
                return Err(Error::Schema(format!("missing table `{table}`")));
            }
        }

        let has_column = self.has_classification_column()?;
        if !has_column {
            self.conn.query_drop(format!(
                "ALTER TABLE photos ADD COLUMN {CLASSIFICATION_COLUMN} TINYINT(1) NULL
                 COMMENT 'Black & white detection result'"
            ))?;
            info!("added {CLASSIFICATION_COLUMN} column to photos");
        }
        Ok(())
    }
}

impl LibraryStore for MysqlCatalog {
    fn prepare_schema(&mut self) -> Result<()> {
        self.prepare().map_err(|e| match e {
            Error::Schema(_) => e,
            other => Error::Schema(other.to_string()),
        })
    }

    fn is_prepared(&mut self) -> Result<bool> {
        self.has_classification_column()
    }

    fn find_tag(&mut self, name: &str) -> Result<Option<Tag>> {
        let row: Option<(i64, String, Option<String>)> = self.conn.exec_first(
            "SELECT id, name, description FROM tags WHERE name = ?",
            (name,),
        )?;
        Ok(row.map(|(id, name, description)| Tag {
            id: TagId(id),
            name,
            description: description.unwrap_or_default(),
        }))
    }

    fn create_tag(&mut self, name: &str, description: &str) -> Result<Tag> {
        self.conn.exec_drop(
            "INSERT INTO tags (name, description) VALUES (?, ?)",
            (name, description),
        )?;
        Ok(Tag {
            id: TagId(self.conn.last_insert_id() as i64),
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
        let mut values: Vec<Value> = vec![Value::from(tag_id.0)];
        if let Some(cursor) = after {
            values.push(Value::from(cursor.created_at.as_str()));
            values.push(Value::from(cursor.created_at.as_str()));
            values.push(Value::from(cursor.id.as_str()));
        }
        values.push(Value::from(limit as u64));

        let photos = self.conn.exec_map(
            candidate_query(after.is_some()),
            Params::Positional(values),
            |(id, kind, checksum, created_at, large, original): CandidateRow| {
                candidate_from_row(id, kind, checksum, created_at, large, original)
            },
        )?;
        Ok(photos)
    }

    fn record_classification(&mut self, photo_id: &PhotoId, is_grayscale: bool) -> Result<()> {
        self.conn.exec_drop(
            "UPDATE photos SET _dz_bw = ?, updated_at = NOW() WHERE id = ?",
            (i64::from(is_grayscale), photo_id.as_str()),
        )?;
        // MySQL reports changed rows, not matched rows, so zero needs a second look.
        if self.conn.affected_rows() == 0 {
            let exists: Option<i64> = self
                .conn
                .exec_first("SELECT 1 FROM photos WHERE id = ?", (photo_id.as_str(),))?;
            if exists.is_none() {
                return Err(Error::PhotoNotFound(photo_id.clone()));
            }
            debug!(photo = %photo_id, "classification unchanged");
        }
        Ok(())
    }

    fn apply_tag(&mut self, photo_id: &PhotoId, tag_id: TagId) -> Result<bool> {
        self.conn.exec_drop(
            "INSERT IGNORE INTO photos_tags (tag_id, photo_id) VALUES (?, ?)",
            (tag_id.0, photo_id.as_str()),
        )?;
        Ok(self.conn.affected_rows() > 0)
    }

    fn stats(&mut self, tag_id: Option<TagId>) -> Result<LibraryStats> {
        Ok(LibraryStats {
            grayscale: self.count(COUNT_BY_FLAG, (1i64,))?,
            color: self.count(COUNT_BY_FLAG, (0i64,))?,
            pending: self.count(&pending_count_query(), (tag_id.map(|t| t.0),))?,
        })
    }
}
