//! SQLite storage layer for imported models.
//!
//! Each public method opens its own connection, so a [`Database`] is only a
//! resolved path and can be shared freely across threads.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::config::expand_tilde;
use crate::errors::{ClarityError, ClarityResult};
use crate::models::{ChunkStats, ModelRecord, VerificationStatus};
use crate::store::schema;
use crate::store::{checksum_mismatch, reject_empty_chunk, ChunkStore, ModelStore};

const BUSY_TIMEOUT_MS: u64 = 5_000;

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// On-disk store holding the chunk table and the model record.
#[derive(Debug, Clone)]
pub struct Database {
    db_path: PathBuf,
}

impl Database {
    /// Resolve `db_path`, create parent directories and initialise the schema.
    pub fn open(db_path: impl AsRef<Path>) -> ClarityResult<Self> {
        let db_str = db_path.as_ref().to_string_lossy();
        let expanded = expand_tilde(&db_str);
        let resolved = if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()?.join(&expanded)
        };
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Self { db_path: resolved };
        db.init_schema()?;
        Ok(db)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> ClarityResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))?;
        Ok(conn)
    }

    /// Set WAL mode, create all tables, then run pending migrations.
    ///
    /// `auto_vacuum` only takes effect on a database without tables, which is
    /// why it is issued before the DDL.
    fn init_schema(&self) -> ClarityResult<()> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA auto_vacuum = INCREMENTAL;")?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        for stmt in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)?;
        }
        schema::migrate_schema(&conn)?;
        debug!(path = %self.db_path.display(), "model database ready");
        Ok(())
    }
}

fn to_sql_int(value: u64, what: &str) -> ClarityResult<i64> {
    i64::try_from(value)
        .map_err(|_| ClarityError::Database(format!("{what} {value} exceeds SQLite integer range")))
}

fn from_sql_int(value: i64, what: &str) -> ClarityResult<u64> {
    u64::try_from(value)
        .map_err(|_| ClarityError::Database(format!("negative {what} {value} in database")))
}

fn verify_chunk(offset: u64, bytes: &[u8], length: i64, crc: i64) -> ClarityResult<()> {
    if bytes.len() as i64 != length || i64::from(crc32fast::hash(bytes)) != crc {
        return Err(checksum_mismatch(offset));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ChunkStore
// ---------------------------------------------------------------------------

impl ChunkStore for Database {
    fn clear(&self) -> ClarityResult<()> {
        let conn = self.connect()?;
        let removed = conn.execute("DELETE FROM model_chunks;", [])?;
        // incremental_vacuum frees one page per step; drain it to empty the freelist.
        {
            let mut stmt = conn.prepare("PRAGMA incremental_vacuum;")?;
            let mut rows = stmt.query([])?;
            while rows.next()?.is_some() {}
        }
        // Truncation only reaches the main file once the WAL is checkpointed.
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE);", [], |_| Ok(()))?;
        debug!(removed, "cleared chunk table");
        Ok(())
    }

    fn put(&self, offset: u64, bytes: &[u8]) -> ClarityResult<()> {
        reject_empty_chunk(offset, bytes)?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO model_chunks(byte_offset, bytes, length, crc32) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(byte_offset) DO UPDATE SET \
                bytes = excluded.bytes, \
                length = excluded.length, \
                crc32 = excluded.crc32;",
            params![
                to_sql_int(offset, "offset")?,
                bytes,
                bytes.len() as i64,
                i64::from(crc32fast::hash(bytes)),
            ],
        )?;
        Ok(())
    }

    fn get_all(&self) -> ClarityResult<Vec<Vec<u8>>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT byte_offset, bytes, length, crc32 FROM model_chunks ORDER BY byte_offset ASC;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut chunks = Vec::new();
        for row in rows {
            let (offset, bytes, length, crc) = row?;
            verify_chunk(from_sql_int(offset, "offset")?, &bytes, length, crc)?;
            chunks.push(bytes);
        }
        Ok(chunks)
    }

    fn offsets(&self) -> ClarityResult<Vec<u64>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT byte_offset FROM model_chunks ORDER BY byte_offset ASC;")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let mut offsets = Vec::new();
        for row in rows {
            offsets.push(from_sql_int(row?, "offset")?);
        }
        Ok(offsets)
    }

    fn get(&self, offset: u64) -> ClarityResult<Option<Vec<u8>>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT bytes, length, crc32 FROM model_chunks WHERE byte_offset = ?1;",
                params![to_sql_int(offset, "offset")?],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((bytes, length, crc)) => {
                verify_chunk(offset, &bytes, length, crc)?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    fn stats(&self) -> ClarityResult<ChunkStats> {
        let conn = self.connect()?;
        let (count, total): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(length), 0) FROM model_chunks;",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(ChunkStats {
            chunk_count: from_sql_int(count, "chunk count")?,
            total_bytes: from_sql_int(total, "byte total")?,
        })
    }
}

// ---------------------------------------------------------------------------
// ModelStore
// ---------------------------------------------------------------------------

impl ModelStore for Database {
    fn load_model(&self) -> ClarityResult<Option<ModelRecord>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT file_name, file_size, digest, verification_status, \
                        known_name, known_source, imported_at \
                 FROM model_record WHERE id = 1;",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((file_name, file_size, digest, status, known_name, known_source, imported_at)) =
            row
        else {
            return Ok(None);
        };

        Ok(Some(ModelRecord {
            file_name,
            file_size: from_sql_int(file_size, "file size")?,
            digest,
            verification_status: status.parse::<VerificationStatus>()?,
            known_name,
            known_source,
            imported_at,
        }))
    }

    fn save_model(&self, record: &ModelRecord) -> ClarityResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO model_record(id, file_name, file_size, digest, verification_status, \
                                      known_name, known_source, imported_at) \
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, CURRENT_TIMESTAMP) \
             ON CONFLICT(id) DO UPDATE SET \
                file_name = excluded.file_name, \
                file_size = excluded.file_size, \
                digest = excluded.digest, \
                verification_status = excluded.verification_status, \
                known_name = excluded.known_name, \
                known_source = excluded.known_source, \
                imported_at = excluded.imported_at;",
            params![
                record.file_name,
                to_sql_int(record.file_size, "file size")?,
                record.digest,
                record.verification_status.as_str(),
                record.known_name,
                record.known_source,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_model(&self) -> ClarityResult<()> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM model_record;", [])?;
        Ok(())
    }
}
