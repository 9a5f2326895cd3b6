//! SQLite schema DDL and migration framework for the model store.

use rusqlite::Connection;

use crate::errors::ClarityResult;

/// Current schema version. Migrations run from whatever the DB currently
/// reports up to this value.
pub const SCHEMA_VERSION: i32 = 2;

/// Core DDL statements: 4 CREATE TABLE.
///
/// Executed with `CREATE … IF NOT EXISTS` so they are safe to replay on an
/// already-initialised database.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS model_chunks (
        byte_offset INTEGER PRIMARY KEY,
        bytes BLOB NOT NULL,
        length INTEGER NOT NULL,
        crc32 INTEGER NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS model_record (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        file_name TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        digest TEXT NOT NULL,
        verification_status TEXT NOT NULL,
        known_name TEXT,
        known_source TEXT,
        imported_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    "CREATE TABLE IF NOT EXISTS migration_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_version INTEGER NOT NULL,
        to_version INTEGER NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
];

// ─── Migration framework ────────────────────────────────────────────────────

/// Run all pending migrations from the current stored version up to
/// [`SCHEMA_VERSION`].  Each step is wrapped in a SAVEPOINT so a failure
/// rolls back only that single step.
pub fn migrate_schema(conn: &Connection) -> ClarityResult<()> {
    let mut current_version = get_schema_version(conn);

    while current_version < SCHEMA_VERSION {
        let next_version = current_version + 1;
        conn.execute_batch("SAVEPOINT clarity_migrate_step;")?;

        let step_result = (|| -> ClarityResult<()> {
            match next_version {
                1 => migrate_to_v1(conn)?,
                2 => migrate_to_v2(conn)?,
                _ => {}
            }
            set_schema_version(conn, next_version)?;
            record_migration_step(conn, current_version, next_version, "success", None)?;
            conn.execute_batch("RELEASE SAVEPOINT clarity_migrate_step;")?;
            Ok(())
        })();

        match step_result {
            Ok(()) => {
                current_version = next_version;
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK TO SAVEPOINT clarity_migrate_step;");
                let _ = conn.execute_batch("RELEASE SAVEPOINT clarity_migrate_step;");
                let _ = record_migration_step(
                    conn,
                    current_version,
                    next_version,
                    "failed",
                    Some(&e.to_string()),
                );
                return Err(e);
            }
        }
    }

    Ok(())
}

/// Read the current schema version from `store_meta`.
/// Returns 0 when the key is absent or unparseable.
pub fn get_schema_version(conn: &Connection) -> i32 {
    let result: Result<String, _> = conn.query_row(
        "SELECT value FROM store_meta WHERE key = 'schema_version';",
        [],
        |row| row.get(0),
    );
    match result {
        Ok(v) => v.parse::<i32>().unwrap_or(0),
        Err(_) => 0,
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> ClarityResult<()> {
    conn.execute(
        "INSERT INTO store_meta(key, value) \
         VALUES('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        rusqlite::params![version.to_string()],
    )?;
    Ok(())
}

fn record_migration_step(
    conn: &Connection,
    from_v: i32,
    to_v: i32,
    status: &str,
    error_msg: Option<&str>,
) -> ClarityResult<()> {
    conn.execute(
        "INSERT INTO migration_history(from_version, to_version, status, error_message) \
         VALUES (?1, ?2, ?3, ?4);",
        rusqlite::params![from_v, to_v, status, error_msg],
    )?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> ClarityResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

// ─── Individual migration steps ─────────────────────────────────────────────

/// v0 -> v1: baseline, no-op.
fn migrate_to_v1(_conn: &Connection) -> ClarityResult<()> {
    Ok(())
}

/// v1 -> v2: add `known_source` to databases created before registry
/// sources were recorded.
fn migrate_to_v2(conn: &Connection) -> ClarityResult<()> {
    if !has_column(conn, "model_record", "known_source")? {
        conn.execute_batch("ALTER TABLE model_record ADD COLUMN known_source TEXT;")?;
    }
    Ok(())
}
