//! Persistence for imported model bytes and the current model record.
//!
//! Two logical tables back an import: chunks keyed by byte offset, and a
//! single-row model record. Both are exposed as traits so the importer can be
//! handed an on-disk [`database::Database`] or an in-memory
//! [`memory::MemoryStore`].

pub mod database;
pub mod memory;
pub mod schema;

use crate::errors::{ClarityError, ClarityResult};
use crate::models::{ChunkStats, ModelRecord};

pub use database::Database;
pub use memory::MemoryStore;

/// Byte ranges of one import, keyed by their offset in the source.
pub trait ChunkStore: Send + Sync {
    /// Delete every stored chunk.
    fn clear(&self) -> ClarityResult<()>;

    /// Insert or replace the chunk at `offset`. Empty chunks are rejected.
    fn put(&self, offset: u64, bytes: &[u8]) -> ClarityResult<()>;

    /// All chunk payloads in ascending offset order.
    fn get_all(&self) -> ClarityResult<Vec<Vec<u8>>>;

    /// Stored offsets in ascending order.
    fn offsets(&self) -> ClarityResult<Vec<u64>>;

    fn get(&self, offset: u64) -> ClarityResult<Option<Vec<u8>>>;

    fn stats(&self) -> ClarityResult<ChunkStats>;
}

/// Single-slot storage for the most recently imported model.
pub trait ModelStore: Send + Sync {
    fn load_model(&self) -> ClarityResult<Option<ModelRecord>>;

    /// Replace the current record atomically.
    fn save_model(&self, record: &ModelRecord) -> ClarityResult<()>;

    fn delete_model(&self) -> ClarityResult<()>;
}

pub(crate) fn reject_empty_chunk(offset: u64, bytes: &[u8]) -> ClarityResult<()> {
    if bytes.is_empty() {
        return Err(ClarityError::Storage(format!(
            "refusing to store empty chunk at offset {offset}"
        )));
    }
    Ok(())
}

pub(crate) fn checksum_mismatch(offset: u64) -> ClarityError {
    ClarityError::Storage(format!("chunk at offset {offset} failed checksum verification"))
}
