//! In-memory store used by tests and embedders that do not need durability.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::errors::ClarityResult;
use crate::models::{ChunkStats, ModelRecord};
use crate::store::{reject_empty_chunk, ChunkStore, ModelStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    chunks: Mutex<BTreeMap<u64, Vec<u8>>>,
    model: Mutex<Option<ModelRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChunkStore for MemoryStore {
    fn clear(&self) -> ClarityResult<()> {
        self.chunks.lock().clear();
        Ok(())
    }

    fn put(&self, offset: u64, bytes: &[u8]) -> ClarityResult<()> {
        reject_empty_chunk(offset, bytes)?;
        self.chunks.lock().insert(offset, bytes.to_vec());
        Ok(())
    }

    fn get_all(&self) -> ClarityResult<Vec<Vec<u8>>> {
        Ok(self.chunks.lock().values().cloned().collect())
    }

    fn offsets(&self) -> ClarityResult<Vec<u64>> {
        Ok(self.chunks.lock().keys().copied().collect())
    }

    fn get(&self, offset: u64) -> ClarityResult<Option<Vec<u8>>> {
        Ok(self.chunks.lock().get(&offset).cloned())
    }

    fn stats(&self) -> ClarityResult<ChunkStats> {
        let chunks = self.chunks.lock();
        Ok(ChunkStats {
            chunk_count: chunks.len() as u64,
            total_bytes: chunks.values().map(|c| c.len() as u64).sum(),
        })
    }
}

impl ModelStore for MemoryStore {
    fn load_model(&self) -> ClarityResult<Option<ModelRecord>> {
        Ok(self.model.lock().clone())
    }

    fn save_model(&self, record: &ModelRecord) -> ClarityResult<()> {
        *self.model.lock() = Some(record.clone());
        Ok(())
    }

    fn delete_model(&self) -> ClarityResult<()> {
        self.model.lock().take();
        Ok(())
    }
}
