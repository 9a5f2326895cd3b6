//! Import orchestration: owns the stores, quota guard and registry, and hands
//! out one [`ImportSession`] at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ImportConfig;
use crate::errors::{ClarityError, ClarityResult};
use crate::importer::events::{ImportEvent, ImportOutcome};
use crate::importer::session::{ImportOptions, ImportSession, InFlightGuard, SessionContext};
use crate::importer::source::ByteSource;
use crate::models::{ChunkStats, ModelRecord};
use crate::quota::{DiskQuotaProbe, QuotaGuard, QuotaProbe, QuotaReport};
use crate::registry::VerificationRegistry;
use crate::store::{ChunkStore, Database, ModelStore};

pub struct ModelImporter {
    chunks: Arc<dyn ChunkStore>,
    models: Arc<dyn ModelStore>,
    quota: QuotaGuard,
    registry: Arc<VerificationRegistry>,
    config: ImportConfig,
    in_flight: Arc<AtomicBool>,
}

impl ModelImporter {
    pub fn new(
        chunks: Arc<dyn ChunkStore>,
        models: Arc<dyn ModelStore>,
        probe: Arc<dyn QuotaProbe>,
        registry: Arc<VerificationRegistry>,
        config: ImportConfig,
    ) -> ClarityResult<Self> {
        config.validate()?;
        Ok(Self {
            chunks,
            models,
            quota: QuotaGuard::new(probe, config.quota_margin),
            registry,
            config,
            in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    /// An importer backed by `db` for both tables, with quota measured on the
    /// filesystem that holds the database file.
    pub fn with_database(
        db: Arc<Database>,
        registry: Arc<VerificationRegistry>,
        config: ImportConfig,
    ) -> ClarityResult<Self> {
        let probe = Arc::new(DiskQuotaProbe::new(db.db_path()));
        Self::new(db.clone(), db, probe, registry, config)
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn registry(&self) -> &VerificationRegistry {
        &self.registry
    }

    pub fn is_importing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Start a session. Fails with [`ClarityError::Busy`] while another
    /// session from this importer has not finished or been dropped.
    pub fn begin<S: ByteSource>(
        &self,
        source: S,
        options: ImportOptions,
    ) -> ClarityResult<ImportSession<S>> {
        let guard = InFlightGuard::acquire(&self.in_flight).ok_or(ClarityError::Busy)?;
        let ctx = SessionContext {
            chunks: Arc::clone(&self.chunks),
            models: Arc::clone(&self.models),
            quota: self.quota.clone(),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
        };
        Ok(ImportSession::new(source, options, ctx, guard))
    }

    /// Drive a session to completion, passing every event to `on_event`.
    pub fn run<S, F>(
        &self,
        source: S,
        options: ImportOptions,
        mut on_event: F,
    ) -> ClarityResult<ImportOutcome>
    where
        S: ByteSource,
        F: FnMut(&ImportEvent),
    {
        let mut outcome = None;
        for event in self.begin(source, options)? {
            on_event(&event);
            if let ImportEvent::Finished(result) = event {
                outcome = Some(result);
            }
        }
        outcome.ok_or_else(|| ClarityError::Storage("import session ended without an outcome".into()))
    }

    /// Forget the current model and drop any stored chunks. Best-effort:
    /// failures are logged, never returned.
    pub fn reset(&self) {
        if let Err(e) = self.models.delete_model() {
            warn!("Failed to delete model record during reset: {e}");
        }
        if let Err(e) = self.chunks.clear() {
            warn!("Failed to clear chunk store during reset: {e}");
        }
        info!("model state reset");
    }

    pub fn status(&self) -> ClarityResult<Option<ModelRecord>> {
        self.models.load_model()
    }

    pub fn check_quota(&self) -> QuotaReport {
        self.quota.check()
    }

    pub fn chunk_stats(&self) -> ClarityResult<ChunkStats> {
        self.chunks.stats()
    }
}
