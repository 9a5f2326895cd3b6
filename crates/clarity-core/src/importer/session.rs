//! Step-wise import state machine.
//!
//! An [`ImportSession`] is an iterator: every call to `next()` performs at
//! most one unit of work (a validation or quota step, one chunk write, one
//! chunk hashed) and yields the resulting [`ImportEvent`]. The caller decides
//! when to resume, so a UI loop regains control between chunks.
//!
//! ```text
//! Validate -> CheckQuota -> ClearChunks -> WriteChunk* -> ListChunks
//!          -> HashChunk* -> Classify -> Finish -> Done
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ImportConfig;
use crate::importer::digest::StreamingDigest;
use crate::importer::events::{
    CancelToken, ImportEvent, ImportFailure, ImportOutcome, ImportPhase, ImportProgress,
};
use crate::importer::source::ByteSource;
use crate::importer::validate::validate_source;
use crate::limits::{clamp_percent, COMPLETE_PERCENT, HASH_PHASE_PERCENT, WRITE_PHASE_PERCENT};
use crate::models::ModelRecord;
use crate::quota::QuotaGuard;
use crate::registry::VerificationRegistry;
use crate::store::{ChunkStore, ModelStore};

/// Per-session options.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Import even when the source matches the current model record.
    pub force: bool,
    pub cancel: CancelToken,
}

impl ImportOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// In-flight guard
// ---------------------------------------------------------------------------

/// Marks an importer busy for as long as it is held.
#[derive(Debug)]
pub(crate) struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    pub(crate) fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// ImportSession
// ---------------------------------------------------------------------------

/// Collaborators a session works against, cloned from the importer.
pub(crate) struct SessionContext {
    pub chunks: Arc<dyn ChunkStore>,
    pub models: Arc<dyn ModelStore>,
    pub quota: QuotaGuard,
    pub registry: Arc<VerificationRegistry>,
    pub config: ImportConfig,
}

enum Step {
    Validate,
    CheckQuota,
    ClearChunks,
    WriteChunk {
        offset: u64,
    },
    ListChunks,
    HashChunk {
        pending: VecDeque<u64>,
        digest: StreamingDigest,
    },
    Classify {
        digest: String,
    },
    Finish(ImportOutcome),
    Done,
}

pub struct ImportSession<S: ByteSource> {
    source: S,
    file_name: String,
    total_bytes: u64,
    bytes_written: u64,
    percent: f64,
    options: ImportOptions,
    ctx: SessionContext,
    step: Step,
    guard: Option<InFlightGuard>,
}

impl<S: ByteSource> ImportSession<S> {
    pub(crate) fn new(
        source: S,
        options: ImportOptions,
        ctx: SessionContext,
        guard: InFlightGuard,
    ) -> Self {
        let file_name = source.name().to_string();
        let total_bytes = source.len();
        info!(file = %file_name, total_bytes, "starting model import");
        Self {
            source,
            file_name,
            total_bytes,
            bytes_written: 0,
            percent: 0.0,
            options,
            ctx,
            step: Step::Validate,
            guard: Some(guard),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Last reported progress value.
    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// A handle that cancels this session from elsewhere.
    pub fn cancel_token(&self) -> CancelToken {
        self.options.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.step, Step::Done)
    }

    // -- event helpers -------------------------------------------------------

    fn progress(&mut self, phase: ImportPhase, percent: f64) -> ImportEvent {
        self.percent = self.percent.max(clamp_percent(percent));
        debug!(?phase, percent = self.percent, "import progress");
        ImportEvent::Progress(ImportProgress {
            phase,
            bytes_written: self.bytes_written,
            total_bytes: self.total_bytes,
            percent: self.percent,
        })
    }

    fn finish(&mut self, outcome: ImportOutcome) -> ImportEvent {
        match &outcome {
            ImportOutcome::Completed(record) => info!(
                file = %record.file_name,
                digest = %record.digest,
                status = %record.verification_status,
                "model import completed"
            ),
            ImportOutcome::AlreadyImported(record) => info!(
                file = %record.file_name,
                "model already imported, skipping"
            ),
            ImportOutcome::Failed(failure) => warn!(
                file = %self.file_name,
                percent = self.percent,
                "model import failed: {failure}"
            ),
        }
        self.step = Step::Done;
        self.guard.take();
        ImportEvent::Finished(outcome)
    }

    fn fail(&mut self, failure: ImportFailure) -> ImportEvent {
        self.finish(ImportOutcome::Failed(failure))
    }

    fn write_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return WRITE_PHASE_PERCENT;
        }
        self.bytes_written as f64 / self.total_bytes as f64 * WRITE_PHASE_PERCENT
    }

    fn hash_percent(&self, hashed: u64) -> f64 {
        if self.total_bytes == 0 {
            return HASH_PHASE_PERCENT;
        }
        WRITE_PHASE_PERCENT
            + (HASH_PHASE_PERCENT - WRITE_PHASE_PERCENT) * (hashed as f64 / self.total_bytes as f64)
    }

    // -- steps ---------------------------------------------------------------

    fn validate(&mut self) -> ImportEvent {
        if let Err(invalid) = validate_source(&self.file_name, self.total_bytes, &self.ctx.config) {
            return self.fail(invalid.into());
        }

        if !self.options.force {
            match self.ctx.models.load_model() {
                Ok(Some(record)) if record.matches_source(&self.file_name, self.total_bytes) => {
                    return self.finish(ImportOutcome::AlreadyImported(record));
                }
                Ok(_) => {}
                Err(e) => warn!("Could not read current model record: {e}"),
            }
        }

        self.step = Step::CheckQuota;
        self.progress(ImportPhase::Validating, 0.0)
    }

    fn check_quota(&mut self) -> ImportEvent {
        let report = self.ctx.quota.check();
        if !report.has_sufficient_quota {
            return self.fail(ImportFailure::InsufficientQuota {
                report,
                margin_bytes: self.ctx.quota.margin_bytes(),
            });
        }
        self.step = Step::ClearChunks;
        self.progress(ImportPhase::QuotaChecking, 0.0)
    }

    fn clear_chunks(&mut self) -> ImportEvent {
        if self.options.cancel.is_cancelled() {
            return self.fail(ImportFailure::Cancelled);
        }
        if let Err(e) = self.ctx.chunks.clear() {
            return self.fail(ImportFailure::Storage(format!("clearing chunk store: {e}")));
        }
        self.step = if self.total_bytes == 0 {
            Step::ListChunks
        } else {
            Step::WriteChunk { offset: 0 }
        };
        self.progress(ImportPhase::Writing, 0.0)
    }

    fn write_chunk(&mut self, offset: u64) -> ImportEvent {
        if self.options.cancel.is_cancelled() {
            return self.fail(ImportFailure::Cancelled);
        }

        let end = offset
            .saturating_add(self.ctx.config.chunk_size)
            .min(self.total_bytes);
        let bytes = match self.source.read_range(offset, end) {
            Ok(bytes) => bytes,
            Err(e) => {
                return self.fail(ImportFailure::Storage(format!(
                    "reading source at offset {offset}: {e}"
                )))
            }
        };
        if bytes.len() as u64 != end - offset {
            return self.fail(ImportFailure::Storage(format!(
                "source returned {} bytes for range {offset}..{end}",
                bytes.len()
            )));
        }
        if let Err(e) = self.ctx.chunks.put(offset, &bytes) {
            return self.fail(ImportFailure::Storage(format!(
                "writing chunk at offset {offset}: {e}"
            )));
        }

        let next = offset + bytes.len() as u64;
        self.bytes_written = next;
        self.step = if next == self.total_bytes {
            Step::ListChunks
        } else {
            Step::WriteChunk { offset: next }
        };
        let percent = self.write_percent();
        self.progress(ImportPhase::Writing, percent)
    }

    fn list_chunks(&mut self) -> ImportEvent {
        if self.options.cancel.is_cancelled() {
            return self.fail(ImportFailure::Cancelled);
        }
        match self.ctx.chunks.offsets() {
            Ok(offsets) => {
                self.step = Step::HashChunk {
                    pending: offsets.into(),
                    digest: StreamingDigest::new(),
                };
                let percent = self.write_percent();
                self.progress(ImportPhase::Hashing, percent)
            }
            Err(e) => self.fail(ImportFailure::Hash(format!("listing chunks: {e}"))),
        }
    }

    fn hash_chunk(&mut self, mut pending: VecDeque<u64>, mut digest: StreamingDigest) -> ImportEvent {
        if self.options.cancel.is_cancelled() {
            return self.fail(ImportFailure::Cancelled);
        }

        if let Some(offset) = pending.pop_front() {
            let expected = digest.bytes();
            if offset != expected {
                return self.fail(ImportFailure::Hash(format!(
                    "chunk store has a gap or overlap at offset {offset} (expected {expected})"
                )));
            }
            match self.ctx.chunks.get(offset) {
                Ok(Some(bytes)) => digest.update(&bytes),
                Ok(None) => {
                    return self.fail(ImportFailure::Hash(format!(
                        "chunk at offset {offset} disappeared"
                    )))
                }
                Err(e) => {
                    return self.fail(ImportFailure::Hash(format!(
                        "reading chunk at offset {offset}: {e}"
                    )))
                }
            }
        }

        if !pending.is_empty() {
            let percent = self.hash_percent(digest.bytes());
            self.step = Step::HashChunk { pending, digest };
            return self.progress(ImportPhase::Hashing, percent);
        }

        if digest.bytes() != self.total_bytes {
            return self.fail(ImportFailure::Hash(format!(
                "reconstructed {} bytes, expected {}",
                digest.bytes(),
                self.total_bytes
            )));
        }
        self.step = Step::Classify {
            digest: digest.finish(),
        };
        self.progress(ImportPhase::Hashing, HASH_PHASE_PERCENT)
    }

    fn classify(&mut self, digest: String) -> ImportEvent {
        let classification = self.ctx.registry.classify(&digest);
        let record = ModelRecord::new(
            self.file_name.clone(),
            self.total_bytes,
            digest,
            &classification,
        );
        if let Err(e) = self.ctx.models.save_model(&record) {
            return self.fail(ImportFailure::Storage(format!("saving model record: {e}")));
        }
        let record = match self.ctx.models.load_model() {
            Ok(Some(saved)) => saved,
            _ => record,
        };
        self.step = Step::Finish(ImportOutcome::Completed(record));
        self.progress(ImportPhase::Classifying, COMPLETE_PERCENT)
    }
}

impl<S: ByteSource> Iterator for ImportSession<S> {
    type Item = ImportEvent;

    fn next(&mut self) -> Option<ImportEvent> {
        let event = match std::mem::replace(&mut self.step, Step::Done) {
            Step::Validate => self.validate(),
            Step::CheckQuota => self.check_quota(),
            Step::ClearChunks => self.clear_chunks(),
            Step::WriteChunk { offset } => self.write_chunk(offset),
            Step::ListChunks => self.list_chunks(),
            Step::HashChunk { pending, digest } => self.hash_chunk(pending, digest),
            Step::Classify { digest } => self.classify(digest),
            Step::Finish(outcome) => self.finish(outcome),
            Step::Done => return None,
        };
        Some(event)
    }
}
