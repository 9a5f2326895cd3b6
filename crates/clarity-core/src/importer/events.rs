//! Progress events and terminal outcomes of an import session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::importer::validate::InvalidInput;
use crate::limits::GIB;
use crate::models::ModelRecord;
use crate::quota::QuotaReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Validating,
    QuotaChecking,
    Writing,
    Hashing,
    Classifying,
}

impl ImportPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::QuotaChecking => "checking storage",
            Self::Writing => "writing chunks",
            Self::Hashing => "computing digest",
            Self::Classifying => "verifying",
        }
    }
}

/// Snapshot emitted after each unit of work.
///
/// `phase` is the phase whose step just ran. `percent` never decreases
/// within one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImportProgress {
    pub phase: ImportPhase,
    pub bytes_written: u64,
    pub total_bytes: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportEvent {
    Progress(ImportProgress),
    /// Always the last event of a session.
    Finished(ImportOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    Completed(ModelRecord),
    /// The source matches the current model by name and size; nothing ran.
    AlreadyImported(ModelRecord),
    Failed(ImportFailure),
}

impl ImportOutcome {
    pub fn record(&self) -> Option<&ModelRecord> {
        match self {
            Self::Completed(record) | Self::AlreadyImported(record) => Some(record),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ImportFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Why a session ended without a model record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImportFailure {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),

    #[error(
        "insufficient storage: {} GB available, more than {} GB must be free",
        .report.available_gib(),
        .margin_bytes / GIB
    )]
    InsufficientQuota {
        report: QuotaReport,
        margin_bytes: u64,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("read/hash error: {0}")]
    Hash(String),

    #[error("import cancelled")]
    Cancelled,
}

impl ImportFailure {
    /// Free space reported for quota failures, in whole GB.
    pub fn available_gib(&self) -> Option<u64> {
        match self {
            Self::InsufficientQuota { report, .. } => Some(report.available_gib()),
            _ => None,
        }
    }
}

/// Cooperative cancellation flag checked between chunk operations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
