//! Clarity core library: chunked import and verification of local model files.
//!
//! A model file is validated, checked against the free storage on the target
//! volume, written to a chunk store in fixed-size pieces, hashed back out of
//! that store, and classified against a registry of known SHA-256 digests.
//! The resulting [`ModelRecord`] is persisted so later sessions can report
//! what is installed without re-reading the file.
//!
//! The [`importer::ModelImporter`] drives the work as a step-wise
//! [`importer::ImportSession`] iterator so a caller keeps control between
//! chunks.

pub mod config;
pub mod errors;
pub mod importer;
pub mod limits;
pub mod models;
pub mod quota;
pub mod registry;
pub mod store;

pub use config::ImportConfig;
pub use errors::{ClarityError, ClarityResult};
pub use importer::{
    CancelToken, ImportEvent, ImportFailure, ImportOptions, ImportOutcome, ImportPhase,
    ImportProgress, ImportSession, ModelImporter,
};
pub use models::{ChunkStats, Classification, KnownModel, ModelRecord, VerificationStatus};
pub use quota::{QuotaProbe, QuotaReport};
pub use registry::VerificationRegistry;
pub use store::{ChunkStore, Database, MemoryStore, ModelStore};
