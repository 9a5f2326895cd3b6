pub mod digest;
pub mod events;
pub mod pipeline;
pub mod session;
pub mod source;
pub mod validate;

#[cfg(test)]
mod tests;

pub use digest::{digest_file, sha256_hex, verify_file, FileVerification, StreamingDigest};
pub use events::{CancelToken, ImportEvent, ImportFailure, ImportOutcome, ImportPhase, ImportProgress};
pub use pipeline::ModelImporter;
pub use session::{ImportOptions, ImportSession};
pub use source::{ByteSource, FileSource, MemorySource};
pub use validate::InvalidInput;
