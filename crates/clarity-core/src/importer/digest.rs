//! SHA-256 content digests and standalone file verification.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::errors::ClarityResult;
use crate::limits::DIGEST_READ_BUFFER;
use crate::models::{KnownModel, VerificationStatus};
use crate::registry::VerificationRegistry;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Incremental digest over a byte stream fed in order.
#[derive(Debug, Clone, Default)]
pub struct StreamingDigest {
    hasher: Sha256,
    bytes: u64,
}

impl StreamingDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes += data.len() as u64;
    }

    /// Bytes consumed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

/// Hash everything `reader` yields, returning the digest and byte count.
pub fn digest_reader<R: Read>(mut reader: R) -> io::Result<(String, u64)> {
    let mut digest = StreamingDigest::new();
    let mut buf = vec![0u8; DIGEST_READ_BUFFER];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        digest.update(&buf[..n]);
    }
    let bytes = digest.bytes();
    Ok((digest.finish(), bytes))
}

pub fn digest_file(path: impl AsRef<Path>) -> ClarityResult<(String, u64)> {
    let file = File::open(path.as_ref())?;
    Ok(digest_reader(file)?)
}

/// Integrity report for a file checked in place, without importing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileVerification {
    pub file_name: String,
    pub size: u64,
    pub digest: String,
    pub status: VerificationStatus,
    pub known: Option<KnownModel>,
}

/// Digest `path` and classify it.
///
/// When `expected` is given it takes precedence over the registry: a match is
/// `Verified`, a mismatch is `Failed`.
pub fn verify_file(
    path: impl AsRef<Path>,
    registry: &VerificationRegistry,
    expected: Option<&str>,
) -> ClarityResult<FileVerification> {
    let path = path.as_ref();
    let (digest, size) = digest_file(path)?;
    let known = registry.lookup(&digest).cloned();
    let status = match expected {
        Some(want) if want.trim().eq_ignore_ascii_case(&digest) => VerificationStatus::Verified,
        Some(_) => VerificationStatus::Failed,
        None if known.is_some() => VerificationStatus::Verified,
        None => VerificationStatus::Unverified,
    };
    info!(path = %path.display(), %digest, %status, "verified model file");
    Ok(FileVerification {
        file_name: path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default(),
        size,
        digest,
        status,
        known,
    })
}
