//! Shared typed records used across the store, registry and import layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ClarityError;

// ---------------------------------------------------------------------------
// VerificationStatus
// ---------------------------------------------------------------------------

/// Outcome of comparing a digest against the known-good table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    /// Digest is present in the registry.
    Verified,
    /// Digest is unknown; the model is still usable.
    Unverified,
    /// Digest contradicts an explicitly expected value.
    Failed,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Unverified => "unverified",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = ClarityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verified" => Ok(Self::Verified),
            "unverified" => Ok(Self::Unverified),
            "failed" => Ok(Self::Failed),
            other => Err(ClarityError::Database(format!(
                "unknown verification status {other:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// KnownModel
// ---------------------------------------------------------------------------

/// Descriptive metadata for one known-good digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownModel {
    pub name: String,
    /// Human-readable approximate size, e.g. `"~1.2GB"`.
    pub size: String,
    pub source: String,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Result of looking a digest up in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Verified(KnownModel),
    Unverified,
}

impl Classification {
    pub fn status(&self) -> VerificationStatus {
        match self {
            Self::Verified(_) => VerificationStatus::Verified,
            Self::Unverified => VerificationStatus::Unverified,
        }
    }

    pub fn known(&self) -> Option<&KnownModel> {
        match self {
            Self::Verified(known) => Some(known),
            Self::Unverified => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ModelRecord
// ---------------------------------------------------------------------------

/// Durable summary of the most recently completed import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub file_name: String,
    pub file_size: u64,
    /// Lowercase hex SHA-256 of the reconstructed byte stream.
    pub digest: String,
    pub verification_status: VerificationStatus,
    /// Registry name, present only when verified.
    pub known_name: Option<String>,
    pub known_source: Option<String>,
    /// Set by the store when the record is persisted.
    pub imported_at: Option<String>,
}

impl ModelRecord {
    pub fn new(
        file_name: impl Into<String>,
        file_size: u64,
        digest: impl Into<String>,
        classification: &Classification,
    ) -> Self {
        let known = classification.known();
        Self {
            file_name: file_name.into(),
            file_size,
            digest: digest.into(),
            verification_status: classification.status(),
            known_name: known.map(|k| k.name.clone()),
            known_source: known.map(|k| k.source.clone()),
            imported_at: None,
        }
    }

    /// Whether `file_name`/`file_size` describe the same file as this record.
    pub fn matches_source(&self, file_name: &str, file_size: u64) -> bool {
        self.file_name == file_name && self.file_size == file_size
    }
}

// ---------------------------------------------------------------------------
// ChunkStats
// ---------------------------------------------------------------------------

/// Aggregate view of the chunk table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkStats {
    pub chunk_count: u64,
    pub total_bytes: u64,
}
