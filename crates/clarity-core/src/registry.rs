//! Known-good digest table used to classify imported models.
//!
//! The registry is built once at startup and only read afterwards; it is
//! shared with the importer behind an `Arc`.

use std::path::Path;

use indexmap::IndexMap;

use crate::errors::{ClarityError, ClarityResult};
use crate::models::{Classification, KnownModel};

const SHA256_HEX_LEN: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct VerificationRegistry {
    entries: IndexMap<String, KnownModel>,
}

impl VerificationRegistry {
    /// An empty registry: every digest classifies as unverified.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, D>(entries: I) -> ClarityResult<Self>
    where
        I: IntoIterator<Item = (D, KnownModel)>,
        D: AsRef<str>,
    {
        let mut map = IndexMap::new();
        for (digest, known) in entries {
            map.insert(normalize_digest(digest.as_ref())?, known);
        }
        Ok(Self { entries: map })
    }

    /// Parse a JSON object mapping hex digest to `{name, size, source}`.
    pub fn from_json_str(json: &str) -> ClarityResult<Self> {
        let raw: IndexMap<String, KnownModel> = serde_json::from_str(json)?;
        Self::from_entries(raw)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ClarityResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Classify a digest. Unknown or malformed digests are simply unverified.
    pub fn classify(&self, digest: &str) -> Classification {
        match self.lookup(digest) {
            Some(known) => Classification::Verified(known.clone()),
            None => Classification::Unverified,
        }
    }

    pub fn lookup(&self, digest: &str) -> Option<&KnownModel> {
        self.entries.get(&digest.trim().to_ascii_lowercase())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &KnownModel)> {
        self.entries.iter().map(|(d, k)| (d.as_str(), k))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_digest(raw: &str) -> ClarityResult<String> {
    let digest = raw.trim().to_ascii_lowercase();
    if digest.len() != SHA256_HEX_LEN || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ClarityError::Registry(format!(
            "{raw:?} is not a {SHA256_HEX_LEN}-character hex SHA-256 digest"
        )));
    }
    Ok(digest)
}
