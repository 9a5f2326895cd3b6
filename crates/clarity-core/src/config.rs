//! Import configuration and environment overrides.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{ClarityError, ClarityResult};
use crate::limits::{
    DEFAULT_CHUNK_SIZE, DEFAULT_QUOTA_MARGIN, MAX_MODEL_FILE_SIZE, MIN_MODEL_FILE_SIZE,
    MODEL_FILE_EXTENSION,
};

pub const ENV_CHUNK_SIZE: &str = "CLARITY_CHUNK_SIZE";
pub const ENV_MIN_FILE_SIZE: &str = "CLARITY_MIN_FILE_SIZE";
pub const ENV_MAX_FILE_SIZE: &str = "CLARITY_MAX_FILE_SIZE";
pub const ENV_QUOTA_MARGIN: &str = "CLARITY_QUOTA_MARGIN";

/// Default on-disk location of the model database.
pub const DEFAULT_DB_PATH: &str = "~/.clarity/clarity.db";

/// Tunables for one [`crate::importer::ModelImporter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Maximum length of one persisted chunk, in bytes.
    pub chunk_size: u64,
    /// Inclusive lower bound on the source size.
    pub min_file_size: u64,
    /// Inclusive upper bound on the source size.
    pub max_file_size: u64,
    /// Free space required beyond current usage before writing starts.
    pub quota_margin: u64,
    /// File extension without the leading dot.
    pub allowed_extension: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            min_file_size: MIN_MODEL_FILE_SIZE,
            max_file_size: MAX_MODEL_FILE_SIZE,
            quota_margin: DEFAULT_QUOTA_MARGIN,
            allowed_extension: MODEL_FILE_EXTENSION.to_string(),
        }
    }
}

impl ImportConfig {
    /// Defaults with any `CLARITY_*` environment overrides applied.
    pub fn from_env() -> ClarityResult<Self> {
        let mut config = Self::default();
        if let Some(v) = env_bytes(ENV_CHUNK_SIZE)? {
            config.chunk_size = v;
        }
        if let Some(v) = env_bytes(ENV_MIN_FILE_SIZE)? {
            config.min_file_size = v;
        }
        if let Some(v) = env_bytes(ENV_MAX_FILE_SIZE)? {
            config.max_file_size = v;
        }
        if let Some(v) = env_bytes(ENV_QUOTA_MARGIN)? {
            config.quota_margin = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ClarityResult<()> {
        if self.chunk_size == 0 {
            return Err(ClarityError::Config("chunk_size must be positive".into()));
        }
        if self.min_file_size > self.max_file_size {
            return Err(ClarityError::Config(format!(
                "min_file_size ({}) exceeds max_file_size ({})",
                self.min_file_size, self.max_file_size
            )));
        }
        if self.allowed_extension.trim().is_empty() {
            return Err(ClarityError::Config("allowed_extension is empty".into()));
        }
        Ok(())
    }
}

fn env_bytes(name: &str) -> ClarityResult<Option<u64>> {
    match std::env::var(name) {
        Ok(val) => parse_bytes(&val)
            .map(Some)
            .ok_or_else(|| ClarityError::Config(format!("{name}: invalid byte count {val:?}"))),
        Err(_) => Ok(None),
    }
}

fn parse_bytes(raw: &str) -> Option<u64> {
    raw.trim().replace('_', "").parse::<u64>().ok()
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if path.len() > 2 {
                expanded.push(&path[2..]);
            }
            return expanded;
        }
    }
    PathBuf::from(path)
}
