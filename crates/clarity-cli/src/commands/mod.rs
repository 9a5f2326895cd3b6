pub mod import;
pub mod known;
pub mod quota;
pub mod reset;
pub mod status;
pub mod verify;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clarity_core::config::{expand_tilde, DEFAULT_DB_PATH};
use clarity_core::{Database, ImportConfig, ModelImporter, VerificationRegistry};

/// Paths resolved from global flags, shared by every command.
pub struct Context {
    db_path: PathBuf,
    registry_path: Option<PathBuf>,
}

impl Context {
    pub fn new(db: Option<PathBuf>, registry: Option<PathBuf>) -> Self {
        Self {
            db_path: db.unwrap_or_else(|| expand_tilde(DEFAULT_DB_PATH)),
            registry_path: registry,
        }
    }

    pub fn registry(&self) -> Result<VerificationRegistry> {
        match &self.registry_path {
            Some(path) => VerificationRegistry::from_path(path)
                .with_context(|| format!("loading registry from {}", path.display())),
            None => Ok(VerificationRegistry::new()),
        }
    }

    pub fn importer(&self) -> Result<ModelImporter> {
        let db = Database::open(&self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        let config = ImportConfig::from_env()?;
        let importer = ModelImporter::with_database(Arc::new(db), Arc::new(self.registry()?), config)?;
        Ok(importer)
    }
}
