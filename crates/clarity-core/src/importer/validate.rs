//! Admission checks on a source's declared name and size.
//!
//! Nothing here reads file content; extension checks are by name only.

use std::path::Path;

use crate::config::ImportConfig;
use crate::limits::human_bytes;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidInput {
    #[error("{file_name:?} is not a .{expected} file")]
    WrongExtension { file_name: String, expected: String },

    #[error("file is too small ({}; minimum is {})", human(.size), human(.min))]
    TooSmall { size: u64, min: u64 },

    #[error("file is too large ({}; maximum is {})", human(.size), human(.max))]
    TooLarge { size: u64, max: u64 },
}

fn human(bytes: &u64) -> String {
    human_bytes(*bytes)
}

/// Lowercased extension of `file_name`, without the dot.
pub fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

pub fn validate_source(file_name: &str, size: u64, config: &ImportConfig) -> Result<(), InvalidInput> {
    let expected = config.allowed_extension.trim_start_matches('.').to_lowercase();
    if file_extension(file_name).as_deref() != Some(expected.as_str()) {
        return Err(InvalidInput::WrongExtension {
            file_name: file_name.to_string(),
            expected,
        });
    }
    if size < config.min_file_size {
        return Err(InvalidInput::TooSmall {
            size,
            min: config.min_file_size,
        });
    }
    if size > config.max_file_size {
        return Err(InvalidInput::TooLarge {
            size,
            max: config.max_file_size,
        });
    }
    Ok(())
}
