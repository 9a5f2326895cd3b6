//! Size bounds and constants shared by validation, chunking and the quota guard.

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

/// Default window size for one persisted chunk.
pub const DEFAULT_CHUNK_SIZE: u64 = 16 * MIB;

/// Smallest model file accepted for import.
pub const MIN_MODEL_FILE_SIZE: u64 = 100 * MIB;

/// Largest model file accepted for import.
pub const MAX_MODEL_FILE_SIZE: u64 = 15 * GIB;

/// Free space that must remain beyond current usage before an import is admitted.
pub const DEFAULT_QUOTA_MARGIN: u64 = 2 * GIB;

/// Accepted model file extension, compared case-insensitively and without the dot.
pub const MODEL_FILE_EXTENSION: &str = "gguf";

/// Share of the visible progress range allotted to the write phase.
pub const WRITE_PHASE_PERCENT: f64 = 80.0;

/// Progress reached once the digest has been computed.
pub const HASH_PHASE_PERCENT: f64 = 90.0;

pub const COMPLETE_PERCENT: f64 = 100.0;

/// Buffer size used when streaming a file from disk into the hasher.
pub const DIGEST_READ_BUFFER: usize = 1024 * 1024;

pub fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, COMPLETE_PERCENT)
}

/// Whole gibibytes contained in `bytes`, rounded down.
pub fn whole_gib(bytes: u64) -> u64 {
    bytes / GIB
}

/// Render a byte count with the largest binary unit that keeps it >= 1.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: &[(u64, &str)] = &[(GIB, "GiB"), (MIB, "MiB"), (KIB, "KiB")];
    for (unit, label) in UNITS {
        if bytes >= *unit {
            return format!("{:.1} {label}", bytes as f64 / *unit as f64);
        }
    }
    format!("{bytes} B")
}
