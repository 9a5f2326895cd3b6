//! Storage admission control run once before an import starts writing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sysinfo::Disks;
use tracing::{debug, warn};

use crate::errors::{ClarityError, ClarityResult};
use crate::limits::whole_gib;

/// Raw usage/capacity figures for the persistent storage area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEstimate {
    pub usage_bytes: u64,
    pub quota_bytes: u64,
}

/// Source of [`StorageEstimate`]s. Errors mean the platform cannot report.
pub trait QuotaProbe: Send + Sync {
    fn estimate(&self) -> ClarityResult<StorageEstimate>;
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

/// Reports the filesystem that holds `path`.
///
/// Quota is the filesystem's total size and usage is whatever is not
/// available to this process.
#[derive(Debug, Clone)]
pub struct DiskQuotaProbe {
    path: PathBuf,
}

impl DiskQuotaProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl QuotaProbe for DiskQuotaProbe {
    fn estimate(&self) -> ClarityResult<StorageEstimate> {
        let target = std::fs::canonicalize(&self.path)?;
        let target_device = device_of(&target);
        let disks = Disks::new_with_refreshed_list();
        let mounts: Vec<MountCandidate<'_>> = disks
            .list()
            .iter()
            .map(|d| MountCandidate {
                mount_point: d.mount_point(),
                device: device_of(d.mount_point()),
            })
            .collect();
        let disk = pick_mount(&target, target_device, &mounts)
            .and_then(|idx| disks.list().get(idx))
            .ok_or_else(|| {
                ClarityError::Storage(format!(
                    "no mounted filesystem reports capacity for {}",
                    target.display()
                ))
            })?;

        let quota_bytes = disk.total_space();
        let usage_bytes = quota_bytes.saturating_sub(disk.available_space());
        debug!(
            mount = %disk.mount_point().display(),
            usage_bytes,
            quota_bytes,
            "disk estimate"
        );
        Ok(StorageEstimate {
            usage_bytes,
            quota_bytes,
        })
    }
}

struct MountCandidate<'a> {
    mount_point: &'a Path,
    device: Option<u64>,
}

/// Index of the mount holding `target`: the longest mount point that prefixes
/// it and, where devices are known, sits on the same device. A mount missing
/// from the list must not be answered by its parent filesystem.
fn pick_mount(
    target: &Path,
    target_device: Option<u64>,
    mounts: &[MountCandidate<'_>],
) -> Option<usize> {
    mounts
        .iter()
        .enumerate()
        .filter(|(_, m)| target.starts_with(m.mount_point))
        .filter(|(_, m)| target_device.is_none() || m.device == target_device)
        .max_by_key(|(_, m)| m.mount_point.as_os_str().len())
        .map(|(idx, _)| idx)
}

#[cfg(unix)]
fn device_of(path: &Path) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(path).ok().map(|meta| meta.dev())
}

#[cfg(not(unix))]
fn device_of(_path: &Path) -> Option<u64> {
    None
}

/// Always reports the same figures.
#[derive(Debug, Clone, Copy)]
pub struct FixedQuota(pub StorageEstimate);

impl FixedQuota {
    pub fn new(usage_bytes: u64, quota_bytes: u64) -> Self {
        Self(StorageEstimate {
            usage_bytes,
            quota_bytes,
        })
    }

    /// A probe with `free_bytes` available out of a quota of the same size.
    pub fn free(free_bytes: u64) -> Self {
        Self::new(0, free_bytes)
    }
}

impl QuotaProbe for FixedQuota {
    fn estimate(&self) -> ClarityResult<StorageEstimate> {
        Ok(self.0)
    }
}

/// A platform without any quota reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableQuota;

impl QuotaProbe for UnavailableQuota {
    fn estimate(&self) -> ClarityResult<StorageEstimate> {
        Err(ClarityError::Storage("storage estimate unavailable".into()))
    }
}

// ---------------------------------------------------------------------------
// QuotaGuard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaReport {
    pub usage_bytes: u64,
    pub quota_bytes: u64,
    pub has_sufficient_quota: bool,
}

impl QuotaReport {
    pub fn available_bytes(&self) -> u64 {
        self.quota_bytes.saturating_sub(self.usage_bytes)
    }

    /// Free space in whole GiB, rounded down.
    pub fn available_gib(&self) -> u64 {
        whole_gib(self.available_bytes())
    }
}

/// Admits an import only when free space exceeds a fixed margin.
#[derive(Clone)]
pub struct QuotaGuard {
    probe: Arc<dyn QuotaProbe>,
    margin_bytes: u64,
}

impl QuotaGuard {
    pub fn new(probe: Arc<dyn QuotaProbe>, margin_bytes: u64) -> Self {
        Self {
            probe,
            margin_bytes,
        }
    }

    pub fn margin_bytes(&self) -> u64 {
        self.margin_bytes
    }

    /// Query the probe once. An unavailable probe reports `0/0` and is never
    /// sufficient.
    pub fn check(&self) -> QuotaReport {
        let estimate = match self.probe.estimate() {
            Ok(estimate) => estimate,
            Err(e) => {
                warn!("Storage estimate unavailable, refusing import: {e}");
                StorageEstimate::default()
            }
        };
        let available = estimate.quota_bytes.saturating_sub(estimate.usage_bytes);
        QuotaReport {
            usage_bytes: estimate.usage_bytes,
            quota_bytes: estimate.quota_bytes,
            has_sufficient_quota: available > self.margin_bytes,
        }
    }
}
