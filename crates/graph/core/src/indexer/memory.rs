use std::fmt::Debug;
use tracing::debug;

/// Reports the resident memory of the process.
#[cfg_attr(test, mockall::automock)]
pub trait MemoryProbe: Debug + Send + Sync {
    /// Returns the resident set size in bytes, or `None` if it cannot be determined.
    fn resident_bytes(&self) -> Option<u64>;
}

/// [`MemoryProbe`] backed by the process collector of `metrics-process`.
///
/// Returns `None` on platforms the collector does not support, which disables the health check.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcMemoryProbe;

impl MemoryProbe for ProcMemoryProbe {
    fn resident_bytes(&self) -> Option<u64> {
        let resident = metrics_process::collector::collect().resident_memory_bytes;
        if resident.is_none() {
            debug!(target: "indexer", "Resident memory unavailable on this platform");
        }
        resident
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    #[test]
    fn test_proc_probe_reports_usage() {
        let resident = ProcMemoryProbe.resident_bytes().unwrap();
        assert!(resident > 1024 * 1024, "resident memory {resident}");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_proc_probe_grows_with_allocations() {
        let before = ProcMemoryProbe.resident_bytes().unwrap();
        let block = std::hint::black_box(vec![1u8; 64 * 1024 * 1024]);
        let after = ProcMemoryProbe.resident_bytes().unwrap();
        assert!(after >= before + 32 * 1024 * 1024, "before {before}, after {after}");
        drop(block);
    }
}
