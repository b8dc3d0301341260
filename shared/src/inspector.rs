//! Resident-memory inspection.
//!
//! "How much memory is process X using right now" is a capability so the
//! daemon, the client, and the tests can swap the OS-backed reader for fakes.

use crate::error::InspectorError;
use crate::types::{Bytes, Pid};
use std::fs;
use std::io;

pub trait MemoryInspector: Send + Sync {
    /// Current resident set size of `pid`, in bytes.
    fn resident_memory(&self, pid: Pid) -> Result<Bytes, InspectorError>;
}

/// Reads `VmRSS` from `/proc/<pid>/status`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcfsInspector;

impl MemoryInspector for ProcfsInspector {
    fn resident_memory(&self, pid: Pid) -> Result<Bytes, InspectorError> {
        let path = format!("/proc/{pid}/status");
        let status = match fs::read_to_string(&path) {
            Ok(status) => status,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(InspectorError::ProcessGone(pid))
            }
            Err(source) => return Err(InspectorError::Io { pid, source }),
        };
        parse_vm_rss(pid, &status)
    }
}

fn parse_vm_rss(pid: Pid, status: &str) -> Result<Bytes, InspectorError> {
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kib: Bytes = rest
                .trim()
                .trim_end_matches("kB")
                .trim()
                .parse()
                .map_err(|_| InspectorError::Malformed {
                    pid,
                    reason: format!("unparseable VmRSS line: {line:?}"),
                })?;
            return Ok(kib * 1024);
        }
    }
    // Kernel threads have no VmRSS entry at all.
    Err(InspectorError::Malformed {
        pid,
        reason: "no VmRSS field in status".to_string(),
    })
}

/// Resident memory of the calling process itself.
pub fn self_resident_memory(inspector: &dyn MemoryInspector) -> Result<Bytes, InspectorError> {
    inspector.resident_memory(std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vm_rss() {
        let status = "Name:\ttest\nVmPeak:\t  204800 kB\nVmRSS:\t  102400 kB\nThreads:\t1\n";
        assert_eq!(parse_vm_rss(1, status).unwrap(), 102_400 * 1024);
    }

    #[test]
    fn test_parse_vm_rss_missing() {
        let status = "Name:\tkthreadd\nThreads:\t1\n";
        let err = parse_vm_rss(2, status).unwrap_err();
        assert!(matches!(err, InspectorError::Malformed { pid: 2, .. }));
    }

    #[test]
    fn test_parse_vm_rss_garbage_value() {
        let status = "VmRSS:\tnot-a-number kB\n";
        let err = parse_vm_rss(3, status).unwrap_err();
        assert!(matches!(err, InspectorError::Malformed { pid: 3, .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_reads_own_process() {
        let usage = self_resident_memory(&ProcfsInspector).unwrap();
        assert!(usage > 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_nonexistent_process() {
        // Way above any realistic pid_max.
        let err = ProcfsInspector.resident_memory(u32::MAX - 1).unwrap_err();
        assert!(matches!(err, InspectorError::ProcessGone(_)));
    }
}
