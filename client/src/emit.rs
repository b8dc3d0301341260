//! Metric emission.
//!
//! The emitter is a single-method capability: the default writes a formatted
//! report to stdout, production wiring substitutes its own. A failing custom
//! emitter is contained here and the console fallback runs instead, so a
//! measurement is never lost to a broken emitter.

use crate::error::EmitError;
use memwatch_shared::types::Bytes;
use tracing::error;

/// One measured profiled block, handed to the emitter and then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRecord {
    pub block_name: String,

    /// Peak usage of the watched process over the session, in bytes.
    pub peak_usage: Bytes,

    /// The caller's own resident-memory growth across the block, in bytes.
    /// Positive values are a leak signal.
    pub unreturned: i64,
}

pub trait Emitter: Send + Sync {
    fn emit(&self, record: &MetricRecord) -> Result<(), EmitError>;
}

/// Default emitter: prints a human-readable usage block to stdout and flags
/// unreturned memory as a possible leak.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleEmitter;

impl Emitter for ConsoleEmitter {
    fn emit(&self, record: &MetricRecord) -> Result<(), EmitError> {
        print!("{}", format_report(record));
        Ok(())
    }
}

fn format_report(record: &MetricRecord) -> String {
    let mut report = String::new();
    if record.unreturned > 0 {
        report.push('\n');
        report.push_str(&format!("POSSIBLE LEAK IN {}\n", record.block_name));
        report.push_str("Unreturned memory could be an indication of a memory leak.\n");
        report.push('\n');
    }
    let base_line = "================================";
    report.push_str(&format!("{} {}\n", record.block_name, base_line));
    report.push_str("Block Memory Usage\n");
    report.push_str(&format!("    Peak Usage: {}\n", record.peak_usage));
    report.push_str(&format!("    Unreturned: {}\n", record.unreturned));
    report.push_str(&format!(
        "{}{}\n",
        "=".repeat(record.block_name.len() + 1),
        base_line
    ));
    report
}

/// Run `primary`, containing any failure and emitting through `fallback`
/// instead. Emission never propagates an error into the profiled workload.
pub(crate) fn emit_with_fallback(
    primary: &dyn Emitter,
    fallback: &dyn Emitter,
    record: &MetricRecord,
) {
    if let Err(e) = primary.emit(record) {
        error!(
            "custom emitter failed: {e}. \
             Emitters implement emit(&MetricRecord {{ peak_usage: bytes, \
             unreturned: bytes, block_name: string }}) -> Result<(), EmitError>"
        );
        if let Err(e) = fallback.emit(record) {
            error!("fallback emitter failed as well: {e}");
        }
    }
}
