//! Common type aliases

/// Process identifier
pub type Pid = u32;

/// A quantity of memory in bytes
pub type Bytes = u64;
