//! Common module for library exports

pub use crate::error::{SdbError, SdbResult};
#[cfg(target_os = "linux")]
pub use crate::process::{Process, TeardownReport};
pub use crate::stop_reason::StopReason;
pub use crate::types::{ProcessId, ProcessState};
