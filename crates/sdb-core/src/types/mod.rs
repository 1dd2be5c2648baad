//! # Types
//!
//! Plain data types shared by the decoder and the process controller.
//!
//! These carry no OS state of their own, so they can be freely copied,
//! compared and printed by collaborators such as the command-line front end.

pub mod process;

// Re-export all public types
pub use process::{ProcessId, ProcessState};
