//! # Linux ptrace Plumbing
//!
//! - `sys`: one wrapper per system call, each tagging failures with the call name
//! - `launch`: fork/exec of a traced child with an error side-channel

pub(crate) mod launch;
pub(crate) mod sys;

pub(crate) use launch::LaunchManager;
