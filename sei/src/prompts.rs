//! Embedded prompts
//!
//! Compiled into the binary from .pmt files at build time.

/// System prompt asking for a `{"task": ..., "subtasks": [...]}` reply
pub const BREAKDOWN: &str = include_str!("../prompts/breakdown.pmt");
