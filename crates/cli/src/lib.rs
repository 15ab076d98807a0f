//! deepcover CLI
//!
//! Command implementations live here rather than in `main.rs` so they can be
//! exercised directly from tests with an injected engine.

pub mod commands;

pub use commands::*;
