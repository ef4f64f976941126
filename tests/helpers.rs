#![allow(dead_code)]

//! Helpers shared by tests that use `anyhow` for error plumbing.

/// Shorthand result type for tests that bubble errors with `?`.
pub type Anyhow = anyhow::Result<()>;
