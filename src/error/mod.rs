//! Error types for the logging gateway.
//!
//! Provides a unified error handling system using thiserror. Only
//! construction-time misconfiguration and misuse of the shadow control
//! surface ever reach the caller; every per-entry fault is contained
//! inside the pipeline.

mod types;

pub use types::*;
