//! Sensitive-content sanitization.
//!
//! Detects and masks sensitive substrings in a message and an
//! arbitrarily nested metadata tree. Traversal is bounded three ways:
//! a configured depth cutoff (beyond it, values pass through unmodified
//! and the result is marked truncated), a cooperative wall-clock budget,
//! and a fail-safe guard that aborts the whole call on a revisited node
//! or runaway recursion rather than emitting partial output.

mod detectors;
mod sanitizer;

pub use detectors::{luhn_valid, mask_span, scan_text};
pub use sanitizer::{SanitizeOutcome, Sanitizer};
