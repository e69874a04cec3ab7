//! The emission pipeline.
//!
//! Orchestrates every decision made on a log call, in fixed order:
//! scope gate, raw envelope construction, shadow capture, level
//! threshold, sanitization, per-destination routing, dispatch.

mod call;
mod gateway;
mod router;

pub use call::LogCall;
pub use gateway::Gateway;
pub use router::should_send;
