//! Loggate - per-process logging gateway.
//!
//! Applications call one [`Gateway`](pipeline::Gateway) instance to emit
//! structured log entries to multiple destinations (console, file, an
//! external aggregator, and a shadow side-channel) under configurable
//! filtering and redaction rules. Every log call runs the same fixed
//! pipeline: scope gate, shadow capture, level threshold, sanitization,
//! per-destination routing. Once a gateway is built, no log call ever
//! returns an error to the caller.

pub mod config;
pub mod envelope;
pub mod error;
pub mod format;
pub mod output;
pub mod pipeline;
pub mod sanitize;
pub mod scope;
pub mod shadow;

pub use config::Settings;
pub use envelope::{Destination, Level, LogEnvelope, RoutingDirective, Source};
pub use error::GatewayError;
pub use pipeline::{Gateway, LogCall};
pub use shadow::{ActiveRun, EnableOptions};
