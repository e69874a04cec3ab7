//! Destination writers.
//!
//! One writer per configured destination. Writes are synchronous and
//! unbuffered from the pipeline's perspective; a failed write drops the
//! entry for that destination only and is never retried.

mod aggregator;
mod console;
mod file;

pub use aggregator::{AggregatorSink, AggregatorWriter};
pub use console::ConsoleWriter;
pub use file::FileWriter;

use crate::envelope::{Destination, LogEnvelope};
use crate::error::GatewayError;

/// A writer for one output destination.
pub trait DestinationWriter: Send + Sync {
    fn destination(&self) -> Destination;

    /// Deliver one entry. The writer renders it with its own formatter.
    fn write(&self, envelope: &LogEnvelope) -> Result<(), GatewayError>;

    /// Push any buffered bytes to durable storage.
    fn flush(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}
