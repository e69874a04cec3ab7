//! External aggregator destination.
//!
//! The gateway performs no network transport of its own: the application
//! supplies a sink, and the writer hands it rendered entries.

use crate::envelope::{Destination, LogEnvelope};
use crate::error::GatewayError;
use crate::format::Formatter;

use super::DestinationWriter;

/// Application-provided transport for the aggregator destination.
pub trait AggregatorSink: Send + Sync {
    fn send(&self, rendered: &str, envelope: &LogEnvelope) -> Result<(), GatewayError>;
}

/// Forwards rendered entries to the application's aggregator sink.
pub struct AggregatorWriter {
    sink: Box<dyn AggregatorSink>,
    formatter: Box<dyn Formatter>,
}

impl AggregatorWriter {
    pub fn new(sink: Box<dyn AggregatorSink>, formatter: Box<dyn Formatter>) -> Self {
        Self { sink, formatter }
    }
}

impl DestinationWriter for AggregatorWriter {
    fn destination(&self) -> Destination {
        Destination::Aggregator
    }

    fn write(&self, envelope: &LogEnvelope) -> Result<(), GatewayError> {
        let line = self.formatter.render(envelope);
        self.sink.send(&line, envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Level;
    use crate::format::JsonFormatter;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct CollectingSink {
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl AggregatorSink for CollectingSink {
        fn send(&self, rendered: &str, _envelope: &LogEnvelope) -> Result<(), GatewayError> {
            self.lines.lock().unwrap().push(rendered.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_sink_receives_rendered_entries() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let writer = AggregatorWriter::new(
            Box::new(CollectingSink {
                lines: Arc::clone(&lines),
            }),
            Box::new(JsonFormatter),
        );

        let env = LogEnvelope::new(Level::Info, "shipped", "id", "app", json!({}));
        writer.write(&env).unwrap();

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("shipped"));
    }
}
