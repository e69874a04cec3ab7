//! Console destination.

use crate::envelope::{Destination, Level, LogEnvelope};
use crate::error::GatewayError;
use crate::format::Formatter;

use super::DestinationWriter;

/// Writes entries to stdout, switching to stderr for warnings and errors.
pub struct ConsoleWriter {
    formatter: Box<dyn Formatter>,
}

impl ConsoleWriter {
    pub fn new(formatter: Box<dyn Formatter>) -> Self {
        Self { formatter }
    }
}

impl DestinationWriter for ConsoleWriter {
    fn destination(&self) -> Destination {
        Destination::Console
    }

    fn write(&self, envelope: &LogEnvelope) -> Result<(), GatewayError> {
        let line = self.formatter.render(envelope);
        if envelope.level >= Level::Warn {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
        Ok(())
    }
}
