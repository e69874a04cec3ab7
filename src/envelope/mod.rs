//! Log envelope types.
//!
//! Defines the normalized in-memory representation of one log entry
//! prior to formatting, plus the level and routing vocabulary shared by
//! the whole pipeline.

mod entry;
mod level;
mod routing;

pub use entry::{LogEnvelope, SanitizeSummary, Source};
pub use level::Level;
pub use routing::{Destination, RoutingDirective};
