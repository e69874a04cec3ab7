//! Per-call builder.

use serde_json::Value;

use crate::envelope::{Level, RoutingDirective, Source};

use super::Gateway;

/// One log call under construction.
///
/// Carries the fields a context collaborator would pre-populate:
/// correlation and operation identifiers, a shadow run override, and a
/// routing directive. `emit` hands the call to the pipeline.
pub struct LogCall<'a> {
    gateway: &'a Gateway,
    pub(super) level: Level,
    pub(super) identity: String,
    pub(super) message: String,
    pub(super) metadata: Value,
    pub(super) source: Source,
    pub(super) correlation_id: Option<String>,
    pub(super) operation_id: Option<String>,
    pub(super) run_id: Option<String>,
    pub(super) routing: Option<RoutingDirective>,
}

impl<'a> LogCall<'a> {
    pub(super) fn new(gateway: &'a Gateway, level: Level) -> Self {
        Self {
            gateway,
            level,
            identity: String::new(),
            message: String::new(),
            metadata: Value::Null,
            source: Source::Application,
            correlation_id: None,
            operation_id: None,
            run_id: None,
            routing: None,
        }
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Mark the entry as originating inside the gateway itself. Internal
    /// entries never reach the aggregator destination.
    pub fn internal(mut self) -> Self {
        self.source = Source::Internal;
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    /// Tag the entry for a shadow run.
    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn routing(mut self, routing: RoutingDirective) -> Self {
        self.routing = Some(routing);
        self
    }

    /// Send the entry through the pipeline. Never fails: per-entry
    /// faults are contained and reported on the fallback channel.
    pub fn emit(self) {
        let gateway = self.gateway;
        gateway.process(self);
    }
}
