//! The log envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Level, RoutingDirective};

/// Origin of a log entry.
///
/// Entries the gateway emits about itself are tagged `Internal` and are
/// never routed to the aggregator destination, to prevent feedback loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Application,
    Internal,
}

/// Normalized in-memory representation of one log entry.
///
/// Created once per call and immutable afterwards; sanitization produces
/// a modified copy rather than mutating in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEnvelope {
    /// Capture timestamp.
    pub timestamp: DateTime<Utc>,
    /// Unique identifier for this entry.
    pub entry_id: Uuid,
    /// Severity level.
    pub level: Level,
    /// The log message.
    pub message: String,
    /// String identifying the call's logical origin.
    pub identity: String,
    /// Application name, used by the scope filter's allow-lists.
    pub app_name: String,
    /// Whether the entry originated in the application or the gateway itself.
    pub source: Source,
    /// Arbitrary structured metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Correlation identifier supplied by a context collaborator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Operation identifier supplied by a context collaborator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Per-entry shadow run override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Per-entry routing directive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingDirective>,
    /// Outcome of sanitization, for downstream auditing. Absent on raw
    /// (pre-sanitization) copies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitize: Option<SanitizeSummary>,
}

/// What sanitization did to an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizeSummary {
    pub redactions: usize,
    pub truncated: bool,
}

impl LogEnvelope {
    /// Create a new envelope stamped with the current time and a fresh id.
    pub fn new(
        level: Level,
        message: impl Into<String>,
        identity: impl Into<String>,
        app_name: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            entry_id: Uuid::new_v4(),
            level,
            message: message.into(),
            identity: identity.into(),
            app_name: app_name.into(),
            source: Source::Application,
            metadata,
            correlation_id: None,
            operation_id: None,
            run_id: None,
            routing: None,
            sanitize: None,
        }
    }

    /// Whether this entry's routing directive permits delivery to `dest`.
    ///
    /// Entries without a directive are delivered everywhere.
    pub fn routing_permits(&self, dest: super::Destination) -> bool {
        match &self.routing {
            Some(directive) => directive.permits(dest),
            None => true,
        }
    }

    /// Return a copy carrying a sanitized message and metadata.
    pub fn with_sanitized(&self, message: String, metadata: serde_json::Value) -> Self {
        let mut copy = self.clone();
        copy.message = message;
        copy.metadata = metadata;
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Destination;
    use serde_json::json;

    #[test]
    fn test_new_envelope_defaults() {
        let env = LogEnvelope::new(Level::Info, "hello", "app.module", "myapp", json!({}));
        assert_eq!(env.level, Level::Info);
        assert_eq!(env.source, Source::Application);
        assert!(env.routing.is_none());
        assert!(env.routing_permits(Destination::Aggregator));
    }

    #[test]
    fn test_with_sanitized_preserves_identity() {
        let env = LogEnvelope::new(
            Level::Warn,
            "secret",
            "auth",
            "myapp",
            json!({"password": "x"}),
        );
        let clean = env.with_sanitized("[REDACTED]".to_string(), json!({}));
        assert_eq!(clean.identity, env.identity);
        assert_eq!(clean.entry_id, env.entry_id);
        assert_eq!(clean.message, "[REDACTED]");
    }
}
