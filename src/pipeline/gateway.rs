//! The logging gateway.

use serde_json::json;
use tracing::warn;

use crate::config::Settings;
use crate::envelope::{Level, LogEnvelope, SanitizeSummary};
use crate::error::GatewayError;
use crate::format::formatter_for;
use crate::output::{
    AggregatorSink, AggregatorWriter, ConsoleWriter, DestinationWriter, FileWriter,
};
use crate::sanitize::Sanitizer;
use crate::scope::{ScopeFilter, ScopingConfig};
use crate::shadow::{ActiveRun, EnableOptions, ShadowRecorder};

use super::call::LogCall;
use super::router::should_send;

/// The per-process logging gateway.
///
/// One instance owns the whole emission pipeline: scope filtering,
/// shadow capture, level gating, sanitization, and per-destination
/// routing. Construction fails only on fatal misconfiguration; once
/// built, no log call ever returns an error to the caller.
pub struct Gateway {
    app_name: String,
    min_level: Level,
    verbose_namespaces: Vec<String>,
    scope: ScopeFilter,
    sanitizer: Sanitizer,
    shadow: ShadowRecorder,
    writers: Vec<Box<dyn DestinationWriter>>,
}

impl Gateway {
    /// Build a gateway without an aggregator sink.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The settings fail validation
    /// - The file destination is enabled without a path, or its log
    ///   file cannot be opened
    /// - The aggregator destination is enabled (no sink was provided)
    pub fn new(settings: Settings) -> Result<Self, GatewayError> {
        Self::build(settings, None)
    }

    /// Build a gateway with an application-provided aggregator sink.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Gateway::new`], except that an enabled
    /// aggregator destination is satisfied by `sink`.
    pub fn with_aggregator(
        settings: Settings,
        sink: Box<dyn AggregatorSink>,
    ) -> Result<Self, GatewayError> {
        Self::build(settings, Some(sink))
    }

    fn build(
        settings: Settings,
        sink: Option<Box<dyn AggregatorSink>>,
    ) -> Result<Self, GatewayError> {
        settings.validate()?;

        // A malformed scoping section disables scoping, never the gateway.
        let scoping = match ScopingConfig::from_settings(&settings.scoping) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Invalid scoping configuration, scoping disabled");
                ScopingConfig::default()
            }
        };

        let mut writers: Vec<Box<dyn DestinationWriter>> = Vec::new();
        if settings.destinations.console.enabled {
            writers.push(Box::new(ConsoleWriter::new(formatter_for(
                &settings.destinations.console.format,
            ))));
        }
        if settings.destinations.file.enabled {
            let path = settings
                .destinations
                .file
                .path
                .as_ref()
                .ok_or_else(|| GatewayError::Config {
                    message: "File destination enabled without a path".to_string(),
                })?;
            writers.push(Box::new(FileWriter::new(
                path,
                formatter_for(&settings.destinations.file.format),
            )?));
        }
        if settings.destinations.aggregator.enabled {
            let sink = sink.ok_or_else(|| GatewayError::Config {
                message: "Aggregator destination enabled without a sink".to_string(),
            })?;
            writers.push(Box::new(AggregatorWriter::new(
                sink,
                formatter_for("json"),
            )));
        }

        Ok(Self {
            app_name: settings.gateway.app_name.clone(),
            min_level: settings.min_level(),
            verbose_namespaces: settings.gateway.verbose_namespaces.clone(),
            scope: ScopeFilter::new(scoping),
            sanitizer: Sanitizer::new(settings.sanitize.clone()),
            shadow: ShadowRecorder::new(settings.shadow.clone()),
            writers,
        })
    }

    // Level-keyed emission calls.

    pub fn verbose(&self, identity: &str, message: &str, metadata: serde_json::Value) {
        self.log(Level::Verbose, identity, message, metadata);
    }

    pub fn debug(&self, identity: &str, message: &str, metadata: serde_json::Value) {
        self.log(Level::Debug, identity, message, metadata);
    }

    pub fn info(&self, identity: &str, message: &str, metadata: serde_json::Value) {
        self.log(Level::Info, identity, message, metadata);
    }

    pub fn warn(&self, identity: &str, message: &str, metadata: serde_json::Value) {
        self.log(Level::Warn, identity, message, metadata);
    }

    pub fn error(&self, identity: &str, message: &str, metadata: serde_json::Value) {
        self.log(Level::Error, identity, message, metadata);
    }

    pub fn log(&self, level: Level, identity: &str, message: &str, metadata: serde_json::Value) {
        self.call(level)
            .identity(identity)
            .message(message)
            .metadata(metadata)
            .emit();
    }

    /// Start a call with the full per-entry surface: correlation fields,
    /// shadow run tag, routing directive.
    pub fn call(&self, level: Level) -> LogCall<'_> {
        LogCall::new(self, level)
    }

    /// The emission pipeline. Runs every decision in fixed order;
    /// contains every per-entry fault.
    pub(super) fn process(&self, call: LogCall<'_>) {
        // 1. Scope gate: excluded entries are dropped entirely, before
        //    shadow capture.
        if !self
            .scope
            .include(&call.message, &call.identity, &self.app_name, &call.metadata)
        {
            return;
        }

        // 2. Raw envelope.
        let mut envelope = LogEnvelope::new(
            call.level,
            call.message,
            call.identity,
            self.app_name.clone(),
            call.metadata,
        );
        envelope.source = call.source;
        envelope.correlation_id = call.correlation_id;
        envelope.operation_id = call.operation_id;
        envelope.run_id = call.run_id;
        envelope.routing = call.routing;

        // 3. Shadow capture: always, before level filtering, with the
        //    pre-sanitization data.
        let raw = json!({
            "message": envelope.message,
            "metadata": envelope.metadata,
        });
        self.shadow.write(&envelope, &raw);

        // 4. Level threshold, unless the identity falls under a
        //    forced-verbose namespace.
        if envelope.level < self.min_level && !self.forced_verbose(&envelope.identity) {
            return;
        }

        // 5. Sanitization.
        let delivered = match self.sanitizer.sanitize(&envelope.message, &envelope.metadata) {
            Ok(outcome) => {
                let mut clean = envelope.with_sanitized(outcome.message, outcome.metadata);
                clean.sanitize = Some(SanitizeSummary {
                    redactions: outcome.redactions,
                    truncated: outcome.truncated,
                });
                clean
            }
            Err(kind) => {
                // Fail safe: no partial output, the whole entry is masked.
                warn!(error = %kind, entry_id = %envelope.entry_id, "Sanitization aborted, entry masked");
                let mut masked = envelope.with_sanitized(
                    self.sanitizer.mask().to_string(),
                    json!({ "sanitize_error": kind.to_string() }),
                );
                masked.sanitize = Some(SanitizeSummary {
                    redactions: 0,
                    truncated: false,
                });
                masked
            }
        };

        // 6. Routing and dispatch.
        for writer in &self.writers {
            let dest = writer.destination();
            if !should_send(&delivered, dest) {
                continue;
            }
            if let Err(e) = writer.write(&delivered) {
                warn!(destination = %dest, error = %e, "Destination write failed, entry dropped there");
            }
        }
    }

    fn forced_verbose(&self, identity: &str) -> bool {
        self.verbose_namespaces
            .iter()
            .any(|ns| identity.starts_with(ns.as_str()))
    }

    /// Sync file-backed destinations.
    pub fn flush(&self) {
        for writer in &self.writers {
            if let Err(e) = writer.flush() {
                warn!(destination = %writer.destination(), error = %e, "Flush failed");
            }
        }
    }

    /// Clear between-rule range state. Intended for test isolation.
    pub fn reset_scope(&self) {
        self.scope.reset();
    }

    // Shadow control surface.

    pub fn shadow_enable(&self, run_id: &str, opts: EnableOptions) -> Result<(), GatewayError> {
        self.shadow.enable(run_id, opts)
    }

    pub fn shadow_disable(&self, run_id: &str) -> Result<(), GatewayError> {
        self.shadow.disable(run_id)
    }

    pub fn shadow_is_enabled(&self, run_id: &str) -> bool {
        self.shadow.is_enabled(run_id)
    }

    pub fn shadow_list_active(&self) -> Vec<ActiveRun> {
        self.shadow.list_active()
    }

    pub fn shadow_export(
        &self,
        run_id: &str,
        dest: &std::path::Path,
    ) -> Result<std::path::PathBuf, GatewayError> {
        self.shadow.export(run_id, dest)
    }

    pub fn shadow_cleanup_expired(&self, now: chrono::DateTime<chrono::Utc>) -> usize {
        self.shadow.cleanup_expired(now)
    }
}
