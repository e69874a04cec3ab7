//! Rendering log envelopes into text.
//!
//! Formatting is a pure boundary: one implementation per output format,
//! selected by configuration, with no influence on pipeline decisions.

use crate::envelope::LogEnvelope;

/// Renders one envelope into a single output line.
pub trait Formatter: Send + Sync {
    fn render(&self, envelope: &LogEnvelope) -> String;
}

/// One compact JSON object per entry.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn render(&self, envelope: &LogEnvelope) -> String {
        serde_json::to_string(envelope).unwrap_or_else(|e| {
            format!(
                r#"{{"level":"error","message":"failed to render log entry: {}"}}"#,
                e
            )
        })
    }
}

/// A single human-readable line.
pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn render(&self, envelope: &LogEnvelope) -> String {
        let mut line = format!(
            "{} [{}] {}: {}",
            envelope.timestamp.to_rfc3339(),
            envelope.level.to_string().to_uppercase(),
            envelope.identity,
            envelope.message
        );
        if !envelope.metadata.is_null()
            && envelope.metadata != serde_json::Value::Object(Default::default())
        {
            line.push(' ');
            line.push_str(&envelope.metadata.to_string());
        }
        line
    }
}

/// Formatter selection by configured name. Unknown names fall back to text.
pub fn formatter_for(name: &str) -> Box<dyn Formatter> {
    match name.to_lowercase().as_str() {
        "json" => Box::new(JsonFormatter),
        _ => Box::new(TextFormatter),
    }
}
