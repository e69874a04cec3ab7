//! Bounded-traversal sanitizer.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use ring::digest::{digest, SHA256};
use serde_json::{Map, Value};

use crate::config::SanitizeConfig;
use crate::error::SanitizeErrorKind;

use super::detectors::scan_text;

/// Hard recursion ceiling, independent of the configured max depth. A
/// walk that reaches it is treated as runaway and aborted wholesale.
const DEPTH_CEILING: usize = 128;

/// Result of one sanitize call.
#[derive(Debug, Clone)]
pub struct SanitizeOutcome {
    pub message: String,
    pub metadata: Value,
    /// Number of values masked, hashed, or span-redacted.
    pub redactions: usize,
    /// Set when the depth cutoff or the time budget left part of the
    /// structure unexamined.
    pub truncated: bool,
}

/// Detects and masks sensitive content in a message and a nested
/// metadata tree, bounded by depth and wall-clock time.
#[derive(Debug)]
pub struct Sanitizer {
    config: SanitizeConfig,
}

impl Sanitizer {
    pub fn new(config: SanitizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SanitizeConfig {
        &self.config
    }

    /// Sanitize a message and its metadata.
    ///
    /// When disabled, returns the inputs unchanged with zero redactions.
    /// A traversal overrun (revisited node or runaway recursion) aborts
    /// the whole call; the pipeline degrades the entry to a masked
    /// placeholder rather than emitting partial output.
    pub fn sanitize(
        &self,
        message: &str,
        metadata: &Value,
    ) -> Result<SanitizeOutcome, SanitizeErrorKind> {
        if !self.config.enabled {
            return Ok(SanitizeOutcome {
                message: message.to_string(),
                metadata: metadata.clone(),
                redactions: 0,
                truncated: false,
            });
        }

        let mut walk = Walk {
            config: &self.config,
            deadline: Instant::now() + Duration::from_millis(self.config.time_budget_ms),
            visited: HashSet::new(),
            redactions: 0,
            truncated: false,
        };

        let message = if walk.expired() {
            walk.truncated = true;
            message.to_string()
        } else {
            let (scanned, count) = scan_text(message, &self.config);
            walk.redactions += count;
            scanned
        };

        let metadata = walk.value(metadata, 0)?;

        Ok(SanitizeOutcome {
            message,
            metadata,
            redactions: walk.redactions,
            truncated: walk.truncated,
        })
    }

    /// The configured mask token.
    pub fn mask(&self) -> &str {
        &self.config.mask
    }
}

struct Walk<'a> {
    config: &'a SanitizeConfig,
    deadline: Instant,
    /// Composite nodes already visited in this call, by address.
    visited: HashSet<usize>,
    redactions: usize,
    truncated: bool,
}

impl Walk<'_> {
    fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn value(&mut self, value: &Value, depth: usize) -> Result<Value, SanitizeErrorKind> {
        if depth > DEPTH_CEILING {
            return Err(SanitizeErrorKind::TraversalOverrun { depth });
        }
        if self.expired() {
            self.truncated = true;
            return Ok(value.clone());
        }

        match value {
            Value::Object(map) => {
                self.enter(value, depth)?;
                if depth > self.config.max_depth {
                    self.truncated = true;
                    return Ok(value.clone());
                }
                let mut sanitized = Map::new();
                for (key, val) in map {
                    sanitized.insert(key.clone(), self.keyed_value(key, val, depth + 1)?);
                }
                Ok(Value::Object(sanitized))
            }
            Value::Array(arr) => {
                self.enter(value, depth)?;
                if depth > self.config.max_depth {
                    self.truncated = true;
                    return Ok(value.clone());
                }
                let mut sanitized = Vec::with_capacity(arr.len());
                for val in arr {
                    sanitized.push(self.value(val, depth + 1)?);
                }
                Ok(Value::Array(sanitized))
            }
            Value::String(s) => Ok(Value::String(self.string(s))),
            _ => Ok(value.clone()),
        }
    }

    /// Apply the per-key policy: allow, then hash, then deny, then
    /// detector scan or recursion.
    fn keyed_value(
        &mut self,
        key: &str,
        value: &Value,
        depth: usize,
    ) -> Result<Value, SanitizeErrorKind> {
        let key_lower = key.to_lowercase();

        if key_matches(&self.config.allow_keys, &key_lower) {
            return Ok(value.clone());
        }
        if key_matches(&self.config.hash_keys, &key_lower) {
            self.redactions += 1;
            return Ok(Value::String(hash_digest(value)));
        }
        if key_matches(&self.config.deny_keys, &key_lower) {
            self.redactions += 1;
            return Ok(Value::String(self.config.mask.clone()));
        }

        self.value(value, depth)
    }

    fn string(&mut self, s: &str) -> String {
        if self.expired() {
            self.truncated = true;
            return s.to_string();
        }
        let (scanned, count) = scan_text(s, self.config);
        self.redactions += count;
        scanned
    }

    fn enter(&mut self, value: &Value, depth: usize) -> Result<(), SanitizeErrorKind> {
        let addr = value as *const Value as usize;
        if !self.visited.insert(addr) {
            return Err(SanitizeErrorKind::TraversalOverrun { depth });
        }
        Ok(())
    }
}

fn key_matches(list: &[String], key_lower: &str) -> bool {
    list.iter().any(|k| key_lower.contains(&k.to_lowercase()))
}

/// One-way digest of a value, used for keys on the hash list.
fn hash_digest(value: &Value) -> String {
    let bytes = match value {
        Value::String(s) => s.as_bytes().to_vec(),
        other => other.to_string().into_bytes(),
    };
    let hash = digest(&SHA256, &bytes);
    let hex: String = hash.as_ref().iter().map(|b| format!("{:02x}", b)).collect();
    format!("sha256:{}", hex)
}
