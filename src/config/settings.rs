//! Configuration settings for the logging gateway.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::envelope::Level;
use crate::error::GatewayError;

/// Main configuration structure for the gateway.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub destinations: DestinationsConfig,
    #[serde(default)]
    pub sanitize: SanitizeConfig,
    #[serde(default, deserialize_with = "lenient_scoping")]
    pub scoping: ScopingSettings,
    #[serde(default)]
    pub shadow: ShadowConfig,
}

/// Core gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Application name stamped on every envelope.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Minimum level delivered to destinations (verbose, debug, info, warn, error).
    #[serde(default = "default_min_level")]
    pub min_level: String,
    /// Identity prefixes that bypass the level threshold entirely.
    #[serde(default)]
    pub verbose_namespaces: Vec<String>,
}

/// Destination configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DestinationsConfig {
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub file: FileConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
}

/// Console destination.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Output format ("text" or "json").
    #[serde(default = "default_text_format")]
    pub format: String,
}

/// File destination.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Path to the log file. Required when the destination is enabled.
    pub path: Option<PathBuf>,
    /// Output format ("text" or "json").
    #[serde(default = "default_json_format")]
    pub format: String,
}

/// External aggregator destination. The gateway performs no transport of
/// its own; the application supplies the sink at construction.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AggregatorConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Sanitizer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SanitizeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub detectors: DetectorToggles,
    /// Token substituted for masked spans.
    #[serde(default = "default_mask")]
    pub mask: String,
    /// Fraction of each matched span that is masked, from the front.
    /// 1.0 masks the whole span.
    #[serde(default = "default_mask_ratio")]
    pub partial_mask_ratio: f64,
    /// Metadata nodes below this depth are returned unmodified and the
    /// result is marked truncated.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Wall-clock budget for one sanitize call, in milliseconds.
    #[serde(default = "default_time_budget_ms")]
    pub time_budget_ms: u64,
    /// Keys whose values are replaced wholesale by the mask token.
    #[serde(default = "default_deny_keys")]
    pub deny_keys: Vec<String>,
    /// Keys exempt from all sanitization.
    #[serde(default)]
    pub allow_keys: Vec<String>,
    /// Keys whose string values are replaced by a one-way digest.
    #[serde(default)]
    pub hash_keys: Vec<String>,
}

/// Per-detector toggles. All detectors default to on.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorToggles {
    #[serde(default = "default_true")]
    pub email: bool,
    #[serde(default = "default_true")]
    pub ip: bool,
    #[serde(default = "default_true")]
    pub phone: bool,
    #[serde(default = "default_true")]
    pub jwt: bool,
    #[serde(default = "default_true")]
    pub api_key: bool,
    #[serde(default = "default_true")]
    pub cloud_key: bool,
    #[serde(default = "default_true")]
    pub password: bool,
    #[serde(default = "default_true")]
    pub credit_card: bool,
}

/// Raw scoping configuration as loaded from file.
///
/// Deliberately permissive: validation happens when the scope filter is
/// built, and a malformed section disables scoping instead of failing
/// gateway construction.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScopingSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub filter_identities: Vec<String>,
    #[serde(default)]
    pub filtered_applications: Vec<String>,
    #[serde(default)]
    pub between_rules: Vec<BetweenRuleSettings>,
}

/// One raw between-rule. `action` is validated as "include" or "exclude"
/// when the scope filter is built.
#[derive(Debug, Clone, Deserialize)]
pub struct BetweenRuleSettings {
    pub action: String,
    #[serde(default)]
    pub exact_match: bool,
    #[serde(default)]
    pub search_log: bool,
    #[serde(default)]
    pub start_identities: Vec<String>,
    #[serde(default)]
    pub end_identities: Vec<String>,
}

/// Shadow capture configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ShadowConfig {
    /// Directory holding one subdirectory per run.
    #[serde(default = "default_shadow_root")]
    pub root_dir: PathBuf,
    /// Rolling buffer capacity. Zero disables retroactive capture.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Maximum age of a buffered entry, in seconds.
    #[serde(default = "default_buffer_max_age")]
    pub buffer_max_age_secs: u64,
    /// Time-to-live of run storage after its last update, in seconds.
    #[serde(default = "default_shadow_ttl")]
    pub ttl_secs: u64,
    /// On-disk record format ("jsonl" or "json").
    #[serde(default = "default_shadow_format")]
    pub format: String,
    /// When set, entries whose routing directive blocks the file or
    /// shadow destination are not captured.
    #[serde(default)]
    pub respect_routing_blocks: bool,
}

/// Deserialize the scoping section leniently: a malformed shape degrades
/// to scoping-disabled instead of failing the whole load.
fn lenient_scoping<'de, D>(deserializer: D) -> Result<ScopingSettings, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = toml::Value::deserialize(deserializer)?;
    Ok(ScopingSettings::deserialize(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Malformed scoping section, scoping disabled");
        ScopingSettings::default()
    }))
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_app_name() -> String {
    "app".to_string()
}

fn default_min_level() -> String {
    "info".to_string()
}

fn default_text_format() -> String {
    "text".to_string()
}

fn default_json_format() -> String {
    "json".to_string()
}

fn default_mask() -> String {
    "[REDACTED]".to_string()
}

fn default_mask_ratio() -> f64 {
    1.0
}

fn default_max_depth() -> usize {
    8
}

fn default_time_budget_ms() -> u64 {
    50
}

fn default_deny_keys() -> Vec<String> {
    [
        "password",
        "secret",
        "token",
        "credential",
        "private_key",
        "api_key",
        "authorization",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_shadow_root() -> PathBuf {
    PathBuf::from("/var/log/loggate/shadow")
}

fn default_buffer_capacity() -> usize {
    256
}

fn default_buffer_max_age() -> u64 {
    300
}

fn default_shadow_ttl() -> u64 {
    86_400
}

fn default_shadow_format() -> String {
    "jsonl".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            min_level: default_min_level(),
            verbose_namespaces: Vec::new(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: default_text_format(),
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            format: default_json_format(),
        }
    }
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detectors: DetectorToggles::default(),
            mask: default_mask(),
            partial_mask_ratio: default_mask_ratio(),
            max_depth: default_max_depth(),
            time_budget_ms: default_time_budget_ms(),
            deny_keys: default_deny_keys(),
            allow_keys: Vec::new(),
            hash_keys: Vec::new(),
        }
    }
}

impl Default for DetectorToggles {
    fn default() -> Self {
        Self {
            email: true,
            ip: true,
            phone: true,
            jwt: true,
            api_key: true,
            cloud_key: true,
            password: true,
            credit_card: true,
        }
    }
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            root_dir: default_shadow_root(),
            buffer_capacity: default_buffer_capacity(),
            buffer_max_age_secs: default_buffer_max_age(),
            ttl_secs: default_shadow_ttl(),
            format: default_shadow_format(),
            respect_routing_blocks: false,
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML does not parse (the scoping section excepted, which
    ///   degrades to disabled)
    /// - Validation rejects the parsed settings
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GatewayError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| GatewayError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        let settings: Settings = toml::from_str(&content).map_err(|e| GatewayError::Config {
            message: format!("Failed to parse config file '{}': {}", path.display(), e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings. Fatal misconfiguration only; the scoping
    /// section is validated separately and non-fatally.
    pub fn validate(&self) -> Result<(), GatewayError> {
        Level::from_str(&self.gateway.min_level).map_err(|e| GatewayError::Config {
            message: format!("Invalid min_level: {}", e),
        })?;

        if self.destinations.file.enabled && self.destinations.file.path.is_none() {
            return Err(GatewayError::Config {
                message: "File destination enabled without a path".to_string(),
            });
        }

        let valid_formats = ["text", "json"];
        for (name, format) in [
            ("console", &self.destinations.console.format),
            ("file", &self.destinations.file.format),
        ] {
            if !valid_formats.contains(&format.to_lowercase().as_str()) {
                return Err(GatewayError::Config {
                    message: format!(
                        "Invalid {} format '{}'. Valid formats: {:?}",
                        name, format, valid_formats
                    ),
                });
            }
        }

        let valid_shadow_formats = ["jsonl", "json"];
        if !valid_shadow_formats.contains(&self.shadow.format.to_lowercase().as_str()) {
            return Err(GatewayError::Config {
                message: format!(
                    "Invalid shadow format '{}'. Valid formats: {:?}",
                    self.shadow.format, valid_shadow_formats
                ),
            });
        }

        if !(0.0..=1.0).contains(&self.sanitize.partial_mask_ratio) {
            return Err(GatewayError::Config {
                message: format!(
                    "partial_mask_ratio must be within [0.0, 1.0], got {}",
                    self.sanitize.partial_mask_ratio
                ),
            });
        }

        Ok(())
    }

    /// The configured minimum level. `validate` must have accepted the
    /// settings first; an unparsable level falls back to `Info`.
    pub fn min_level(&self) -> Level {
        Level::from_str(&self.gateway.min_level).unwrap_or(Level::Info)
    }
}
