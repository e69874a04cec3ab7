//! Per-run index manifest.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatewayError;

/// On-disk record format for a shadow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowFormat {
    /// One compact JSON record per line.
    Jsonl,
    /// One pretty-printed JSON document per entry.
    Json,
}

impl ShadowFormat {
    /// File name of the run's data artifact.
    pub fn data_file(&self) -> &'static str {
        match self {
            ShadowFormat::Jsonl => "entries.jsonl",
            ShadowFormat::Json => "entries.json",
        }
    }
}

impl FromStr for ShadowFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jsonl" => Ok(ShadowFormat::Jsonl),
            "json" => Ok(ShadowFormat::Json),
            other => Err(format!("unknown shadow format '{}'", other)),
        }
    }
}

/// Index manifest written next to a run's data file.
///
/// Updated on every captured write; `updated_at` plus the TTL decides
/// when cleanup removes the run's storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ttl_secs: u64,
    pub format: ShadowFormat,
    pub entry_count: u64,
    pub data_file: String,
    pub hostname: String,
    pub pid: u32,
    pub process_run_id: Uuid,
}

/// File name of the manifest inside a run directory.
pub(crate) const MANIFEST_FILE: &str = "manifest.json";

impl RunManifest {
    pub fn new(run_id: &str, ttl_secs: u64, format: ShadowFormat, process_run_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.to_string(),
            created_at: now,
            updated_at: now,
            ttl_secs,
            format,
            entry_count: 0,
            data_file: format.data_file().to_string(),
            hostname: hostname(),
            pid: std::process::id(),
            process_run_id,
        }
    }

    /// Load a manifest from a run directory.
    pub fn load(run_dir: &Path) -> Result<Self, GatewayError> {
        let content = std::fs::read_to_string(run_dir.join(MANIFEST_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the manifest into a run directory.
    pub fn save(&self, run_dir: &Path) -> Result<(), GatewayError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(run_dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }

    /// Whether the run's storage has outlived its TTL at `now`.
    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        self.updated_at + chrono::Duration::seconds(self.ttl_secs as i64) < now
    }

    /// Stamp an additional captured entry.
    pub fn record_write(&mut self) {
        self.entry_count += 1;
        self.updated_at = Utc::now();
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut manifest = RunManifest::new("r1", 3600, ShadowFormat::Jsonl, Uuid::new_v4());
        manifest.record_write();
        manifest.save(dir.path()).unwrap();

        let loaded = RunManifest::load(dir.path()).unwrap();
        assert_eq!(loaded.run_id, "r1");
        assert_eq!(loaded.entry_count, 1);
        assert_eq!(loaded.format, ShadowFormat::Jsonl);
        assert_eq!(loaded.data_file, "entries.jsonl");
    }

    #[test]
    fn test_expiry() {
        let manifest = RunManifest::new("r1", 60, ShadowFormat::Jsonl, Uuid::new_v4());
        let now = Utc::now();
        assert!(!manifest.expired_at(now));
        assert!(manifest.expired_at(now + chrono::Duration::seconds(61)));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("jsonl".parse::<ShadowFormat>().unwrap(), ShadowFormat::Jsonl);
        assert_eq!("JSON".parse::<ShadowFormat>().unwrap(), ShadowFormat::Json);
        assert!("yaml".parse::<ShadowFormat>().is_err());
    }
}
