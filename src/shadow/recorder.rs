//! The shadow recorder.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ShadowConfig;
use crate::envelope::{Destination, LogEnvelope};
use crate::error::GatewayError;

use super::buffer::RollingBuffer;
use super::manifest::{RunManifest, ShadowFormat, MANIFEST_FILE};

/// Options for enabling a run, overriding the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct EnableOptions {
    pub ttl_secs: Option<u64>,
    pub format: Option<ShadowFormat>,
}

/// Summary of one currently active run.
#[derive(Debug, Clone)]
pub struct ActiveRun {
    pub run_id: String,
    pub since: DateTime<Utc>,
    pub format: ShadowFormat,
}

/// The record appended to a run's data file: the raw envelope plus the
/// pre-sanitization payload, exactly as the pipeline saw them.
#[derive(Serialize)]
struct ShadowRecord<'a> {
    envelope: &'a LogEnvelope,
    raw: &'a serde_json::Value,
}

#[derive(Debug)]
struct RunState {
    manifest: RunManifest,
    dir: PathBuf,
    file: File,
    enabled_at: DateTime<Utc>,
}

/// Durable per-run raw capture with retroactive buffering and TTL
/// cleanup.
///
/// Capture never disrupts primary logging: every write-path failure is
/// caught and reported through the fallback channel.
#[derive(Debug)]
pub struct ShadowRecorder {
    config: ShadowConfig,
    default_format: ShadowFormat,
    process_run_id: Uuid,
    buffer: Mutex<RollingBuffer>,
    active: Mutex<HashMap<String, RunState>>,
    write_failure_reported: AtomicBool,
}

impl ShadowRecorder {
    pub fn new(config: ShadowConfig) -> Self {
        let default_format =
            ShadowFormat::from_str(&config.format).unwrap_or(ShadowFormat::Jsonl);
        let buffer = RollingBuffer::new(
            config.buffer_capacity,
            Duration::from_secs(config.buffer_max_age_secs),
        );
        Self {
            config,
            default_format,
            process_run_id: Uuid::new_v4(),
            buffer: Mutex::new(buffer),
            active: Mutex::new(HashMap::new()),
            write_failure_reported: AtomicBool::new(false),
        }
    }

    /// Enable capture for `run_id`.
    ///
    /// Creates the run directory and manifest before accepting writes,
    /// then drains buffered entries tagged with this run id into the
    /// data file in original arrival order. Enabling an already active
    /// run is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The run id is empty or contains path-unsafe characters
    /// - The run directory, manifest, or data file cannot be created
    pub fn enable(&self, run_id: &str, opts: EnableOptions) -> Result<(), GatewayError> {
        validate_run_id(run_id)?;

        let mut active = lock(&self.active);
        if active.contains_key(run_id) {
            debug!(run_id, "Shadow run already enabled");
            return Ok(());
        }

        let dir = self.config.root_dir.join(run_id);
        std::fs::create_dir_all(&dir)?;

        // A previously disabled run keeps its history.
        let mut manifest = match RunManifest::load(&dir) {
            Ok(existing) => existing,
            Err(_) => RunManifest::new(
                run_id,
                opts.ttl_secs.unwrap_or(self.config.ttl_secs),
                opts.format.unwrap_or(self.default_format),
                self.process_run_id,
            ),
        };
        manifest.updated_at = Utc::now();
        manifest.save(&dir)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(&manifest.data_file))?;

        // Retroactive capture. Draining the buffer keeps a later
        // re-enable from replaying the same entries again.
        let buffered = lock(&self.buffer).take_matching(run_id);
        for entry in &buffered {
            append_record(&mut file, manifest.format, &entry.envelope, &entry.raw)?;
            manifest.record_write();
        }
        if !buffered.is_empty() {
            manifest.save(&dir)?;
            debug!(run_id, replayed = buffered.len(), "Replayed buffered entries");
        }

        debug!(run_id, dir = %dir.display(), "Shadow run enabled");
        active.insert(
            run_id.to_string(),
            RunState {
                manifest,
                dir,
                file,
                enabled_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Record one entry.
    ///
    /// Always inserts into the rolling buffer first, then appends to the
    /// resolved run's file when that run is active. Failures never
    /// propagate to the caller.
    pub fn write(&self, envelope: &LogEnvelope, raw: &serde_json::Value) {
        lock(&self.buffer).push(envelope.clone(), raw.clone());

        let Some(run_id) = envelope.run_id.as_deref() else {
            return;
        };
        let mut active = lock(&self.active);
        let Some(run) = active.get_mut(run_id) else {
            return;
        };

        if self.config.respect_routing_blocks
            && (!envelope.routing_permits(Destination::File)
                || !envelope.routing_permits(Destination::Shadow))
        {
            debug!(run_id, "Entry routing blocks shadow capture, skipping");
            return;
        }

        if let Err(e) = append_record(&mut run.file, run.manifest.format, envelope, raw) {
            self.report_write_failure(&e);
            return;
        }
        run.manifest.record_write();
        if let Err(e) = run.manifest.save(&run.dir) {
            self.report_write_failure(&e);
        }
        // Captured durably; the buffered copy must not replay on a
        // later re-enable.
        lock(&self.buffer).remove(&envelope.entry_id);
    }

    /// Stop capturing for `run_id`. The on-disk artifact remains until
    /// TTL cleanup.
    ///
    /// # Errors
    ///
    /// Returns `ShadowNotFound` if the run is not active, or an error if
    /// the final manifest update cannot be written.
    pub fn disable(&self, run_id: &str) -> Result<(), GatewayError> {
        let mut active = lock(&self.active);
        let run = active
            .remove(run_id)
            .ok_or_else(|| GatewayError::ShadowNotFound {
                run_id: run_id.to_string(),
            })?;
        run.manifest.save(&run.dir)?;
        debug!(run_id, entries = run.manifest.entry_count, "Shadow run disabled");
        Ok(())
    }

    pub fn is_enabled(&self, run_id: &str) -> bool {
        lock(&self.active).contains_key(run_id)
    }

    pub fn list_active(&self) -> Vec<ActiveRun> {
        let active = lock(&self.active);
        let mut runs: Vec<ActiveRun> = active
            .values()
            .map(|run| ActiveRun {
                run_id: run.manifest.run_id.clone(),
                since: run.enabled_at,
                format: run.manifest.format,
            })
            .collect();
        runs.sort_by(|a, b| a.run_id.cmp(&b.run_id));
        runs
    }

    /// Copy the run's data artifact to `dest`. Works for active and
    /// disabled runs whose storage still exists.
    ///
    /// # Errors
    ///
    /// Returns `ShadowNotFound` if no storage exists for the run, or an
    /// error if the copy fails.
    pub fn export(&self, run_id: &str, dest: &Path) -> Result<PathBuf, GatewayError> {
        validate_run_id(run_id)?;
        let dir = self.config.root_dir.join(run_id);
        if !dir.join(MANIFEST_FILE).exists() {
            return Err(GatewayError::ShadowNotFound {
                run_id: run_id.to_string(),
            });
        }
        let manifest = RunManifest::load(&dir)?;

        let target = if dest.is_dir() {
            dest.join(&manifest.data_file)
        } else {
            dest.to_path_buf()
        };
        std::fs::copy(dir.join(&manifest.data_file), &target)?;
        Ok(target)
    }

    /// Delete run storage whose `updated_at + ttl` lies before `now`.
    /// Returns the number of runs deleted; per-run errors are logged
    /// and skipped.
    pub fn cleanup_expired(&self, now: DateTime<Utc>) -> usize {
        let entries = match std::fs::read_dir(&self.config.root_dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let mut deleted = 0;
        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let manifest = match RunManifest::load(&dir) {
                Ok(m) => m,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Unreadable shadow manifest, skipping");
                    continue;
                }
            };
            if !manifest.expired_at(now) {
                continue;
            }
            // Drop the open handle before removing the storage.
            lock(&self.active).remove(&manifest.run_id);
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => {
                    debug!(run_id = %manifest.run_id, "Expired shadow run deleted");
                    deleted += 1;
                }
                Err(e) => {
                    warn!(run_id = %manifest.run_id, error = %e, "Failed to delete expired run");
                }
            }
        }
        deleted
    }

    fn report_write_failure(&self, err: &GatewayError) {
        if !self.write_failure_reported.swap(true, Ordering::Relaxed) {
            warn!(error = %err, "Shadow write failed; further failures suppressed");
        }
    }
}

fn append_record(
    file: &mut File,
    format: ShadowFormat,
    envelope: &LogEnvelope,
    raw: &serde_json::Value,
) -> Result<(), GatewayError> {
    let record = ShadowRecord { envelope, raw };
    let rendered = match format {
        ShadowFormat::Jsonl => serde_json::to_string(&record)?,
        ShadowFormat::Json => serde_json::to_string_pretty(&record)?,
    };
    writeln!(file, "{}", rendered)?;
    if let Err(e) = file.sync_data() {
        warn!(error = %e, "Failed to sync shadow data file");
    }
    Ok(())
}

fn validate_run_id(run_id: &str) -> Result<(), GatewayError> {
    let valid = !run_id.is_empty()
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if !valid || run_id.starts_with('.') {
        return Err(GatewayError::Config {
            message: format!("Invalid shadow run id '{}'", run_id),
        });
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Level, RoutingDirective};
    use serde_json::json;
    use tempfile::TempDir;

    fn recorder(root: &Path) -> ShadowRecorder {
        let config = ShadowConfig {
            root_dir: root.to_path_buf(),
            buffer_capacity: 8,
            buffer_max_age_secs: 300,
            ttl_secs: 3600,
            format: "jsonl".to_string(),
            respect_routing_blocks: false,
        };
        ShadowRecorder::new(config)
    }

    fn envelope(run_id: &str, message: &str) -> LogEnvelope {
        let mut env = LogEnvelope::new(Level::Info, message, "test", "app", json!({}));
        env.run_id = Some(run_id.to_string());
        env
    }

    fn read_messages(root: &Path, run_id: &str) -> Vec<String> {
        let content =
            std::fs::read_to_string(root.join(run_id).join("entries.jsonl")).unwrap();
        content
            .lines()
            .map(|line| {
                let record: serde_json::Value = serde_json::from_str(line).unwrap();
                record["envelope"]["message"].as_str().unwrap().to_string()
            })
            .collect()
    }

    #[test]
    fn test_enable_write_disable_preserves_order() {
        let tmp = TempDir::new().unwrap();
        let recorder = recorder(tmp.path());

        recorder.enable("r1", EnableOptions::default()).unwrap();
        for i in 0..3 {
            recorder.write(&envelope("r1", &format!("m{}", i)), &json!({"i": i}));
        }
        recorder.disable("r1").unwrap();

        assert_eq!(read_messages(tmp.path(), "r1"), vec!["m0", "m1", "m2"]);
        let manifest = RunManifest::load(&tmp.path().join("r1")).unwrap();
        assert_eq!(manifest.entry_count, 3);
    }

    #[test]
    fn test_retroactive_replay_respects_capacity() {
        let tmp = TempDir::new().unwrap();
        let config = ShadowConfig {
            root_dir: tmp.path().to_path_buf(),
            buffer_capacity: 2,
            buffer_max_age_secs: 300,
            ttl_secs: 3600,
            format: "jsonl".to_string(),
            respect_routing_blocks: false,
        };
        let recorder = ShadowRecorder::new(config);

        // Four writes before the run exists; capacity keeps the last two.
        for i in 0..4 {
            recorder.write(&envelope("r1", &format!("m{}", i)), &json!({}));
        }
        recorder.enable("r1", EnableOptions::default()).unwrap();

        assert_eq!(read_messages(tmp.path(), "r1"), vec!["m2", "m3"]);
        let manifest = RunManifest::load(&tmp.path().join("r1")).unwrap();
        assert_eq!(manifest.entry_count, 2);
    }

    #[test]
    fn test_untagged_entries_are_buffered_not_captured() {
        let tmp = TempDir::new().unwrap();
        let recorder = recorder(tmp.path());
        recorder.enable("r1", EnableOptions::default()).unwrap();

        let untagged = LogEnvelope::new(Level::Info, "loose", "test", "app", json!({}));
        recorder.write(&untagged, &json!({}));

        assert!(read_messages(tmp.path(), "r1").is_empty());
    }

    #[test]
    fn test_is_enabled_and_list_active() {
        let tmp = TempDir::new().unwrap();
        let recorder = recorder(tmp.path());

        assert!(!recorder.is_enabled("r1"));
        recorder.enable("r1", EnableOptions::default()).unwrap();
        recorder.enable("r2", EnableOptions::default()).unwrap();
        assert!(recorder.is_enabled("r1"));

        let active = recorder.list_active();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].run_id, "r1");
        assert_eq!(active[1].run_id, "r2");

        recorder.disable("r1").unwrap();
        assert!(!recorder.is_enabled("r1"));
        assert_eq!(recorder.list_active().len(), 1);
    }

    #[test]
    fn test_disable_unknown_run_not_found() {
        let tmp = TempDir::new().unwrap();
        let recorder = recorder(tmp.path());
        let err = recorder.disable("missing").unwrap_err();
        assert!(matches!(err, GatewayError::ShadowNotFound { .. }));
    }

    #[test]
    fn test_export_copies_data_file() {
        let tmp = TempDir::new().unwrap();
        let recorder = recorder(tmp.path());
        recorder.enable("r1", EnableOptions::default()).unwrap();
        recorder.write(&envelope("r1", "hello"), &json!({}));

        let dest = tmp.path().join("export.jsonl");
        let exported = recorder.export("r1", &dest).unwrap();
        assert_eq!(exported, dest);
        let content = std::fs::read_to_string(&dest).unwrap();
        assert!(content.contains("hello"));
    }

    #[test]
    fn test_export_unknown_run_not_found() {
        let tmp = TempDir::new().unwrap();
        let recorder = recorder(tmp.path());
        let err = recorder
            .export("missing", &tmp.path().join("out.jsonl"))
            .unwrap_err();
        assert!(matches!(err, GatewayError::ShadowNotFound { .. }));
    }

    #[test]
    fn test_cleanup_deletes_exactly_expired_runs() {
        let tmp = TempDir::new().unwrap();
        let recorder = recorder(tmp.path());

        recorder.enable("old", EnableOptions::default()).unwrap();
        recorder.enable("fresh", EnableOptions::default()).unwrap();
        recorder.disable("old").unwrap();
        recorder.disable("fresh").unwrap();

        // Age the first run's manifest past its TTL.
        let old_dir = tmp.path().join("old");
        let mut manifest = RunManifest::load(&old_dir).unwrap();
        manifest.updated_at = Utc::now() - chrono::Duration::seconds(7200);
        manifest.save(&old_dir).unwrap();

        let deleted = recorder.cleanup_expired(Utc::now());
        assert_eq!(deleted, 1);
        assert!(!old_dir.exists());
        assert!(tmp.path().join("fresh").exists());
    }

    #[test]
    fn test_routing_blocks_respected_when_configured() {
        let tmp = TempDir::new().unwrap();
        let config = ShadowConfig {
            root_dir: tmp.path().to_path_buf(),
            buffer_capacity: 8,
            buffer_max_age_secs: 300,
            ttl_secs: 3600,
            format: "jsonl".to_string(),
            respect_routing_blocks: true,
        };
        let recorder = ShadowRecorder::new(config);
        recorder.enable("r1", EnableOptions::default()).unwrap();

        let mut blocked = envelope("r1", "blocked");
        blocked.routing = Some(RoutingDirective {
            allow: vec![],
            block: vec![Destination::File],
        });
        recorder.write(&blocked, &json!({}));
        recorder.write(&envelope("r1", "captured"), &json!({}));

        assert_eq!(read_messages(tmp.path(), "r1"), vec!["captured"]);
    }

    #[test]
    fn test_invalid_run_id_rejected() {
        let tmp = TempDir::new().unwrap();
        let recorder = recorder(tmp.path());
        assert!(recorder.enable("", EnableOptions::default()).is_err());
        assert!(recorder.enable("../escape", EnableOptions::default()).is_err());
    }

    #[test]
    fn test_reenable_appends_to_existing_run() {
        let tmp = TempDir::new().unwrap();
        let recorder = recorder(tmp.path());

        recorder.enable("r1", EnableOptions::default()).unwrap();
        recorder.write(&envelope("r1", "first"), &json!({}));
        recorder.disable("r1").unwrap();

        recorder.enable("r1", EnableOptions::default()).unwrap();
        recorder.write(&envelope("r1", "second"), &json!({}));

        assert_eq!(read_messages(tmp.path(), "r1"), vec!["first", "second"]);
        let manifest = RunManifest::load(&tmp.path().join("r1")).unwrap();
        assert_eq!(manifest.entry_count, 2);
    }

    #[test]
    fn test_reenable_does_not_replay_captured_entries() {
        let tmp = TempDir::new().unwrap();
        let recorder = recorder(tmp.path());

        // The captured entry is on disk and must not come back out of
        // the rolling buffer on a later enable.
        recorder.enable("r1", EnableOptions::default()).unwrap();
        recorder.write(&envelope("r1", "only once"), &json!({}));
        recorder.disable("r1").unwrap();
        recorder.enable("r1", EnableOptions::default()).unwrap();
        recorder.disable("r1").unwrap();

        assert_eq!(read_messages(tmp.path(), "r1"), vec!["only once"]);
        let manifest = RunManifest::load(&tmp.path().join("r1")).unwrap();
        assert_eq!(manifest.entry_count, 1);
    }

    #[test]
    fn test_replayed_entries_not_duplicated_on_reenable() {
        let tmp = TempDir::new().unwrap();
        let recorder = recorder(tmp.path());

        // Retroactively captured entries are drained from the buffer.
        recorder.write(&envelope("r1", "early"), &json!({}));
        recorder.enable("r1", EnableOptions::default()).unwrap();
        recorder.disable("r1").unwrap();
        recorder.enable("r1", EnableOptions::default()).unwrap();

        assert_eq!(read_messages(tmp.path(), "r1"), vec!["early"]);
    }
}
