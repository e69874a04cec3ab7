//! Rolling buffer for retroactive shadow capture.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::envelope::LogEnvelope;

/// One buffered entry: the envelope, the raw pre-sanitization payload,
/// and the capture time used for age eviction.
#[derive(Debug, Clone)]
pub struct BufferedEntry {
    pub envelope: LogEnvelope,
    pub raw: serde_json::Value,
    pub captured_at: Instant,
}

/// Bounded queue of recent raw entries.
///
/// Eviction runs on every insert, by count first and then by age,
/// independent of whether any shadow run is active.
#[derive(Debug)]
pub struct RollingBuffer {
    capacity: usize,
    max_age: Duration,
    entries: VecDeque<BufferedEntry>,
}

impl RollingBuffer {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            capacity,
            max_age,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Insert an entry, evicting the oldest past capacity and anything
    /// older than the maximum age. A zero capacity disables buffering.
    pub fn push(&mut self, envelope: LogEnvelope, raw: serde_json::Value) {
        if self.capacity == 0 {
            return;
        }

        self.entries.push_back(BufferedEntry {
            envelope,
            raw,
            captured_at: Instant::now(),
        });

        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        let cutoff = Instant::now();
        while let Some(front) = self.entries.front() {
            if cutoff.duration_since(front.captured_at) > self.max_age {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Remove and return buffered entries tagged with `run_id`, oldest
    /// first. Draining keeps a later replay from seeing them again.
    pub fn take_matching(&mut self, run_id: &str) -> Vec<BufferedEntry> {
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.envelope.run_id.as_deref() == Some(run_id) {
                taken.push(entry);
            } else {
                kept.push_back(entry);
            }
        }
        self.entries = kept;
        taken
    }

    /// Drop the entry with `entry_id`, if still buffered.
    pub fn remove(&mut self, entry_id: &Uuid) {
        self.entries.retain(|e| e.envelope.entry_id != *entry_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
