//! Shadow capture.
//!
//! A per-run side-channel that durably records raw, pre-sanitization
//! entries independent of level filtering. A bounded rolling buffer
//! enables retroactive capture: entries written before a run is enabled
//! are replayed into the run's file on enable. Run storage outlives
//! disable until TTL cleanup removes it.

mod buffer;
mod manifest;
mod recorder;

pub use buffer::{BufferedEntry, RollingBuffer};
pub use manifest::{RunManifest, ShadowFormat};
pub use recorder::{ActiveRun, EnableOptions, ShadowRecorder};
