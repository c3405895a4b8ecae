//! Progress hooks for the conversion pipelines.
//!
//! Pipelines report one unit per area source read or written. The binary
//! renders them with `indicatif`; library callers that do not care pass
//! [`null_progress()`].

use std::sync::Arc;

/// Receives area-source progress from a conversion pipeline.
pub trait ProgressCallback: Send + Sync {
    /// Number of sources the pipeline is about to write. Readers never call
    /// this because a shapefile does not announce its feature count.
    fn set_total(&self, total: u64);

    /// `delta` more sources were read or written.
    fn inc(&self, delta: u64);

    /// Names the current step, e.g. the table being written.
    fn set_message(&self, msg: String);

    /// Pipeline finished; `msg` summarises what it produced.
    fn finish(&self, msg: String);
}

/// Discards all progress.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
